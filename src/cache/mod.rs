// src/cache/mod.rs

//! Content-addressed cache store
//!
//! Durable, crash-safe storage for recipe exports (keyed by [`Reference`])
//! and built package artifacts (keyed by [`PackageReference`]). Layout
//! under the store root:
//!
//! ```text
//! recipes/<name>/<version>/<user>/<channel>/export/   recipe.json + files
//! recipes/<...>/.export.lock                          exporter lock
//! packages/<name>/<version>/<user>/<channel>/<id>/    committed artifact
//! packages/<...>/.<id>.lock                           writer lock
//! packages/<...>/.<id>.building                       uncommitted staging
//! ```
//!
//! Writes follow the write-to-temp-then-atomic-rename discipline: an
//! artifact becomes visible to `has_package` only when its write handle is
//! committed, so a crash mid-write never leaves a partially-visible entry.
//! At most one writer per package reference proceeds at a time; a second
//! requester blocks on the writer lock and is redirected to the committed
//! result instead of rebuilding. Committed entries are immutable: a commit
//! never overwrites an existing artifact.

use crate::error::{Error, Result};
use crate::fsutil::copy_tree;
use crate::hash::xxh3;
use crate::info::PublishedInfo;
use crate::recipe::RecipeMeta;
use crate::reference::{PackageReference, Reference};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name of the serialized published info inside each artifact
pub const PUBLISHED_INFO_FILE: &str = "quarry_info.json";

/// File name of the recipe metadata inside an export
pub const RECIPE_META_FILE: &str = "recipe.json";

/// File name of the export content manifest
pub const EXPORT_MANIFEST_FILE: &str = "export_manifest.json";

/// Lock file serializing exporters of one reference
const EXPORT_LOCK_FILE: &str = ".export.lock";

/// Content checksums of an exported recipe's files
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportManifest {
    /// Relative path -> xxh3 checksum
    pub files: BTreeMap<String, String>,
}

/// Result of requesting a package write slot
pub enum PackageWrite {
    /// Another writer committed this artifact first; use it as-is
    Reused(PathBuf),
    /// Exclusive staging area for a fresh build
    Writer(PackageWriter),
}

/// Scoped, exclusive write handle for one package artifact
///
/// Holds the per-package writer lock for its whole lifetime. Dropping the
/// handle without committing discards the staging directory.
pub struct PackageWriter {
    staging: PathBuf,
    final_dir: PathBuf,
    // Held for mutual exclusion; released when the writer drops
    _lock: File,
    committed: bool,
}

impl PackageWriter {
    /// Staging directory the package step materializes into
    pub fn path(&self) -> &Path {
        &self.staging
    }

    /// Directory the artifact will occupy once committed
    pub fn target(&self) -> &Path {
        &self.final_dir
    }

    /// Persist published info into the staging area before commit
    pub fn write_published_info(&self, info: &PublishedInfo) -> Result<()> {
        let rendered = serde_json::to_string_pretty(info)?;
        fs::write(self.staging.join(PUBLISHED_INFO_FILE), rendered)?;
        Ok(())
    }

    /// Atomically publish the staged artifact
    ///
    /// Returns the final artifact directory. If the artifact already
    /// exists (it should not, under the lock), the staged copy is
    /// discarded and the existing entry wins: committed entries are never
    /// overwritten.
    pub fn commit(mut self) -> Result<PathBuf> {
        self.committed = true;
        if self.final_dir.exists() {
            warn!(
                "Artifact appeared during build, keeping existing: {}",
                self.final_dir.display()
            );
            fs::remove_dir_all(&self.staging)?;
            return Ok(self.final_dir.clone());
        }
        fs::rename(&self.staging, &self.final_dir)?;
        debug!("Committed package artifact: {}", self.final_dir.display());
        Ok(self.final_dir.clone())
    }
}

impl Drop for PackageWriter {
    fn drop(&mut self) {
        if !self.committed && self.staging.exists() {
            // Abort path: never leave a partially-visible entry behind
            let _ = fs::remove_dir_all(&self.staging);
        }
    }
}

/// Filesystem-backed cache store
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    /// Open (or initialize) a cache store rooted at the given directory
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join("recipes"))?;
        fs::create_dir_all(root.join("packages"))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn export_dir(&self, reference: &Reference) -> PathBuf {
        self.root
            .join("recipes")
            .join(reference.dir_path())
            .join("export")
    }

    fn package_parent(&self, package: &PackageReference) -> PathBuf {
        self.root
            .join("packages")
            .join(package.reference.dir_path())
    }

    fn package_dir(&self, package: &PackageReference) -> PathBuf {
        self.package_parent(package)
            .join(package.package_id.as_str())
    }

    fn lock_path(&self, package: &PackageReference) -> PathBuf {
        self.package_parent(package)
            .join(format!(".{}.lock", package.package_id))
    }

    fn staging_path(&self, package: &PackageReference) -> PathBuf {
        self.package_parent(package)
            .join(format!(".{}.building", package.package_id))
    }

    /// Whether a recipe export exists for this reference
    pub fn has_recipe(&self, reference: &Reference) -> bool {
        self.export_dir(reference).join(RECIPE_META_FILE).exists()
    }

    /// Export a recipe: persist its metadata and optionally copy the
    /// recipe's source files into the export area
    ///
    /// Re-exporting a reference replaces the previous export. Exporters of
    /// one reference are serialized through a lock file, and the previous
    /// export is renamed aside rather than deleted, so an interrupted
    /// re-export leaves a recoverable copy on disk.
    pub fn export_recipe(
        &self,
        reference: &Reference,
        meta: &RecipeMeta,
        files_from: Option<&Path>,
    ) -> Result<PathBuf> {
        let parent = self.root.join("recipes").join(reference.dir_path());
        fs::create_dir_all(&parent)?;
        let lock = File::create(parent.join(EXPORT_LOCK_FILE))?;
        lock.lock_exclusive()?;

        let export_dir = self.export_dir(reference);
        let staging = export_dir.with_extension("staging");
        let retired = export_dir.with_extension("old");
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        if retired.exists() {
            // Leftover from an interrupted re-export
            warn!("Discarding retired export: {}", retired.display());
            fs::remove_dir_all(&retired)?;
        }
        fs::create_dir_all(&staging)?;

        if let Some(source) = files_from {
            copy_tree(source, &staging)?;
        }

        // Checksum everything copied so far, then add the metadata itself
        let mut manifest = ExportManifest::default();
        for entry in walkdir::WalkDir::new(&staging) {
            let entry = entry.map_err(|e| std::io::Error::other(e.to_string()))?;
            if entry.file_type().is_file() {
                let rel = entry
                    .path()
                    .strip_prefix(&staging)
                    .map_err(|e| std::io::Error::other(e.to_string()))?
                    .to_string_lossy()
                    .into_owned();
                manifest.files.insert(rel, xxh3(&fs::read(entry.path())?));
            }
        }
        fs::write(
            staging.join(RECIPE_META_FILE),
            serde_json::to_string_pretty(meta)?,
        )?;
        fs::write(
            staging.join(EXPORT_MANIFEST_FILE),
            serde_json::to_string_pretty(&manifest)?,
        )?;

        // Swap the finished staging in; the old export moves aside first so
        // no point in time has the reference destroyed without a replacement
        // already staged next to it
        if export_dir.exists() {
            fs::rename(&export_dir, &retired)?;
        }
        fs::rename(&staging, &export_dir)?;
        if retired.exists() {
            fs::remove_dir_all(&retired)?;
        }
        debug!("Exported recipe {} -> {}", reference, export_dir.display());
        Ok(export_dir)
    }

    /// Path of a recipe's export directory
    pub fn recipe_path(&self, reference: &Reference) -> Result<PathBuf> {
        let dir = self.export_dir(reference);
        if !self.has_recipe(reference) {
            return Err(Error::RecipeNotFound(reference.to_string()));
        }
        Ok(dir)
    }

    /// Exported versions present for (name, user, channel)
    ///
    /// Scans the recipe layout on disk, so exports from other processes
    /// are visible too.
    pub fn recipe_versions(&self, name: &str, user: &str, channel: &str) -> Vec<String> {
        let name_dir = self.root.join("recipes").join(name);
        let mut versions = Vec::new();
        let Ok(entries) = fs::read_dir(&name_dir) else {
            return versions;
        };
        for entry in entries.flatten() {
            let version = entry.file_name().to_string_lossy().into_owned();
            if let Ok(reference) = Reference::new(name, version.as_str(), user, channel) {
                if self.has_recipe(&reference) {
                    versions.push(version);
                }
            }
        }
        versions
    }

    /// Load the exported recipe metadata
    pub fn recipe_meta(&self, reference: &Reference) -> Result<RecipeMeta> {
        let path = self.recipe_path(reference)?.join(RECIPE_META_FILE);
        let content = fs::read_to_string(&path)?;
        serde_json::from_str(&content).map_err(|e| Error::CacheCorrupt {
            path,
            reason: e.to_string(),
        })
    }

    /// Whether a committed artifact exists for this package reference
    pub fn has_package(&self, package: &PackageReference) -> bool {
        self.package_dir(package).exists()
    }

    /// Path of a committed artifact
    pub fn package_path(&self, package: &PackageReference) -> Result<PathBuf> {
        let dir = self.package_dir(package);
        if !dir.exists() {
            return Err(Error::PackageMissing(package.to_string()));
        }
        Ok(dir)
    }

    /// Acquire the writer slot for a package reference
    ///
    /// Blocks while another writer holds the slot. If the artifact was
    /// committed in the meantime (or already existed), the caller is
    /// redirected to it via [`PackageWrite::Reused`].
    pub fn begin_package(&self, package: &PackageReference) -> Result<PackageWrite> {
        let parent = self.package_parent(package);
        fs::create_dir_all(&parent)?;

        let lock = File::create(self.lock_path(package))?;
        lock.lock_exclusive()?;

        let final_dir = self.package_dir(package);
        if final_dir.exists() {
            debug!("Redirecting to committed artifact: {}", final_dir.display());
            return Ok(PackageWrite::Reused(final_dir));
        }

        let staging = self.staging_path(package);
        if staging.exists() {
            // Leftover from a crashed writer; safe to clear under the lock
            warn!("Discarding stale staging dir: {}", staging.display());
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;

        Ok(PackageWrite::Writer(PackageWriter {
            staging,
            final_dir,
            _lock: lock,
            committed: false,
        }))
    }

    /// Remove a committed artifact (force-rebuild policy)
    ///
    /// Takes the writer lock so a removal never races an in-flight build.
    pub fn remove_package(&self, package: &PackageReference) -> Result<()> {
        let dir = self.package_dir(package);
        if !dir.exists() {
            return Ok(());
        }
        fs::create_dir_all(self.package_parent(package))?;
        let lock = File::create(self.lock_path(package))?;
        lock.lock_exclusive()?;
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
            debug!("Removed package artifact: {}", dir.display());
        }
        Ok(())
    }

    /// Load the published info stored inside a committed artifact
    pub fn load_published_info(&self, package: &PackageReference) -> Result<PublishedInfo> {
        let path = self.package_path(package)?.join(PUBLISHED_INFO_FILE);
        let content = fs::read_to_string(&path).map_err(|e| Error::CacheCorrupt {
            path: path.clone(),
            reason: format!("missing published info: {}", e),
        })?;
        serde_json::from_str(&content).map_err(|e| Error::CacheCorrupt {
            path,
            reason: e.to_string(),
        })
    }
}
