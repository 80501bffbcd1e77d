// src/ops.rs

//! High-level operations: export, resolve, install, build
//!
//! [`Client`] owns a cache store plus a registry of live recipe instances
//! and exposes the user-facing operations:
//!
//! - `export` publishes a recipe into the cache so requirements can
//!   resolve to it
//! - `install` resolves the root's graph, satisfies every dependency per
//!   policy, and writes the build-info artifact into the workspace
//! - `build` is install plus running the root recipe's own source/build
//!   steps against the composed dependency closure
//!
//! Resolution only sees exported recipes: registering a live instance
//! without exporting it keeps it invisible to requirements.

use crate::cache::CacheStore;
use crate::error::Result;
use crate::graph::{Graph, GraphBuilder};
use crate::orchestrator::{BuildPolicy, BuildReport, Orchestrator};
use crate::recipe::{OutputSink, Recipe, RecipeRegistry, RecipeSource};
use crate::reference::Reference;
use crate::settings::Settings;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Parameters of one install or build invocation
#[derive(Default)]
pub struct InstallRequest {
    /// Root profile settings, narrowed per node to its declared axes
    pub profile: Settings,
    /// Reference pins that win over declared requirements
    pub overrides: Vec<Reference>,
    /// (package, option, value) forces that outrank recipe defaults and
    /// dependent forces
    pub options: Vec<(String, String, String)>,
    pub policy: BuildPolicy,
}

impl InstallRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(mut self, profile: Settings) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_override(mut self, reference: Reference) -> Self {
        self.overrides.push(reference);
        self
    }

    pub fn with_option(
        mut self,
        package: impl Into<String>,
        option: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.options
            .push((package.into(), option.into(), value.into()));
        self
    }

    pub fn with_policy(mut self, policy: BuildPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Recipe source that answers only for exported recipes
///
/// Metadata truth lives in the cache store; the registry supplies the
/// live instance whose hooks actually run.
struct CacheBackedSource<'a> {
    cache: &'a CacheStore,
    registry: &'a RecipeRegistry,
}

impl RecipeSource for CacheBackedSource<'_> {
    fn recipe(&self, reference: &Reference) -> Result<Arc<dyn Recipe>> {
        self.cache.recipe_path(reference)?;
        self.registry.recipe(reference)
    }

    fn versions(&self, name: &str, user: &str, channel: &str) -> Vec<String> {
        self.cache.recipe_versions(name, user, channel)
    }
}

/// Entry point owning the cache store and the exported recipe instances
pub struct Client {
    cache: CacheStore,
    registry: RecipeRegistry,
}

impl Client {
    /// Open a client over a cache rooted at the given directory
    pub fn new<P: AsRef<Path>>(cache_root: P) -> Result<Self> {
        Ok(Self {
            cache: CacheStore::new(cache_root)?,
            registry: RecipeRegistry::new(),
        })
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Export a recipe under `user/channel`, making it resolvable
    pub fn export(
        &mut self,
        recipe: Arc<dyn Recipe>,
        user: &str,
        channel: &str,
    ) -> Result<Reference> {
        self.export_with_files(recipe, user, channel, None)
    }

    /// Export a recipe along with source files copied into the export area
    pub fn export_with_files(
        &mut self,
        recipe: Arc<dyn Recipe>,
        user: &str,
        channel: &str,
        files_from: Option<&Path>,
    ) -> Result<Reference> {
        let meta = recipe.meta().clone();
        let reference = Reference::new(meta.name.clone(), meta.version.clone(), user, channel)?;
        self.cache.export_recipe(&reference, &meta, files_from)?;
        self.registry.register(reference.clone(), recipe);
        info!("Exported {}", reference);
        Ok(reference)
    }

    /// Resolve the root recipe's dependency graph without building
    pub fn resolve(&self, root: Arc<dyn Recipe>, request: &InstallRequest) -> Result<Graph> {
        let source = CacheBackedSource {
            cache: &self.cache,
            registry: &self.registry,
        };
        let mut builder = GraphBuilder::new(&source);
        for pin in &request.overrides {
            builder = builder.with_override(pin.clone());
        }
        for (package, option, value) in &request.options {
            builder = builder.with_option(package.clone(), option.clone(), value.clone());
        }
        builder.build(root, &request.profile)
    }

    /// Resolve and satisfy the root's dependencies per the request policy
    ///
    /// Writes the build-info artifact into `workspace` when every
    /// dependency ends satisfied. Build failures are reported per node,
    /// not returned as an error.
    pub fn install(
        &self,
        root: Arc<dyn Recipe>,
        request: &InstallRequest,
        workspace: &Path,
        sink: &mut dyn OutputSink,
    ) -> Result<BuildReport> {
        let mut graph = self.resolve(root, request)?;
        let orchestrator = Orchestrator::new(&self.cache, request.policy);
        orchestrator.run(&mut graph, workspace, sink)
    }

    /// Install, then run the root recipe's source and build steps in the
    /// workspace
    ///
    /// The root steps only run when the install left every dependency
    /// satisfied; otherwise the report carries the per-node failures.
    pub fn build(
        &self,
        root: Arc<dyn Recipe>,
        request: &InstallRequest,
        workspace: &Path,
        sink: &mut dyn OutputSink,
    ) -> Result<BuildReport> {
        let mut graph = self.resolve(root, request)?;
        let orchestrator = Orchestrator::new(&self.cache, request.policy);
        let report = orchestrator.run(&mut graph, workspace, sink)?;
        if report.success() {
            orchestrator.build_root(&mut graph, workspace, sink)?;
        }
        Ok(report)
    }
}
