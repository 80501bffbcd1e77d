// src/info/artifact.rs

//! Generic build-info artifact
//!
//! The composed info of a node (typically the consumer root) serializes
//! into a single JSON document that build-tool generators consume. The
//! rendering is deterministic: all maps are ordered and list order is the
//! merge order, so the same [`ComposedInfo`] always produces the same
//! bytes.

use crate::error::Result;
use crate::info::ComposedInfo;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of the serialized build-info artifact
pub const BUILD_INFO_FILE: &str = "quarry_build_info.json";

/// Render composed info to its canonical JSON form
pub fn render_build_info(composed: &ComposedInfo) -> Result<String> {
    let mut rendered = serde_json::to_string_pretty(composed)?;
    rendered.push('\n');
    Ok(rendered)
}

/// Write the build-info artifact into a directory, returning its path
pub fn write_build_info(dir: &Path, composed: &ComposedInfo) -> Result<PathBuf> {
    let path = dir.join(BUILD_INFO_FILE);
    fs::write(&path, render_build_info(composed)?)?;
    debug!("Wrote build info artifact: {}", path.display());
    Ok(path)
}

/// Load a previously written build-info artifact
pub fn load_build_info(dir: &Path) -> Result<ComposedInfo> {
    let path = dir.join(BUILD_INFO_FILE);
    let content = fs::read_to_string(&path)?;
    Ok(serde_json::from_str(&content)?)
}
