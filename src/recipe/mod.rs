// src/recipe/mod.rs

//! Recipe model: declared metadata plus lifecycle hooks
//!
//! A recipe implements the [`Recipe`] trait, a fixed capability contract
//! of four lifecycle stages ({source, build, package, package_info}) the
//! orchestrator invokes through a trait object. Hooks receive an explicit
//! [`HookContext`] carrying the node's resolved configuration, its working
//! directories, the composed info of its dependencies, and an output sink;
//! there is no ambient process-wide state.

mod meta;

pub use meta::{DepOption, RecipeMeta, Requirement, VersionSpec};

use crate::error::{Error, Result};
use crate::info::{ComposedInfo, PublishedInfo};
use crate::reference::Reference;
use crate::settings::{Options, Settings};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Where recipe hooks send informational messages
///
/// Passed explicitly into every hook call so output can be captured per
/// run (and asserted in tests) instead of going through global state.
pub trait OutputSink {
    fn info(&mut self, reference: &Reference, message: &str);
}

/// Sink that forwards hook output to the `tracing` pipeline
#[derive(Debug, Default)]
pub struct TracingSink;

impl OutputSink for TracingSink {
    fn info(&mut self, reference: &Reference, message: &str) {
        info!(target: "quarry::recipe", "{}: {}", reference, message);
    }
}

/// Sink that records hook output lines for later inspection
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub lines: Vec<String>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any recorded line contains the given text
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|line| line.contains(needle))
    }
}

impl OutputSink for CollectingSink {
    fn info(&mut self, reference: &Reference, message: &str) {
        self.lines.push(format!("{}: {}", reference, message));
    }
}

/// Everything a lifecycle hook may touch for one node
pub struct HookContext<'a> {
    /// Resolved reference of the node being processed
    pub reference: Reference,
    /// Settings narrowed to the recipe's declared axes
    pub settings: Settings,
    /// Resolved option values (defaults plus any forces)
    pub options: Options,
    /// Where `source()` materializes the source tree
    pub source_dir: PathBuf,
    /// Where `build()` runs
    pub build_dir: PathBuf,
    /// Where `package()` materializes the artifact layout
    pub package_dir: PathBuf,
    /// Composed info of this node's dependencies
    pub deps: &'a ComposedInfo,
    output: &'a mut dyn OutputSink,
}

impl<'a> HookContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        reference: Reference,
        settings: Settings,
        options: Options,
        source_dir: PathBuf,
        build_dir: PathBuf,
        package_dir: PathBuf,
        deps: &'a ComposedInfo,
        output: &'a mut dyn OutputSink,
    ) -> Self {
        Self {
            reference,
            settings,
            options,
            source_dir,
            build_dir,
            package_dir,
            deps,
            output,
        }
    }

    /// Emit an informational message attributed to this node
    pub fn info(&mut self, message: impl AsRef<str>) {
        self.output.info(&self.reference, message.as_ref());
    }
}

/// One package definition: declared metadata plus executable lifecycle
///
/// Hooks default to no-ops; `package_info` defaults to the conventional
/// package layout (`include`, `lib`, `bin`) with empty env and user info.
pub trait Recipe: Send + Sync {
    /// Declared metadata (identity, requirements, axes)
    fn meta(&self) -> &RecipeMeta;

    /// Acquire the source tree into `ctx.source_dir`
    fn source(&self, ctx: &mut HookContext<'_>) -> Result<()> {
        let _ = ctx;
        Ok(())
    }

    /// Execute the build against `ctx.build_dir`
    fn build(&self, ctx: &mut HookContext<'_>) -> Result<()> {
        let _ = ctx;
        Ok(())
    }

    /// Materialize build outputs into `ctx.package_dir`
    fn package(&self, ctx: &mut HookContext<'_>) -> Result<()> {
        let _ = ctx;
        Ok(())
    }

    /// Publish this node's build metadata
    fn package_info(&self, ctx: &mut HookContext<'_>) -> Result<PublishedInfo> {
        let _ = ctx;
        Ok(PublishedInfo::package_layout())
    }
}

/// Provides recipe instances and candidate versions to the graph builder
pub trait RecipeSource: Send + Sync {
    /// Recipe instance for a concrete reference
    ///
    /// Returns [`Error::RecipeNotFound`] when no export exists.
    fn recipe(&self, reference: &Reference) -> Result<Arc<dyn Recipe>>;

    /// Exported versions available for (name, user, channel), unordered
    fn versions(&self, name: &str, user: &str, channel: &str) -> Vec<String>;
}

/// In-memory registry of exported recipe instances
///
/// Recipe hooks are native code, so exports keep the live instance here
/// while the cache store persists the declarative metadata alongside.
#[derive(Default)]
pub struct RecipeRegistry {
    recipes: HashMap<Reference, Arc<dyn Recipe>>,
}

impl RecipeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, reference: Reference, recipe: Arc<dyn Recipe>) {
        self.recipes.insert(reference, recipe);
    }

    pub fn contains(&self, reference: &Reference) -> bool {
        self.recipes.contains_key(reference)
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }
}

impl RecipeSource for RecipeRegistry {
    fn recipe(&self, reference: &Reference) -> Result<Arc<dyn Recipe>> {
        self.recipes
            .get(reference)
            .cloned()
            .ok_or_else(|| Error::RecipeNotFound(reference.to_string()))
    }

    fn versions(&self, name: &str, user: &str, channel: &str) -> Vec<String> {
        self.recipes
            .keys()
            .filter(|r| r.name == name && r.user == user && r.channel == channel)
            .map(|r| r.version.clone())
            .collect()
    }
}
