// src/error.rs

//! Crate-wide error type and result alias
//!
//! Errors are grouped by the stage that produces them: resolution errors
//! (cycles, conflicts, missing recipe exports) abort a run before any build
//! step starts; build-step errors are contained to one node and its
//! dependents; cache errors are fatal for the affected package reference.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// All errors produced by the quarry core
#[derive(Debug, Error)]
pub enum Error {
    /// Underlying filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure for exports or info artifacts
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Malformed reference, requirement, or package reference text
    #[error("parse error: {0}")]
    Parse(String),

    /// The requirement graph contains a cycle
    #[error("circular dependency detected: {}", cycle.join(" -> "))]
    CircularDependency { cycle: Vec<String> },

    /// Two paths through the graph require incompatible references
    /// for the same package name
    #[error(
        "conflicting requirements for '{name}': {existing} (required by {existing_via}) \
         vs {candidate} (required by {candidate_via}); pin an override to resolve"
    )]
    Conflict {
        name: String,
        existing: String,
        existing_via: String,
        candidate: String,
        candidate_via: String,
    },

    /// No recipe export exists for a required reference
    #[error("recipe not found: {0}")]
    RecipeNotFound(String),

    /// A package artifact is required but absent from the cache
    /// (distinct from a missing recipe export)
    #[error("package artifact missing: {0}")]
    PackageMissing(String),

    /// A cache entry exists but cannot be read back
    #[error("corrupt cache entry at {path}: {reason}")]
    CacheCorrupt { path: PathBuf, reason: String },

    /// A lifecycle hook reported failure for one node
    #[error("{step} step failed for {reference}: {message}")]
    BuildStep {
        reference: String,
        step: String,
        message: String,
    },

    /// Indexed info lookup for a dependency name that is not in the graph
    #[error("unknown dependency in info lookup: '{0}'")]
    UnknownDependency(String),

    /// A dependency's published info was needed before it was produced
    #[error("published info unavailable for {0}")]
    InfoUnavailable(String),

    /// Invariant breach inside the core; indicates a bug, not user error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Wrap a hook failure with the node and step it belongs to
    pub fn build_step(
        reference: impl std::fmt::Display,
        step: &str,
        source: &Error,
    ) -> Self {
        Error::BuildStep {
            reference: reference.to_string(),
            step: step.to_string(),
            message: source.to_string(),
        }
    }

    /// True for errors that abort a run before any build step executes
    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            Error::CircularDependency { .. } | Error::Conflict { .. } | Error::RecipeNotFound(_)
        )
    }
}
