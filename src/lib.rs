// src/lib.rs

//! Quarry Package Manager Core
//!
//! Source-based package management: dependency resolution, deterministic
//! package identity, a content-addressed cache, and lifecycle
//! orchestration with build-info propagation.
//!
//! # Architecture
//!
//! - References: `name/version@user/channel` names a recipe; a package
//!   identity fingerprint distinguishes its built configurations
//! - Graph-first: requirements expand into a resolved DAG before any
//!   build step runs; conflicts and cycles fail resolution, not builds
//! - Identity: SHA-256 over the canonical (settings, options, requires)
//!   rendering; a dependency change ripples up to every dependent
//! - Cache: artifacts commit by atomic rename and are immutable after
//! - Info propagation: each node publishes build/env/user info that
//!   composes upwards into indexed and flattened views

pub mod cache;
mod error;
pub mod fsutil;
pub mod graph;
pub mod hash;
pub mod identity;
pub mod info;
pub mod ops;
pub mod orchestrator;
pub mod recipe;
pub mod reference;
pub mod settings;

pub use cache::{CacheStore, PackageWrite, PackageWriter};
pub use error::{Error, Result};
pub use graph::{Graph, GraphBuilder, GraphNode, NodeId, NodeState};
pub use hash::{Hash, HashAlgorithm};
pub use info::{
    BuildInfo, ComposedInfo, DepView, EnvInfo, EnvValue, FlatInfo, PublishedInfo, UserInfo,
};
pub use ops::{Client, InstallRequest};
pub use orchestrator::{BuildPolicy, BuildReport, NodeReport, Orchestrator};
pub use recipe::{
    CollectingSink, HookContext, OutputSink, Recipe, RecipeMeta, RecipeRegistry, RecipeSource,
    Requirement, TracingSink, VersionSpec,
};
pub use reference::{PackageId, PackageReference, Reference};
pub use settings::{Options, Settings};
