// src/orchestrator/mod.rs

//! Lifecycle orchestration over a resolved graph
//!
//! Walks the graph dependency-first and brings every non-root node to a
//! satisfied state: reused from the cache store when policy allows, built
//! through the recipe lifecycle (`source`, `build`, `package`,
//! `package_info`) otherwise. Build failures are contained: the failing
//! node and its dependents are marked, unrelated siblings still complete,
//! and the run reports per-node outcomes instead of aborting.
//!
//! The root node is special: it is never cached. After the walk its
//! composed info (the full dependency closure) is written into the
//! workspace as the build-info artifact, and [`Orchestrator::build_root`]
//! can then run the root's own source/build steps against that closure.

use crate::cache::{CacheStore, PackageWrite};
use crate::error::{Error, Result};
use crate::graph::{Graph, NodeId, NodeState};
use crate::info::{ComposedInfo, DepView, write_build_info};
use crate::recipe::{HookContext, OutputSink, Recipe};
use crate::reference::{PackageId, Reference};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// When to build a node versus reuse its cached artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildPolicy {
    /// Build whatever has no committed artifact, reuse the rest
    #[default]
    Missing,
    /// Only reuse; a missing artifact fails its node
    Never,
    /// Discard committed artifacts and rebuild everything
    Force,
}

/// Outcome of one node after a run
#[derive(Debug, Clone)]
pub struct NodeReport {
    pub reference: Reference,
    pub package_id: Option<PackageId>,
    pub state: NodeState,
    /// Whether this entry is the root of the graph
    pub root: bool,
    /// Contained failure message, for failed nodes
    pub error: Option<String>,
}

/// Per-node outcomes of one orchestrator run
///
/// Every node appears, the root included. The counters cover dependency
/// nodes only: the root never carries a cacheable artifact, so counting it
/// would misstate how many packages a run produced or reused.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub nodes: Vec<NodeReport>,
}

impl BuildReport {
    /// True when every node ended satisfied (built or cached)
    pub fn success(&self) -> bool {
        self.nodes
            .iter()
            .all(|n| matches!(n.state, NodeState::Built | NodeState::Cached))
    }

    pub fn node(&self, name: &str) -> Option<&NodeReport> {
        self.nodes.iter().find(|n| n.reference.name == name)
    }

    fn count(&self, state: NodeState) -> usize {
        self.nodes
            .iter()
            .filter(|n| !n.root && n.state == state)
            .count()
    }

    pub fn built(&self) -> usize {
        self.count(NodeState::Built)
    }

    pub fn cached(&self) -> usize {
        self.count(NodeState::Cached)
    }

    pub fn failed(&self) -> usize {
        self.count(NodeState::Failed)
    }

    pub fn skipped(&self) -> usize {
        self.count(NodeState::Skipped)
    }
}

/// Drives a resolved graph to completion against a cache store
pub struct Orchestrator<'a> {
    cache: &'a CacheStore,
    policy: BuildPolicy,
}

impl<'a> Orchestrator<'a> {
    pub fn new(cache: &'a CacheStore, policy: BuildPolicy) -> Self {
        Self { cache, policy }
    }

    /// Satisfy every dependency node and compose info up to the root
    ///
    /// On return the root node carries the composed info of its whole
    /// dependency closure and the build-info artifact sits in `workspace`.
    pub fn run(
        &self,
        graph: &mut Graph,
        workspace: &Path,
        sink: &mut dyn OutputSink,
    ) -> Result<BuildReport> {
        let order = graph.topological_order()?;
        let root = graph.root();
        let mut report = BuildReport::default();

        for id in order {
            if id == root {
                continue;
            }
            let outcome = self.process_node(graph, id, workspace, sink);
            let node = graph.node_mut(id);
            match outcome {
                Ok(state) => {
                    node.state = state;
                    report.nodes.push(NodeReport {
                        reference: node.reference.clone(),
                        package_id: node.package_id.clone(),
                        state,
                        root: false,
                        error: None,
                    });
                }
                Err(err) => {
                    // Contained: dependents get skipped, siblings continue
                    warn!("{} failed: {}", node.reference, err);
                    node.state = NodeState::Failed;
                    report.nodes.push(NodeReport {
                        reference: node.reference.clone(),
                        package_id: node.package_id.clone(),
                        state: NodeState::Failed,
                        root: false,
                        error: Some(err.to_string()),
                    });
                }
            }
        }

        // Root: compose the dependency closure and emit the artifact
        let state = self.finish_root(graph, workspace)?;
        let node = graph.node_mut(root);
        node.state = state;
        report.nodes.push(NodeReport {
            reference: node.reference.clone(),
            package_id: node.package_id.clone(),
            state,
            root: true,
            error: None,
        });

        info!(
            "Run complete: {} built, {} cached, {} failed, {} skipped",
            report.built(),
            report.cached(),
            report.failed(),
            report.skipped()
        );
        Ok(report)
    }

    /// Execute the root recipe's own source and build steps
    ///
    /// The root is never packaged or cached; its hooks run directly in the
    /// workspace against the composed info produced by [`Orchestrator::run`].
    pub fn build_root(
        &self,
        graph: &mut Graph,
        workspace: &Path,
        sink: &mut dyn OutputSink,
    ) -> Result<()> {
        let root = graph.root();
        let node = graph.node(root);
        if node.state != NodeState::Built {
            return Err(Error::Internal(format!(
                "root {} is not ready to build (unsatisfied dependencies?)",
                node.reference
            )));
        }
        let composed = node
            .composed
            .clone()
            .ok_or_else(|| Error::InfoUnavailable(node.reference.to_string()))?;
        let recipe = node.recipe.clone();
        let reference = node.reference.clone();
        let settings = node.settings.clone();
        let options = node.options.clone();

        let workspace = workspace.to_path_buf();
        let mut ctx = HookContext::new(
            reference.clone(),
            settings,
            options,
            workspace.clone(),
            workspace.clone(),
            workspace,
            &composed,
            sink,
        );
        run_hook(&recipe, &reference, "source", |r, ctx| r.source(ctx), &mut ctx)?;
        run_hook(&recipe, &reference, "build", |r, ctx| r.build(ctx), &mut ctx)?;
        Ok(())
    }

    /// Bring one dependency node to a satisfied state
    fn process_node(
        &self,
        graph: &mut Graph,
        id: NodeId,
        workspace: &Path,
        sink: &mut dyn OutputSink,
    ) -> Result<NodeState> {
        let requires = graph.node(id).requires.clone();
        let mut deps: Vec<(String, ComposedInfo)> = Vec::with_capacity(requires.len());
        for req in requires {
            let dep = graph.node(req);
            if matches!(dep.state, NodeState::Failed | NodeState::Skipped) {
                debug!(
                    "Skipping {}: dependency {} did not complete",
                    graph.node(id).reference,
                    dep.reference
                );
                return Ok(NodeState::Skipped);
            }
            let composed = dep
                .composed
                .clone()
                .ok_or_else(|| Error::InfoUnavailable(dep.reference.to_string()))?;
            deps.push((dep.reference.name.clone(), composed));
        }
        let deps_composed =
            ComposedInfo::aggregate(deps.iter().map(|(n, c)| (n.as_str(), c)))?;

        let package = graph.node(id).package_reference()?;

        if self.policy == BuildPolicy::Force {
            self.cache.remove_package(&package)?;
        }

        if self.cache.has_package(&package) {
            let root_path = self.cache.package_path(&package)?;
            debug!("Cache hit for {}", package);
            return self.adopt_artifact(graph, id, &root_path, &deps, NodeState::Cached);
        }

        if self.policy == BuildPolicy::Never {
            return Err(Error::PackageMissing(package.to_string()));
        }

        let writer = match self.cache.begin_package(&package)? {
            PackageWrite::Reused(root_path) => {
                // Another writer finished while we waited for the slot
                return self.adopt_artifact(graph, id, &root_path, &deps, NodeState::Cached);
            }
            PackageWrite::Writer(writer) => writer,
        };

        let node = graph.node(id);
        let recipe = node.recipe.clone();
        let reference = node.reference.clone();
        let settings = node.settings.clone();
        let options = node.options.clone();
        info!("Building {} ({})", reference, package.package_id);

        let source_dir = TempDir::with_prefix_in("source-", workspace)?;
        let build_dir = TempDir::with_prefix_in("build-", workspace)?;

        let mut ctx = HookContext::new(
            reference.clone(),
            settings,
            options,
            source_dir.path().to_path_buf(),
            build_dir.path().to_path_buf(),
            writer.path().to_path_buf(),
            &deps_composed,
            sink,
        );

        run_hook(&recipe, &reference, "source", |r, ctx| r.source(ctx), &mut ctx)?;
        run_hook(&recipe, &reference, "build", |r, ctx| r.build(ctx), &mut ctx)?;
        run_hook(&recipe, &reference, "package", |r, ctx| r.package(ctx), &mut ctx)?;
        let published = recipe
            .package_info(&mut ctx)
            .map_err(|e| Error::build_step(&reference, "package_info", &e))?;

        // Compose against the final location before committing, and stage
        // the build-info artifact inside the entry so information-only
        // consumers can read it without a graph walk
        let view = DepView::from_published(writer.target(), &published);
        let composed = ComposedInfo::for_node(view, deps.iter().map(|(n, c)| (n.as_str(), c)))?;
        write_build_info(writer.path(), &composed)?;
        writer.write_published_info(&published)?;
        writer.commit()?;

        let node = graph.node_mut(id);
        node.published = Some(published);
        node.composed = Some(composed);
        Ok(NodeState::Built)
    }

    /// Take over a committed artifact without running any lifecycle step
    fn adopt_artifact(
        &self,
        graph: &mut Graph,
        id: NodeId,
        root_path: &Path,
        deps: &[(String, ComposedInfo)],
        state: NodeState,
    ) -> Result<NodeState> {
        let package = graph.node(id).package_reference()?;
        let published = self.cache.load_published_info(&package)?;
        let view = DepView::from_published(root_path, &published);
        let composed = ComposedInfo::for_node(view, deps.iter().map(|(n, c)| (n.as_str(), c)))?;
        let node = graph.node_mut(id);
        node.published = Some(published);
        node.composed = Some(composed);
        Ok(state)
    }

    /// Compose the root's info once all dependencies settled
    ///
    /// The build-info artifact is only written when every dependency is
    /// satisfied; a partial closure would be misleading to consume.
    fn finish_root(&self, graph: &mut Graph, workspace: &Path) -> Result<NodeState> {
        let root = graph.root();
        let requires = graph.node(root).requires.clone();
        let mut deps: Vec<(String, ComposedInfo)> = Vec::with_capacity(requires.len());
        for req in requires {
            let dep = graph.node(req);
            if matches!(dep.state, NodeState::Failed | NodeState::Skipped) {
                return Ok(NodeState::Skipped);
            }
            let composed = dep
                .composed
                .clone()
                .ok_or_else(|| Error::InfoUnavailable(dep.reference.to_string()))?;
            deps.push((dep.reference.name.clone(), composed));
        }
        let composed = ComposedInfo::aggregate(deps.iter().map(|(n, c)| (n.as_str(), c)))?;
        write_build_info(workspace, &composed)?;
        graph.node_mut(root).composed = Some(composed);
        Ok(NodeState::Built)
    }
}

fn run_hook<F>(
    recipe: &Arc<dyn Recipe>,
    reference: &Reference,
    step: &str,
    hook: F,
    ctx: &mut HookContext<'_>,
) -> Result<()>
where
    F: FnOnce(&Arc<dyn Recipe>, &mut HookContext<'_>) -> Result<()>,
{
    hook(recipe, ctx).map_err(|e| Error::build_step(reference, step, &e))
}
