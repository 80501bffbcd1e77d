// src/graph/mod.rs

//! Dependency graph: nodes, ordering, identity assignment
//!
//! The graph is a directed acyclic graph of resolved nodes rooted at the
//! consumer. Each node carries its resolved configuration (settings
//! narrowed to the recipe's declared axes, options with forces applied)
//! and, once assigned, its package identity. Edges point from a node to
//! the nodes it requires, in declaration order.
//!
//! Ordering is dependency-first (leaves before dependents) via Kahn's
//! algorithm; cycle diagnostics come from a separate DFS that reports the
//! offending reference names in order.

pub mod builder;

pub use builder::GraphBuilder;

use crate::error::{Error, Result};
use crate::identity;
use crate::info::{ComposedInfo, PublishedInfo};
use crate::recipe::Recipe;
use crate::reference::{PackageId, PackageReference, Reference};
use crate::settings::{Options, Settings};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Index of a node within its graph
pub type NodeId = usize;

/// Lifecycle state of one graph node during orchestration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Not yet visited by the orchestrator
    Pending,
    /// Satisfied from a committed cache artifact
    Cached,
    /// Built in this run and committed
    Built,
    /// A lifecycle step failed
    Failed,
    /// Not attempted because a dependency failed
    Skipped,
}

/// One resolved node of the dependency graph
pub struct GraphNode {
    pub reference: Reference,
    pub recipe: Arc<dyn Recipe>,
    /// Profile settings narrowed to the recipe's declared axes, pins applied
    pub settings: Settings,
    /// Default options with dependent and invoker forces applied
    pub options: Options,
    /// Required nodes, in the recipe's declaration order
    pub requires: Vec<NodeId>,
    /// Shortest distance from the root
    pub depth: usize,
    pub package_id: Option<PackageId>,
    pub state: NodeState,
    /// Info published by this node's `package_info`, once available
    pub published: Option<PublishedInfo>,
    /// Own info merged with all dependency info, once available
    pub composed: Option<ComposedInfo>,
}

impl fmt::Debug for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphNode")
            .field("reference", &self.reference)
            .field("settings", &self.settings)
            .field("options", &self.options)
            .field("requires", &self.requires)
            .field("depth", &self.depth)
            .field("package_id", &self.package_id)
            .field("state", &self.state)
            .field("published", &self.published)
            .field("composed", &self.composed)
            .finish_non_exhaustive()
    }
}

impl GraphNode {
    fn new(
        reference: Reference,
        recipe: Arc<dyn Recipe>,
        settings: Settings,
        options: Options,
        depth: usize,
    ) -> Self {
        Self {
            reference,
            recipe,
            settings,
            options,
            requires: Vec::new(),
            depth,
            package_id: None,
            state: NodeState::Pending,
            published: None,
            composed: None,
        }
    }

    /// Full package reference, available after identity assignment
    pub fn package_reference(&self) -> Result<PackageReference> {
        let id = self.package_id.clone().ok_or_else(|| {
            Error::Internal(format!("identity not assigned for {}", self.reference))
        })?;
        Ok(PackageReference::new(self.reference.clone(), id))
    }
}

/// Resolved dependency graph rooted at the consumer
#[derive(Debug)]
pub struct Graph {
    nodes: Vec<GraphNode>,
    root: NodeId,
    by_name: BTreeMap<String, NodeId>,
}

impl Graph {
    pub(crate) fn with_root(
        reference: Reference,
        recipe: Arc<dyn Recipe>,
        settings: Settings,
        options: Options,
    ) -> Self {
        let name = reference.name.clone();
        let root = GraphNode::new(reference, recipe, settings, options, 0);
        Self {
            nodes: vec![root],
            root: 0,
            by_name: BTreeMap::from([(name, 0)]),
        }
    }

    pub(crate) fn add_node(
        &mut self,
        reference: Reference,
        recipe: Arc<dyn Recipe>,
        settings: Settings,
        options: Options,
        depth: usize,
    ) -> NodeId {
        let id = self.nodes.len();
        self.by_name.insert(reference.name.clone(), id);
        self.nodes
            .push(GraphNode::new(reference, recipe, settings, options, depth));
        id
    }

    /// Add a requirement edge, keeping declaration order and skipping
    /// duplicates
    pub(crate) fn add_edge(&mut self, from: NodeId, to: NodeId) {
        let requires = &mut self.nodes[from].requires;
        if !requires.contains(&to) {
            requires.push(to);
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &GraphNode {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut GraphNode {
        &mut self.nodes[id]
    }

    /// Node id by package name, if the name is in the graph
    pub fn node_by_name(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // Precise capture: callers iterate ids while mutating nodes
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + use<> {
        0..self.nodes.len()
    }

    /// Dependency-first ordering (every node appears after all nodes it
    /// requires)
    ///
    /// Deterministic for a given graph: ties break by insertion order.
    /// Fails with the cycle's reference names if the graph is not acyclic.
    pub fn topological_order(&self) -> Result<Vec<NodeId>> {
        let mut pending: Vec<usize> = self.nodes.iter().map(|n| n.requires.len()).collect();
        let mut dependents: Vec<Vec<NodeId>> = vec![Vec::new(); self.nodes.len()];
        for (id, node) in self.nodes.iter().enumerate() {
            for &req in &node.requires {
                dependents[req].push(id);
            }
        }

        let mut queue: VecDeque<NodeId> = (0..self.nodes.len())
            .filter(|&id| pending[id] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(id) = queue.pop_front() {
            order.push(id);
            for &dependent in &dependents[id] {
                pending[dependent] -= 1;
                if pending[dependent] == 0 {
                    queue.push_back(dependent);
                }
            }
        }

        if order.len() != self.nodes.len() {
            let cycle = self.detect_cycle().unwrap_or_default();
            return Err(Error::CircularDependency { cycle });
        }
        Ok(order)
    }

    /// Find one dependency cycle, as reference names in traversal order
    pub fn detect_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            White,
            Gray,
            Black,
        }

        fn visit(
            graph: &Graph,
            id: NodeId,
            marks: &mut [Mark],
            path: &mut Vec<NodeId>,
        ) -> Option<Vec<String>> {
            marks[id] = Mark::Gray;
            path.push(id);
            for &req in &graph.nodes[id].requires {
                match marks[req] {
                    Mark::Gray => {
                        // Close the loop from the first occurrence of `req`
                        let start = path.iter().position(|&p| p == req).unwrap_or(0);
                        let mut cycle: Vec<String> = path[start..]
                            .iter()
                            .map(|&p| graph.nodes[p].reference.to_string())
                            .collect();
                        cycle.push(graph.nodes[req].reference.to_string());
                        return Some(cycle);
                    }
                    Mark::White => {
                        if let Some(cycle) = visit(graph, req, marks, path) {
                            return Some(cycle);
                        }
                    }
                    Mark::Black => {}
                }
            }
            path.pop();
            marks[id] = Mark::Black;
            None
        }

        let mut marks = vec![Mark::White; self.nodes.len()];
        let mut path = Vec::new();
        for id in 0..self.nodes.len() {
            if marks[id] == Mark::White {
                if let Some(cycle) = visit(self, id, &mut marks, &mut path) {
                    return Some(cycle);
                }
            }
        }
        None
    }

    /// Assign package identities bottom-up
    ///
    /// A node's identity hashes its settings, options, and the full
    /// package references of its direct requirements, so a changed
    /// dependency identity ripples up to every dependent.
    pub fn assign_identities(&mut self) -> Result<()> {
        for id in self.topological_order()? {
            let mut requires = Vec::with_capacity(self.nodes[id].requires.len());
            for &req in &self.nodes[id].requires {
                requires.push(self.nodes[req].package_reference()?);
            }
            let node = &mut self.nodes[id];
            let identity = identity::compute(&node.settings, &node.options, &requires);
            debug!("{} -> {}", node.reference, identity);
            node.package_id = Some(identity);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::RecipeMeta;

    struct NoopRecipe {
        meta: RecipeMeta,
    }

    impl Recipe for NoopRecipe {
        fn meta(&self) -> &RecipeMeta {
            &self.meta
        }
    }

    fn noop(name: &str, version: &str) -> Arc<dyn Recipe> {
        Arc::new(NoopRecipe {
            meta: RecipeMeta::new(name, version),
        })
    }

    fn reference(text: &str) -> Reference {
        Reference::parse(text).unwrap()
    }

    fn diamond() -> Graph {
        // root -> a -> base, root -> b -> base
        let mut graph = Graph::with_root(
            Reference::consumer("root", "0.1").unwrap(),
            noop("root", "0.1"),
            Settings::new(),
            Options::new(),
        );
        let a = graph.add_node(
            reference("a/1.0@u/c"),
            noop("a", "1.0"),
            Settings::new(),
            Options::new(),
            1,
        );
        let b = graph.add_node(
            reference("b/1.0@u/c"),
            noop("b", "1.0"),
            Settings::new(),
            Options::new(),
            1,
        );
        let base = graph.add_node(
            reference("base/1.0@u/c"),
            noop("base", "1.0"),
            Settings::new(),
            Options::new(),
            2,
        );
        graph.add_edge(graph.root(), a);
        graph.add_edge(graph.root(), b);
        graph.add_edge(a, base);
        graph.add_edge(b, base);
        graph
    }

    #[test]
    fn test_topological_order_dependency_first() {
        let graph = diamond();
        let order = graph.topological_order().unwrap();
        let position = |name: &str| {
            order
                .iter()
                .position(|&id| graph.node(id).reference.name == name)
                .unwrap()
        };

        assert!(position("base") < position("a"));
        assert!(position("base") < position("b"));
        assert!(position("a") < position("root"));
        assert!(position("b") < position("root"));
    }

    #[test]
    fn test_cycle_detected_with_names() {
        let mut graph = diamond();
        let a = graph.node_by_name("a").unwrap();
        let base = graph.node_by_name("base").unwrap();
        graph.add_edge(base, a);

        let cycle = graph.detect_cycle().expect("cycle expected");
        assert_eq!(cycle.first(), cycle.last());
        assert!(cycle.iter().any(|n| n.starts_with("a/1.0")));
        assert!(cycle.iter().any(|n| n.starts_with("base/1.0")));

        assert!(matches!(
            graph.topological_order(),
            Err(Error::CircularDependency { .. })
        ));
    }

    #[test]
    fn test_identity_assignment_bottom_up() {
        let mut graph = diamond();
        graph.assign_identities().unwrap();
        for id in graph.node_ids() {
            assert!(graph.node(id).package_id.is_some());
        }

        // a and b share configuration and dependencies, so they get the
        // same identity; root differs because it carries requirements.
        let id_of = |name: &str| {
            graph
                .node(graph.node_by_name(name).unwrap())
                .package_id
                .clone()
                .unwrap()
        };
        assert_eq!(id_of("a"), id_of("b"));
        assert_ne!(id_of("a"), id_of("root"));
    }

    #[test]
    fn test_dependency_identity_change_ripples_up() {
        let mut plain = diamond();
        plain.assign_identities().unwrap();

        let mut tweaked = diamond();
        let base = tweaked.node_by_name("base").unwrap();
        tweaked.node_mut(base).options.set("shared", "True");
        tweaked.assign_identities().unwrap();

        for name in ["base", "a", "b", "root"] {
            let id = plain.node_by_name(name).unwrap();
            assert_ne!(
                plain.node(id).package_id,
                tweaked.node(id).package_id,
                "{} should ripple",
                name
            );
        }
    }

    #[test]
    fn test_duplicate_edge_ignored() {
        let mut graph = diamond();
        let a = graph.node_by_name("a").unwrap();
        let before = graph.node(graph.root()).requires.len();
        graph.add_edge(graph.root(), a);
        assert_eq!(graph.node(graph.root()).requires.len(), before);
    }

    #[test]
    fn test_package_reference_requires_identity() {
        let graph = diamond();
        assert!(graph.node(graph.root()).package_reference().is_err());
    }
}
