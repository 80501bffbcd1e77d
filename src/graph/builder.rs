// src/graph/builder.rs

//! Graph expansion: from a root recipe to a resolved, identified graph
//!
//! Expansion walks requirements breadth-first from the root, so the first
//! node created for a package name is always the one closest to the root.
//! Per name the graph holds exactly one node; a later requirement for the
//! same name either folds into the existing node (when it admits the
//! already-resolved reference) or fails with a conflict naming both
//! requirers.
//!
//! Resolution order per requirement: invoker override pin, then the
//! declared exact version, then the newest exported version matching a
//! declared range.
//!
//! Option values resolve after expansion: recipe defaults first, then
//! forces from dependents (closest to the root wins), then invoker forces
//! over everything.

use crate::error::{Error, Result};
use crate::graph::{Graph, NodeId};
use crate::recipe::{Recipe, RecipeMeta, RecipeSource, Requirement};
use crate::reference::Reference;
use crate::settings::Settings;
use semver::Version;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, info};

/// Expands a root recipe into a resolved dependency graph
pub struct GraphBuilder<'a> {
    source: &'a dyn RecipeSource,
    /// Per-name reference pins that win over declared requirements
    overrides: BTreeMap<String, Reference>,
    /// (package, option, value) forces from the invoker
    forced_options: Vec<(String, String, String)>,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(source: &'a dyn RecipeSource) -> Self {
        Self {
            source,
            overrides: BTreeMap::new(),
            forced_options: Vec::new(),
        }
    }

    /// Pin every requirement for `reference.name` to this exact reference
    pub fn with_override(mut self, reference: Reference) -> Self {
        self.overrides.insert(reference.name.clone(), reference);
        self
    }

    /// Force an option value on a named package in the graph
    pub fn with_option(
        mut self,
        package: impl Into<String>,
        option: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.forced_options
            .push((package.into(), option.into(), value.into()));
        self
    }

    /// Expand, resolve options, verify acyclicity, and assign identities
    pub fn build(&self, root: Arc<dyn Recipe>, profile: &Settings) -> Result<Graph> {
        let root_meta = root.meta();
        let root_reference = Reference::consumer(&root_meta.name, &root_meta.version)?;
        let settings = node_settings(profile, root_meta);

        let mut graph = Graph::with_root(
            root_reference.clone(),
            root.clone(),
            settings,
            Default::default(),
        );

        // Which requirer introduced each name, for conflict diagnostics
        let mut introduced_by: BTreeMap<String, Reference> = BTreeMap::new();
        introduced_by.insert(root_reference.name.clone(), root_reference);

        let mut queue: VecDeque<(NodeId, Requirement)> = root_meta
            .requires
            .iter()
            .cloned()
            .map(|req| (graph.root(), req))
            .collect();

        while let Some((parent, requirement)) = queue.pop_front() {
            let parent_reference = graph.node(parent).reference.clone();
            if requirement.name == parent_reference.name {
                return Err(Error::CircularDependency {
                    cycle: vec![
                        parent_reference.to_string(),
                        parent_reference.to_string(),
                    ],
                });
            }

            let resolved = self.resolve(&requirement)?;

            if let Some(existing) = graph.node_by_name(&requirement.name) {
                let existing_reference = graph.node(existing).reference.clone();
                if existing_reference == resolved || requirement.admits(&existing_reference) {
                    // Closest-to-root resolution wins
                    graph.add_edge(parent, existing);
                    continue;
                }
                return Err(Error::Conflict {
                    name: requirement.name.clone(),
                    existing: existing_reference.to_string(),
                    existing_via: introduced_by
                        .get(&requirement.name)
                        .map(|r| r.to_string())
                        .unwrap_or_default(),
                    candidate: resolved.to_string(),
                    candidate_via: parent_reference.to_string(),
                });
            }

            let recipe = self.source.recipe(&resolved)?;
            let settings = node_settings(profile, recipe.meta());
            let depth = graph.node(parent).depth + 1;
            let requires = recipe.meta().requires.clone();

            debug!("Resolved {} -> {} (depth {})", requirement, resolved, depth);
            let id = graph.add_node(resolved, recipe, settings, Default::default(), depth);
            graph.add_edge(parent, id);
            introduced_by.insert(requirement.name.clone(), parent_reference);

            for child in requires {
                queue.push_back((id, child));
            }
        }

        if let Some(cycle) = graph.detect_cycle() {
            return Err(Error::CircularDependency { cycle });
        }

        self.assign_options(&mut graph)?;
        graph.assign_identities()?;
        info!("Resolved graph with {} nodes", graph.len());
        Ok(graph)
    }

    /// Resolve one requirement to a concrete reference
    fn resolve(&self, requirement: &Requirement) -> Result<Reference> {
        if let Some(pin) = self.overrides.get(&requirement.name) {
            return Ok(pin.clone());
        }
        if let Some(exact) = requirement.to_reference() {
            return exact;
        }

        // Ranged requirement: newest exported version in range
        let mut best: Option<Version> = None;
        for candidate in
            self.source
                .versions(&requirement.name, &requirement.user, &requirement.channel)
        {
            if !requirement.version.admits(&candidate) {
                continue;
            }
            if let Ok(version) = Version::parse(&candidate) {
                if best.as_ref().is_none_or(|b| version > *b) {
                    best = Some(version);
                }
            }
        }
        let version = best.ok_or_else(|| Error::RecipeNotFound(requirement.to_string()))?;
        Reference::new(
            requirement.name.clone(),
            version.to_string(),
            requirement.user.clone(),
            requirement.channel.clone(),
        )
    }

    /// Resolve option values across the whole graph
    fn assign_options(&self, graph: &mut Graph) -> Result<()> {
        for id in graph.node_ids() {
            let defaults = graph.node(id).recipe.meta().default_options.clone();
            let node = graph.node_mut(id);
            for (option, value) in defaults {
                node.options.set(option, value);
            }
        }

        let mut decided: BTreeSet<(String, String)> = BTreeSet::new();

        // Invoker forces outrank every recipe-declared force
        for (package, option, value) in &self.forced_options {
            let id = graph
                .node_by_name(package)
                .ok_or_else(|| Error::UnknownDependency(package.clone()))?;
            graph.node_mut(id).options.set(option.clone(), value.clone());
            decided.insert((package.clone(), option.clone()));
        }

        // Dependent forces: walk from the root outwards so the force
        // closest to the root decides each (package, option) pair
        let mut by_depth: Vec<NodeId> = graph.node_ids().collect();
        by_depth.sort_by_key(|&id| (graph.node(id).depth, id));
        for id in by_depth {
            let forces = graph.node(id).recipe.meta().dep_options.clone();
            for force in forces {
                let key = (force.dependency.clone(), force.option.clone());
                if decided.contains(&key) {
                    continue;
                }
                let target = graph
                    .node_by_name(&force.dependency)
                    .ok_or_else(|| Error::UnknownDependency(force.dependency.clone()))?;
                graph.node_mut(target).options.set(force.option, force.value);
                decided.insert(key);
            }
        }
        Ok(())
    }
}

fn node_settings(profile: &Settings, meta: &RecipeMeta) -> Settings {
    let mut settings = profile.narrowed(&meta.settings);
    settings.apply_pins(&meta.pinned_settings);
    settings
}
