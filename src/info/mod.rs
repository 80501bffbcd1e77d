// src/info/mod.rs

//! Published build metadata and its propagation
//!
//! Each built node publishes a [`PublishedInfo`] from its `package_info`
//! hook: build metadata (include/lib/bin directories, libs, defines,
//! flags), environment assignments, and arbitrary user variables.
//! Directory entries are stored relative to the artifact root and resolved
//! to absolute paths when the info is composed.
//!
//! [`ComposedInfo`] merges a node's own published info with the composed
//! info of all its dependencies, exposing two views:
//!
//! - **indexed**: `composed.dependency("Hello")` returns that dependency's
//!   own facets plus its artifact root path; unknown names are an explicit
//!   error, never a silent default
//! - **flattened**: lists concatenated in dependency declaration order with
//!   first-seen duplicates removed; single-valued env entries are
//!   overridden by later merges, appendable entries concatenate preserving
//!   first-seen order

mod artifact;

pub use artifact::{BUILD_INFO_FILE, load_build_info, render_build_info, write_build_info};

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Build metadata a recipe publishes, directories relative to the
/// artifact root
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildInfo {
    #[serde(default)]
    pub include_dirs: Vec<String>,
    #[serde(default)]
    pub lib_dirs: Vec<String>,
    #[serde(default)]
    pub bin_dirs: Vec<String>,
    /// Library names to link against
    #[serde(default)]
    pub libs: Vec<String>,
    /// Preprocessor defines
    #[serde(default)]
    pub defines: Vec<String>,
    /// Compiler flags
    #[serde(default)]
    pub cflags: Vec<String>,
    /// Linker flags
    #[serde(default)]
    pub link_flags: Vec<String>,
}

impl BuildInfo {
    /// The conventional artifact layout: `include`, `lib`, `bin`
    pub fn package_layout() -> Self {
        Self {
            include_dirs: vec!["include".to_string()],
            lib_dirs: vec!["lib".to_string()],
            bin_dirs: vec!["bin".to_string()],
            ..Self::default()
        }
    }
}

/// One environment assignment: a scalar that overrides, or an ordered
/// list that appends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    Single(String),
    List(Vec<String>),
}

/// Environment variable assignments published by a node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvInfo {
    vars: BTreeMap<String, EnvValue>,
}

impl EnvInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a single overriding value
    pub fn set(&mut self, var: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(var.into(), EnvValue::Single(value.into()));
    }

    /// Append to an ordered list value
    ///
    /// A list never appends to a scalar: appending to a variable currently
    /// holding a single value replaces it with a fresh list.
    pub fn append(&mut self, var: impl Into<String>, value: impl Into<String>) {
        let entry = self
            .vars
            .entry(var.into())
            .or_insert_with(|| EnvValue::List(Vec::new()));
        match entry {
            EnvValue::List(items) => {
                let value = value.into();
                if !items.contains(&value) {
                    items.push(value);
                }
            }
            EnvValue::Single(_) => *entry = EnvValue::List(vec![value.into()]),
        }
    }

    pub fn get(&self, var: &str) -> Option<&EnvValue> {
        self.vars.get(var)
    }

    /// Scalar value of a variable, if it holds one
    pub fn var(&self, var: &str) -> Option<&str> {
        match self.vars.get(var) {
            Some(EnvValue::Single(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EnvValue)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Merge another env on top of this one
    ///
    /// Scalars from `other` override existing entries; list entries
    /// concatenate preserving first-seen order (duplicates dropped).
    pub fn merge(&mut self, other: &EnvInfo) {
        for (var, value) in &other.vars {
            match value {
                EnvValue::Single(v) => {
                    self.vars.insert(var.clone(), EnvValue::Single(v.clone()));
                }
                EnvValue::List(items) => {
                    for item in items {
                        self.append(var.clone(), item.clone());
                    }
                }
            }
        }
    }
}

/// Arbitrary named values published by a node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserInfo {
    values: BTreeMap<String, String>,
}

impl UserInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Output of one node's `package_info` hook; immutable once produced
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublishedInfo {
    #[serde(default)]
    pub build: BuildInfo,
    #[serde(default)]
    pub env: EnvInfo,
    #[serde(default)]
    pub user: UserInfo,
}

impl PublishedInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Published info with the conventional `include`/`lib`/`bin` layout
    pub fn package_layout() -> Self {
        Self {
            build: BuildInfo::package_layout(),
            ..Self::default()
        }
    }
}

/// One dependency's published facets resolved against its artifact root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepView {
    /// The dependency's cache artifact directory
    pub root_path: PathBuf,
    pub include_paths: Vec<PathBuf>,
    pub lib_paths: Vec<PathBuf>,
    pub bin_paths: Vec<PathBuf>,
    pub libs: Vec<String>,
    pub defines: Vec<String>,
    pub cflags: Vec<String>,
    pub link_flags: Vec<String>,
    pub env: EnvInfo,
    pub user: UserInfo,
}

impl DepView {
    /// Resolve published info against its artifact root
    pub fn from_published(root: &Path, info: &PublishedInfo) -> Self {
        let absolute =
            |dirs: &[String]| -> Vec<PathBuf> { dirs.iter().map(|d| root.join(d)).collect() };
        Self {
            root_path: root.to_path_buf(),
            include_paths: absolute(&info.build.include_dirs),
            lib_paths: absolute(&info.build.lib_dirs),
            bin_paths: absolute(&info.build.bin_dirs),
            libs: info.build.libs.clone(),
            defines: info.build.defines.clone(),
            cflags: info.build.cflags.clone(),
            link_flags: info.build.link_flags.clone(),
            env: info.env.clone(),
            user: info.user.clone(),
        }
    }
}

fn extend_unique<T: Clone + PartialEq>(target: &mut Vec<T>, source: &[T]) {
    for item in source {
        if !target.contains(item) {
            target.push(item.clone());
        }
    }
}

/// Flattened aggregate across a node and all its transitive dependencies
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlatInfo {
    pub include_paths: Vec<PathBuf>,
    pub lib_paths: Vec<PathBuf>,
    pub bin_paths: Vec<PathBuf>,
    pub libs: Vec<String>,
    pub defines: Vec<String>,
    pub cflags: Vec<String>,
    pub link_flags: Vec<String>,
    pub env: EnvInfo,
}

impl FlatInfo {
    fn extend_from_view(&mut self, view: &DepView) {
        extend_unique(&mut self.include_paths, &view.include_paths);
        extend_unique(&mut self.lib_paths, &view.lib_paths);
        extend_unique(&mut self.bin_paths, &view.bin_paths);
        extend_unique(&mut self.libs, &view.libs);
        extend_unique(&mut self.defines, &view.defines);
        extend_unique(&mut self.cflags, &view.cflags);
        extend_unique(&mut self.link_flags, &view.link_flags);
        self.env.merge(&view.env);
    }

    fn extend_from_flat(&mut self, other: &FlatInfo) {
        extend_unique(&mut self.include_paths, &other.include_paths);
        extend_unique(&mut self.lib_paths, &other.lib_paths);
        extend_unique(&mut self.bin_paths, &other.bin_paths);
        extend_unique(&mut self.libs, &other.libs);
        extend_unique(&mut self.defines, &other.defines);
        extend_unique(&mut self.cflags, &other.cflags);
        extend_unique(&mut self.link_flags, &other.link_flags);
        self.env.merge(&other.env);
    }
}

/// A node's published info merged with the composed info of all its
/// dependencies
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComposedInfo {
    /// This node's own resolved view (absent for a consumer root that has
    /// not published anything)
    own: Option<DepView>,
    /// Dependency names in first-seen merge order
    order: Vec<String>,
    /// All transitive dependencies, indexed by exact package name
    deps: BTreeMap<String, DepView>,
    /// Flattened aggregate (own facets first, then dependencies in
    /// declaration order)
    flat: FlatInfo,
}

impl ComposedInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dependencies-only composition, merged in declaration order
    ///
    /// This is the view injected into a node's hooks before its build step
    /// runs: its own info does not exist yet.
    pub fn aggregate<'a, I>(deps: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a ComposedInfo)>,
    {
        let mut composed = Self::new();
        for (name, dep) in deps {
            composed.merge_dependency(name, dep)?;
        }
        Ok(composed)
    }

    /// Composition for a built node: its own view plus its dependencies
    pub fn for_node<'a, I>(own: DepView, deps: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a ComposedInfo)>,
    {
        let mut composed = Self::new();
        composed.flat.extend_from_view(&own);
        composed.own = Some(own);
        for (name, dep) in deps {
            composed.merge_dependency(name, dep)?;
        }
        Ok(composed)
    }

    /// Merge one dependency's composed info under the given name
    ///
    /// The dependency must already carry its own published view
    /// (topological precondition).
    pub fn merge_dependency(&mut self, name: &str, dep: &ComposedInfo) -> Result<()> {
        let own = dep
            .own
            .as_ref()
            .ok_or_else(|| Error::InfoUnavailable(name.to_string()))?;

        // Indexed view: the dependency itself, then its transitive deps.
        // First-seen wins so a diamond keeps the entry closest to the root.
        if !self.deps.contains_key(name) {
            self.deps.insert(name.to_string(), own.clone());
            self.order.push(name.to_string());
        }
        for transitive in &dep.order {
            if !self.deps.contains_key(transitive) {
                let view = dep
                    .deps
                    .get(transitive)
                    .ok_or_else(|| Error::InfoUnavailable(transitive.clone()))?;
                self.deps.insert(transitive.clone(), view.clone());
                self.order.push(transitive.clone());
            }
        }

        self.flat.extend_from_flat(&dep.flat);
        Ok(())
    }

    /// This node's own resolved view, if it has published one
    pub fn own(&self) -> Option<&DepView> {
        self.own.as_ref()
    }

    /// Indexed lookup by exact dependency name
    pub fn dependency(&self, name: &str) -> Result<&DepView> {
        self.deps
            .get(name)
            .ok_or_else(|| Error::UnknownDependency(name.to_string()))
    }

    /// Dependency names in merge order
    pub fn dependency_names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Flattened aggregate across own info and all transitive dependencies
    pub fn flattened(&self) -> &FlatInfo {
        &self.flat
    }

    pub fn include_paths(&self) -> &[PathBuf] {
        &self.flat.include_paths
    }

    pub fn lib_paths(&self) -> &[PathBuf] {
        &self.flat.lib_paths
    }

    pub fn bin_paths(&self) -> &[PathBuf] {
        &self.flat.bin_paths
    }

    pub fn env(&self) -> &EnvInfo {
        &self.flat.env
    }

    /// Scalar env value from the flattened view
    pub fn env_var(&self, var: &str) -> Option<&str> {
        self.flat.env.var(var)
    }

    pub fn is_empty(&self) -> bool {
        self.own.is_none() && self.deps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn published(include: &str, env: &[(&str, &str)]) -> PublishedInfo {
        let mut info = PublishedInfo::new();
        info.build.include_dirs = vec![include.to_string()];
        for (var, value) in env {
            info.env.set(*var, *value);
        }
        info
    }

    fn leaf(name: &str, root: &str, info: &PublishedInfo) -> (String, ComposedInfo) {
        let view = DepView::from_published(Path::new(root), info);
        (
            name.to_string(),
            ComposedInfo::for_node(view, std::iter::empty()).unwrap(),
        )
    }

    #[test]
    fn test_indexed_view_resolves_rootpath() {
        let (name, hello) = leaf("Hello", "/cache/hello", &published("include", &[]));
        let composed = ComposedInfo::aggregate([(name.as_str(), &hello)]).unwrap();

        let view = composed.dependency("Hello").unwrap();
        assert_eq!(view.root_path, PathBuf::from("/cache/hello"));
        assert_eq!(view.include_paths, vec![PathBuf::from("/cache/hello/include")]);
        assert_eq!(
            composed.include_paths(),
            &[PathBuf::from("/cache/hello/include")]
        );
    }

    #[test]
    fn test_unknown_dependency_is_explicit_error() {
        let composed = ComposedInfo::new();
        match composed.dependency("Nope") {
            Err(Error::UnknownDependency(name)) => assert_eq!(name, "Nope"),
            other => panic!("expected UnknownDependency, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_separator_names_index_exactly() {
        let (a_name, a) = leaf("Hello.Pkg", "/cache/a", &published("include", &[]));
        let (b_name, b) = leaf("Hello-Tools", "/cache/b", &published("include", &[]));
        let composed =
            ComposedInfo::aggregate([(a_name.as_str(), &a), (b_name.as_str(), &b)]).unwrap();

        assert_eq!(
            composed.dependency("Hello.Pkg").unwrap().root_path,
            PathBuf::from("/cache/a")
        );
        assert_eq!(
            composed.dependency("Hello-Tools").unwrap().root_path,
            PathBuf::from("/cache/b")
        );
        assert!(composed.dependency("Hello").is_err());
    }

    #[test]
    fn test_flatten_first_seen_order_and_dedup() {
        // Two deps contributing the same directory: one entry, first-seen
        let shared = published("include", &[]);
        let view_a = DepView::from_published(Path::new("/cache/shared"), &shared);
        let view_b = DepView::from_published(Path::new("/cache/shared"), &shared);
        let a = ComposedInfo::for_node(view_a, std::iter::empty()).unwrap();
        let b = ComposedInfo::for_node(view_b, std::iter::empty()).unwrap();

        let composed = ComposedInfo::aggregate([("a", &a), ("b", &b)]).unwrap();
        assert_eq!(
            composed.include_paths(),
            &[PathBuf::from("/cache/shared/include")]
        );
    }

    #[test]
    fn test_flatten_preserves_declaration_order() {
        let (first_name, first) = leaf("first", "/cache/first", &published("include", &[]));
        let (second_name, second) = leaf("second", "/cache/second", &published("include", &[]));
        let composed = ComposedInfo::aggregate([
            (first_name.as_str(), &first),
            (second_name.as_str(), &second),
        ])
        .unwrap();

        assert_eq!(
            composed.include_paths(),
            &[
                PathBuf::from("/cache/first/include"),
                PathBuf::from("/cache/second/include"),
            ]
        );
        let names: Vec<&str> = composed.dependency_names().collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn test_env_scalar_later_overrides() {
        let (a_name, a) = leaf("a", "/cache/a", &published("include", &[("MYVAR", "1")]));
        let (b_name, b) = leaf("b", "/cache/b", &published("include", &[("MYVAR", "2")]));
        let composed =
            ComposedInfo::aggregate([(a_name.as_str(), &a), (b_name.as_str(), &b)]).unwrap();

        assert_eq!(composed.env_var("MYVAR"), Some("2"));
        // Indexed views keep each dependency's own value
        assert_eq!(composed.dependency("a").unwrap().env.var("MYVAR"), Some("1"));
    }

    #[test]
    fn test_env_list_concatenates_first_seen() {
        let mut first = PublishedInfo::new();
        first.env.append("PATHLIST", "/a/bin");
        first.env.append("PATHLIST", "/shared/bin");
        let mut second = PublishedInfo::new();
        second.env.append("PATHLIST", "/b/bin");
        second.env.append("PATHLIST", "/shared/bin");

        let (a_name, a) = leaf("a", "/cache/a", &first);
        let (b_name, b) = leaf("b", "/cache/b", &second);
        let composed =
            ComposedInfo::aggregate([(a_name.as_str(), &a), (b_name.as_str(), &b)]).unwrap();

        match composed.env().get("PATHLIST") {
            Some(EnvValue::List(items)) => {
                assert_eq!(items, &["/a/bin", "/shared/bin", "/b/bin"]);
            }
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn test_transitive_deps_indexed_through_middle_node() {
        let (leaf_name, leaf_node) = leaf("base", "/cache/base", &published("include", &[]));
        let mid_view = DepView::from_published(
            Path::new("/cache/mid"),
            &published("include", &[]),
        );
        let mid =
            ComposedInfo::for_node(mid_view, [(leaf_name.as_str(), &leaf_node)]).unwrap();

        let composed = ComposedInfo::aggregate([("mid", &mid)]).unwrap();
        assert!(composed.dependency("mid").is_ok());
        assert!(composed.dependency("base").is_ok());
        assert_eq!(
            composed.include_paths(),
            &[
                PathBuf::from("/cache/mid/include"),
                PathBuf::from("/cache/base/include"),
            ]
        );
    }

    #[test]
    fn test_merge_requires_published_own() {
        let unbuilt = ComposedInfo::new();
        let mut composed = ComposedInfo::new();
        match composed.merge_dependency("pending", &unbuilt) {
            Err(Error::InfoUnavailable(name)) => assert_eq!(name, "pending"),
            other => panic!("expected InfoUnavailable, got {:?}", other),
        }
    }
}
