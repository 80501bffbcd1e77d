// tests/graph_resolution.rs

//! Resolution-level behavior through the client: conflicts, overrides,
//! ranges, cycles, and closure ordering.

mod common;

use common::{Sandbox, TestRecipe};
use quarry::{CollectingSink, Error, InstallRequest, Reference};
use std::sync::Arc;

#[test]
fn conflict_reports_both_requirers() {
    let sandbox = Sandbox::new();
    let mut client = sandbox.client();
    client
        .export(Arc::new(TestRecipe::new("base", "1.0")), "u", "c")
        .unwrap();
    client
        .export(Arc::new(TestRecipe::new("base", "2.0")), "u", "c")
        .unwrap();
    client
        .export(
            Arc::new(TestRecipe::new("a", "1.0").requires("base/1.0@u/c")),
            "u",
            "c",
        )
        .unwrap();
    client
        .export(
            Arc::new(TestRecipe::new("b", "1.0").requires("base/2.0@u/c")),
            "u",
            "c",
        )
        .unwrap();

    let root = Arc::new(
        TestRecipe::new("app", "0.1")
            .requires("a/1.0@u/c")
            .requires("b/1.0@u/c"),
    );
    let err = client
        .resolve(root, &InstallRequest::new())
        .expect_err("conflicting versions must not resolve");
    assert!(err.is_resolution());
    let message = err.to_string();
    assert!(message.contains("base/1.0@u/c"));
    assert!(message.contains("base/2.0@u/c"));
    assert!(message.contains("required by b/1.0@u/c"));
    assert!(message.contains("pin an override"));
}

#[test]
fn override_pin_applies_to_whole_graph() {
    let sandbox = Sandbox::new();
    let mut client = sandbox.client();
    client
        .export(Arc::new(TestRecipe::new("base", "1.0")), "u", "c")
        .unwrap();
    client
        .export(Arc::new(TestRecipe::new("base", "2.0")), "u", "c")
        .unwrap();
    client
        .export(
            Arc::new(TestRecipe::new("a", "1.0").requires("base/1.0@u/c")),
            "u",
            "c",
        )
        .unwrap();
    client
        .export(
            Arc::new(TestRecipe::new("b", "1.0").requires("base/2.0@u/c")),
            "u",
            "c",
        )
        .unwrap();

    let root = Arc::new(
        TestRecipe::new("app", "0.1")
            .requires("a/1.0@u/c")
            .requires("b/1.0@u/c"),
    );
    let request = InstallRequest::new()
        .with_override(Reference::parse("base/2.0@u/c").unwrap());
    let graph = client.resolve(root, &request).unwrap();

    let base = graph.node_by_name("base").unwrap();
    assert_eq!(graph.node(base).reference.version, "2.0");
    assert_eq!(graph.len(), 4);
}

#[test]
fn range_requirement_tracks_newest_export() {
    let sandbox = Sandbox::new();
    let mut client = sandbox.client();
    client
        .export(Arc::new(TestRecipe::new("zlib", "1.2.0")), "lasote", "stable")
        .unwrap();

    let root = || {
        Arc::new(TestRecipe::new("app", "0.1").requires("zlib/[>=1.0, <2.0]@lasote/stable"))
    };
    let graph = client.resolve(root(), &InstallRequest::new()).unwrap();
    let zlib = graph.node_by_name("zlib").unwrap();
    assert_eq!(graph.node(zlib).reference.version, "1.2.0");

    // A newer in-range export wins the next resolution
    client
        .export(Arc::new(TestRecipe::new("zlib", "1.5.0")), "lasote", "stable")
        .unwrap();
    let graph = client.resolve(root(), &InstallRequest::new()).unwrap();
    let zlib = graph.node_by_name("zlib").unwrap();
    assert_eq!(graph.node(zlib).reference.version, "1.5.0");

    // Out-of-range exports are ignored
    client
        .export(Arc::new(TestRecipe::new("zlib", "2.1.0")), "lasote", "stable")
        .unwrap();
    let graph = client.resolve(root(), &InstallRequest::new()).unwrap();
    let zlib = graph.node_by_name("zlib").unwrap();
    assert_eq!(graph.node(zlib).reference.version, "1.5.0");
}

#[test]
fn requirement_cycle_rejected_before_any_build() {
    let sandbox = Sandbox::new();
    let mut client = sandbox.client();
    client
        .export(
            Arc::new(TestRecipe::new("ping", "1.0").requires("pong/1.0@u/c")),
            "u",
            "c",
        )
        .unwrap();
    client
        .export(
            Arc::new(TestRecipe::new("pong", "1.0").requires("ping/1.0@u/c")),
            "u",
            "c",
        )
        .unwrap();

    let root = Arc::new(TestRecipe::new("app", "0.1").requires("ping/1.0@u/c"));
    let mut sink = CollectingSink::new();
    let err = client
        .install(
            root,
            &InstallRequest::new(),
            &sandbox.workspace_path(),
            &mut sink,
        )
        .expect_err("cycle must abort resolution");
    match err {
        Error::CircularDependency { cycle } => {
            assert!(cycle.iter().any(|n| n.starts_with("ping/1.0")));
            assert!(cycle.iter().any(|n| n.starts_with("pong/1.0")));
            assert_eq!(cycle.first(), cycle.last());
        }
        other => panic!("expected CircularDependency, got {}", other),
    }
    // Nothing was built
    assert!(!sink.contains("BUILD RAN"));
}

#[test]
fn diamond_dependency_builds_once() {
    let sandbox = Sandbox::new();
    let mut client = sandbox.client();
    client
        .export(
            Arc::new(TestRecipe::new("base", "1.0").env("BASEVAR", "yes")),
            "u",
            "c",
        )
        .unwrap();
    client
        .export(
            Arc::new(TestRecipe::new("left", "1.0").requires("base/1.0@u/c")),
            "u",
            "c",
        )
        .unwrap();
    client
        .export(
            Arc::new(TestRecipe::new("right", "1.0").requires("base/1.0@u/c")),
            "u",
            "c",
        )
        .unwrap();

    let root = Arc::new(
        TestRecipe::new("app", "0.1")
            .requires("left/1.0@u/c")
            .requires("right/1.0@u/c"),
    );
    let mut sink = CollectingSink::new();
    let report = client
        .install(
            root,
            &InstallRequest::new(),
            &sandbox.workspace_path(),
            &mut sink,
        )
        .unwrap();
    assert!(report.success());
    // base, left, right: one build each despite two paths to base
    assert_eq!(report.built(), 3);

    let loaded = quarry::info::load_build_info(&sandbox.workspace_path()).unwrap();
    // Declaration order with first-seen transitive placement
    let names: Vec<&str> = loaded.dependency_names().collect();
    assert_eq!(names, vec!["left", "base", "right"]);
    assert_eq!(loaded.env_var("BASEVAR"), Some("yes"));
}

#[test]
fn undeclared_settings_do_not_fragment_cache() {
    let sandbox = Sandbox::new();
    let mut client = sandbox.client();
    client
        .export(
            Arc::new(TestRecipe::new("tool", "1.0").settings(&["os"])),
            "u",
            "c",
        )
        .unwrap();
    let root = || Arc::new(TestRecipe::new("app", "0.1").requires("tool/1.0@u/c"));
    let request = |build_type: &str| {
        InstallRequest::new().with_profile(quarry::Settings::from_pairs([
            ("os", "Linux"),
            ("build_type", build_type),
        ]))
    };

    let mut sink = CollectingSink::new();
    let first = client
        .install(root(), &request("Debug"), &sandbox.workspace_path(), &mut sink)
        .unwrap();
    assert_eq!(first.built(), 1);

    // tool only declares `os`, so flipping build_type reuses its artifact
    let second = client
        .install(root(), &request("Release"), &sandbox.workspace_path(), &mut sink)
        .unwrap();
    assert_eq!(second.cached(), 1);
    assert_eq!(second.built(), 0);
}

#[test]
fn dependent_option_force_resolves_closest_to_root() {
    let sandbox = Sandbox::new();
    let mut client = sandbox.client();
    client
        .export(
            Arc::new(TestRecipe::new("base", "1.0").default_option("shared", "False")),
            "u",
            "c",
        )
        .unwrap();
    client
        .export(
            Arc::new(
                TestRecipe::new("mid", "1.0")
                    .requires("base/1.0@u/c")
                    .force_dep_option("base", "shared", "True"),
            ),
            "u",
            "c",
        )
        .unwrap();

    // Root silent: mid's force decides
    let silent = Arc::new(TestRecipe::new("app", "0.1").requires("mid/1.0@u/c"));
    let graph = client.resolve(silent, &InstallRequest::new()).unwrap();
    let base = graph.node_by_name("base").unwrap();
    assert_eq!(graph.node(base).options.get("shared"), Some("True"));

    // Root forcing: closer to the root, so it wins over mid
    let forcing = Arc::new(
        TestRecipe::new("app", "0.1")
            .requires("mid/1.0@u/c")
            .force_dep_option("base", "shared", "False"),
    );
    let graph = client.resolve(forcing, &InstallRequest::new()).unwrap();
    let base = graph.node_by_name("base").unwrap();
    assert_eq!(graph.node(base).options.get("shared"), Some("False"));
}
