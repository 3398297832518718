//! Module lifecycle tests
//!
//! Tests for discovery, dependency ordering, cycles, loading, unloading and
//! shutdown.

use proptest::prelude::*;
use std::sync::Arc;

use super::test_utils::*;
use modhost::{InitOptions, ModuleError, ModuleState};

#[tokio::test]
async fn test_dependency_loads_before_dependent() {
    let mut fixture = ModuleTestFixture::new();
    fixture.add_module("base", &[]).add_module("feature", &["base"]);

    let manager = fixture.loaded_manager().await;

    assert_eq!(manager.load_order(), ["base", "feature"]);
    assert_eq!(fixture.journal.inits(), vec!["base", "feature"]);

    let feature = manager.get_api_as::<TestApi>("feature").await.unwrap();
    assert_eq!(feature.injected, vec!["base", "config", "logger"]);
}

#[tokio::test]
async fn test_enumeration_order_does_not_override_dependencies() {
    let mut fixture = ModuleTestFixture::new();
    // "a-app" sorts first but depends on everything else
    fixture
        .add_module("a-app", &["z-store", "m-bus"])
        .add_module("m-bus", &["z-store"])
        .add_module("z-store", &[]);

    let manager = fixture.loaded_manager().await;
    assert_eq!(manager.load_order(), ["z-store", "m-bus", "a-app"]);
}

#[tokio::test]
async fn test_load_twice_initializes_once() {
    let mut fixture = ModuleTestFixture::new();
    fixture.add_module("base", &[]);
    let mut manager = fixture.manager().await;

    let first = manager.load_module("base", InitOptions::new()).await.unwrap();
    let second = manager.load_module("base", InitOptions::new()).await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(fixture.journal.inits(), vec!["base"]);
    assert_eq!(manager.load_order(), ["base"]);
}

#[tokio::test]
async fn test_shared_dependency_initialized_once() {
    let mut fixture = ModuleTestFixture::new();
    fixture
        .add_module("core", &[])
        .add_module("left", &["core"])
        .add_module("right", &["core"])
        .add_module("top", &["left", "right"]);

    let manager = fixture.loaded_manager().await;
    assert_eq!(manager.load_order(), ["core", "left", "right", "top"]);
    assert_eq!(fixture.journal.inits().iter().filter(|id| *id == "core").count(), 1);
}

#[tokio::test]
async fn test_unload_required_module_is_refused() {
    let mut fixture = ModuleTestFixture::new();
    fixture.add_module("base", &[]).add_module("feature", &["base"]);
    let mut manager = fixture.loaded_manager().await;

    let err = manager.unload_module("base").await.unwrap_err();
    match err {
        ModuleError::DependencyConflict { module, dependents } => {
            assert_eq!(module, "base");
            assert_eq!(dependents, vec!["feature"]);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(manager.is_loaded("base"));
    assert!(fixture.journal.cleanups().is_empty());

    manager.unload_module("feature").await.unwrap();
    manager.unload_module("base").await.unwrap();
    assert!(manager.load_order().is_empty());
    assert_eq!(fixture.journal.cleanups(), vec!["feature", "base"]);
}

#[tokio::test]
async fn test_unload_not_loaded_is_noop() {
    let fixture = ModuleTestFixture::new();
    let mut manager = fixture.manager().await;
    manager.unload_module("ghost").await.unwrap();
    assert!(fixture.journal.events().is_empty());
}

#[tokio::test]
async fn test_unload_cleanup_failure_keeps_module_loaded() {
    let mut fixture = ModuleTestFixture::new();
    fixture.add_module_with("flaky", &[], Behavior::FailCleanup);
    let mut manager = fixture.loaded_manager().await;

    let err = manager.unload_module("flaky").await.unwrap_err();
    assert!(matches!(err, ModuleError::CleanupError { ref module, .. } if module == "flaky"));
    assert!(manager.is_loaded("flaky"));
    assert_eq!(manager.module_state("flaky"), ModuleState::Loaded);
    assert!(manager.get_api("flaky").await.is_ok());
}

#[tokio::test]
async fn test_unload_all_reverses_load_order() {
    let mut fixture = ModuleTestFixture::new();
    fixture
        .add_module("base", &[])
        .add_module("feature", &["base"])
        .add_module("extra", &["feature"]);
    let mut manager = fixture.loaded_manager().await;

    let report = manager.unload_all_modules().await;

    assert_eq!(report.unloaded, vec!["extra", "feature", "base"]);
    assert_eq!(fixture.journal.cleanups(), vec!["extra", "feature", "base"]);
    assert!(report.failures.is_empty());
}

#[tokio::test]
async fn test_unload_all_survives_cleanup_failure() {
    let mut fixture = ModuleTestFixture::new();
    fixture
        .add_module("base", &[])
        .add_module_with("flaky", &["base"], Behavior::FailCleanup)
        .add_module("zeta", &[]);
    let mut manager = fixture.loaded_manager().await;

    let report = manager.unload_all_modules().await;

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, "flaky");
    assert_eq!(fixture.journal.cleanups().len(), 3);
    assert!(manager.load_order().is_empty());
    assert!(manager.loaded_module_ids().is_empty());
    assert!(manager.get_module_context("base").is_none());
    assert!(manager.api_hub().is_empty().await);
    assert!(!manager.is_initialized());
}

#[tokio::test]
async fn test_cycle_is_detected() {
    let mut fixture = ModuleTestFixture::new();
    fixture.add_module("a", &["b"]).add_module("b", &["a"]);
    let mut manager = fixture.manager().await;

    let err = manager.load_module("a", InitOptions::new()).await.unwrap_err();
    match err {
        ModuleError::CyclicDependency { cycle } => assert_eq!(cycle, vec!["a", "b", "a"]),
        other => panic!("unexpected error: {}", other),
    }
    assert!(!manager.is_loaded("a"));
    assert!(!manager.is_loaded("b"));
    assert!(fixture.journal.inits().is_empty());
    assert_eq!(manager.module_state("a"), ModuleState::Unloaded);
}

#[tokio::test]
async fn test_cycle_does_not_block_independent_modules() {
    let mut fixture = ModuleTestFixture::new();
    fixture
        .add_module("a", &["b"])
        .add_module("b", &["a"])
        .add_module("solo", &[]);
    let mut manager = fixture.manager().await;

    let report = manager
        .discover_and_load_all(&fixture.modules_dir, InitOptions::new())
        .await
        .unwrap();

    assert_eq!(report.loaded, vec!["solo"]);
    let failed: Vec<&str> = report.failed.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(failed, vec!["a", "b"]);
    assert!(report.has_structural_failures());
}

#[tokio::test]
async fn test_self_dependency_is_a_cycle() {
    let mut fixture = ModuleTestFixture::new();
    fixture.add_module("loop", &["loop"]);
    let mut manager = fixture.manager().await;

    let err = manager.load_module("loop", InitOptions::new()).await.unwrap_err();
    assert_eq!(err.to_string(), "Cyclic dependency detected: loop -> loop");
}

#[tokio::test]
async fn test_missing_dependency_fails_dependent() {
    let mut fixture = ModuleTestFixture::new();
    fixture.add_module("feature", &["nowhere"]);
    let mut manager = fixture.manager().await;

    let err = manager.load_module("feature", InitOptions::new()).await.unwrap_err();
    assert!(matches!(err, ModuleError::ManifestNotFound(_)));
    assert!(!manager.is_loaded("feature"));
}

#[tokio::test]
async fn test_unregistered_entry_fails_before_dependencies() {
    let mut fixture = ModuleTestFixture::new();
    fixture.add_module("base", &[]);
    fixture.write_manifest("orphan", &["base"]);
    let mut manager = fixture.manager().await;

    let err = manager.load_module("orphan", InitOptions::new()).await.unwrap_err();
    assert!(matches!(err, ModuleError::InvalidEntryPoint(_)));
    assert!(!manager.is_loaded("base"));
}

#[tokio::test]
async fn test_failed_initialize_is_wrapped() {
    let mut fixture = ModuleTestFixture::new();
    fixture
        .add_module("base", &[])
        .add_module_with("broken", &["base"], Behavior::FailInit);
    let mut manager = fixture.manager().await;

    let err = manager.load_module("broken", InitOptions::new()).await.unwrap_err();
    assert!(!err.is_structural());
    match err {
        ModuleError::InitializationError { module, reason } => {
            assert_eq!(module, "broken");
            assert!(reason.contains("broker unreachable"));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(!manager.is_loaded("broken"));
    // The dependency finished initializing and stays loaded
    assert!(manager.is_loaded("base"));
}

#[tokio::test]
async fn test_invalid_manifest_is_reported() {
    let mut fixture = ModuleTestFixture::new();
    fixture.register_entry("bad", Behavior::Normal);
    fixture.write_raw_manifest("bad", "{ \"id\": \"bad\", ");
    fixture.register_entry("blank", Behavior::Normal);
    fixture.write_raw_manifest("blank", r#"{"id": "blank", "name": "", "version": "1"}"#);
    let mut manager = fixture.manager().await;

    let err = manager.load_module("bad", InitOptions::new()).await.unwrap_err();
    assert!(matches!(err, ModuleError::InvalidManifest(_)));
    let err = manager.load_module("blank", InitOptions::new()).await.unwrap_err();
    assert!(matches!(err, ModuleError::InvalidManifest(_)));
}

#[tokio::test]
async fn test_discovery_skips_non_module_entries() {
    let mut fixture = ModuleTestFixture::new();
    fixture.add_module("base", &[]);
    std::fs::create_dir_all(fixture.modules_dir.join("assets")).unwrap();
    std::fs::write(fixture.modules_dir.join("README.md"), "not a module").unwrap();

    let manager = fixture.loaded_manager().await;
    assert_eq!(manager.load_order(), ["base"]);
}

#[tokio::test]
async fn test_reserved_directory_is_skipped() {
    let mut fixture = ModuleTestFixture::new();
    fixture.add_module("base", &[]).add_module("config", &[]);

    let mut manager = fixture.manager().await;
    let report = manager
        .discover_and_load_all(&fixture.modules_dir, InitOptions::new())
        .await
        .unwrap();
    assert!(report.is_complete());
    assert_eq!(report.loaded, ["base"]);
    assert_eq!(fixture.journal.inits(), ["base"]);

    // The system store is still what "config" resolves to
    assert!(manager.config_store().is_some());
    assert!(manager.get_api_as::<modhost::ConfigStore>("config").await.is_ok());
}

#[tokio::test]
async fn test_load_rejects_malformed_id() {
    let mut fixture = ModuleTestFixture::new();
    fixture.add_module("base", &[]);
    let mut manager = fixture.manager().await;

    for id in ["../base", "", "base/..", ".hidden"] {
        let err = manager.load_module(id, InitOptions::new()).await.unwrap_err();
        assert!(matches!(err, ModuleError::ModuleNotFound(_)), "{}: {}", id, err);
    }
    assert!(fixture.journal.events().is_empty());

    manager.load_module("base", InitOptions::new()).await.unwrap();
    assert!(manager.is_loaded("base"));
}

#[tokio::test]
async fn test_missing_modules_dir_loads_nothing() {
    let fixture = ModuleTestFixture::new();
    let mut manager = fixture.manager().await;

    let report = manager
        .discover_and_load_all(fixture.path().join("absent"), InitOptions::new())
        .await
        .unwrap();
    assert!(report.loaded.is_empty());
    assert!(report.is_complete());
}

#[tokio::test]
async fn test_directory_name_is_module_id() {
    let mut fixture = ModuleTestFixture::new();
    fixture.register_entry("renamed", Behavior::Normal);
    fixture.write_raw_manifest(
        "renamed",
        r#"{"id": "original", "name": "Renamed", "version": "2.0.0", "entry": "renamed"}"#,
    );
    let mut manager = fixture.manager().await;

    manager.load_module("renamed", InitOptions::new()).await.unwrap();
    assert!(manager.is_loaded("renamed"));
    assert!(!manager.is_loaded("original"));
    assert_eq!(manager.manifest("renamed").unwrap().version, "2.0.0");
}

#[tokio::test]
async fn test_module_can_be_loaded_again_after_unload() {
    let mut fixture = ModuleTestFixture::new();
    fixture.add_module("base", &[]);
    let mut manager = fixture.manager().await;

    manager.load_module("base", InitOptions::new()).await.unwrap();
    manager.unload_module("base").await.unwrap();
    manager.load_module("base", InitOptions::new()).await.unwrap();

    assert_eq!(fixture.journal.inits(), vec!["base", "base"]);
    assert_eq!(manager.load_order(), ["base"]);
}

#[tokio::test]
async fn test_runtime_can_restart_after_shutdown() {
    let mut fixture = ModuleTestFixture::new();
    fixture.add_module("base", &[]);
    let mut manager = fixture.loaded_manager().await;

    manager.unload_all_modules().await;
    manager.initialize_runtime(&fixture.config_path).await.unwrap();
    manager.load_module("base", InitOptions::new()).await.unwrap();

    assert!(manager.is_loaded("base"));
    assert!(manager.config_store().is_some());
}

/// Dependency graph over `m0..mN`: module `i` depends on `j < i` when `edges[i][j]`
fn write_graph(fixture: &mut ModuleTestFixture, edges: &[Vec<bool>]) -> Vec<(String, Vec<String>)> {
    let mut graph = Vec::new();
    for (i, row) in edges.iter().enumerate() {
        let id = format!("m{}", i);
        let deps: Vec<String> = (0..i).filter(|j| row[*j]).map(|j| format!("m{}", j)).collect();
        let dep_refs: Vec<&str> = deps.iter().map(String::as_str).collect();
        fixture.add_module(&id, &dep_refs);
        graph.push((id, deps));
    }
    graph
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_dependencies_precede_dependents(
        edges in prop::collection::vec(prop::collection::vec(any::<bool>(), 8), 1..8)
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let mut fixture = ModuleTestFixture::new();
        let graph = write_graph(&mut fixture, &edges);

        let (order, inits) = runtime.block_on(async {
            let manager = fixture.loaded_manager().await;
            (manager.loaded_module_ids(), fixture.journal.inits())
        });

        prop_assert_eq!(order.len(), graph.len());
        prop_assert_eq!(&order, &inits);
        for (id, deps) in &graph {
            let at = order.iter().position(|m| m == id).unwrap();
            for dep in deps {
                let dep_at = order.iter().position(|m| m == dep).unwrap();
                prop_assert!(dep_at < at, "{} loaded after {}", dep, id);
            }
        }
    }
}
