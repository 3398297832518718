//! Capability registry tests
//!
//! Tests for api publication, lookup and removal, and for the dry-run
//! dependency plan.

use super::test_utils::*;
use modhost::module::registry::{ModuleDependencies, ModuleDiscovery};
use modhost::{ConfigStore, HostLogger, ModuleError, CONFIG_MODULE_ID, LOGGER_MODULE_ID};

#[tokio::test]
async fn test_missing_api_and_missing_context() {
    let fixture = ModuleTestFixture::new();
    let manager = fixture.manager().await;

    let err = manager.get_api("missing").await.unwrap_err();
    assert!(matches!(err, ModuleError::ApiNotFound(ref id) if id == "missing"));
    assert!(manager.get_module_context("missing").is_none());
}

#[tokio::test]
async fn test_system_modules_are_published() {
    let fixture = ModuleTestFixture::new();
    let manager = fixture.manager().await;

    assert!(manager.get_api_as::<ConfigStore>(CONFIG_MODULE_ID).await.is_ok());
    let logger = manager.get_api_as::<HostLogger>(LOGGER_MODULE_ID).await.unwrap();
    assert_eq!(logger.prefix(), "modhost");

    // Not part of the load order
    assert!(manager.load_order().is_empty());
    assert!(manager.get_module_context(CONFIG_MODULE_ID).is_some());
    assert_eq!(manager.api_hub().ids().await, vec!["config", "logger"]);
}

#[tokio::test]
async fn test_published_api_is_typed() {
    let mut fixture = ModuleTestFixture::new();
    fixture.add_module("mqtt", &[]);
    let manager = fixture.loaded_manager().await;

    let api = manager.get_api_as::<TestApi>("mqtt").await.unwrap();
    assert_eq!(api.id, "mqtt");
    assert!(manager.get_api_as::<String>("mqtt").await.is_err());

    let context = manager.get_module_context("mqtt").unwrap();
    assert!(context.api_as::<TestApi>().is_some());
}

#[tokio::test]
async fn test_module_without_api_still_has_context() {
    let mut fixture = ModuleTestFixture::new();
    fixture.add_module_with("quiet", &[], Behavior::NoApi);
    let manager = fixture.loaded_manager().await;

    assert!(matches!(
        manager.get_api("quiet").await,
        Err(ModuleError::ApiNotFound(_))
    ));
    let context = manager.get_module_context("quiet").unwrap();
    assert_eq!(*context.value::<String>("marker").unwrap(), "quiet");
}

#[tokio::test]
async fn test_hub_handle_sees_unload() {
    let mut fixture = ModuleTestFixture::new();
    fixture.add_module("base", &[]);
    let mut manager = fixture.loaded_manager().await;
    let hub = manager.api_hub();

    assert!(hub.contains("base").await);
    manager.unload_module("base").await.unwrap();
    assert!(!hub.contains("base").await);
    assert!(manager.get_module_context("base").is_none());

    manager.unload_all_modules().await;
    assert!(hub.is_empty().await);
}

#[tokio::test]
async fn test_dependents_receive_dependency_api() {
    let mut fixture = ModuleTestFixture::new();
    fixture.add_module("base", &[]).add_module("feature", &["base"]);
    let manager = fixture.loaded_manager().await;

    let base = manager.get_module_context("base").unwrap();
    let injected = manager.get_api_as::<TestApi>("feature").await.unwrap();
    assert!(injected.injected.contains(&"base".to_string()));
    assert_eq!(base.api_as::<TestApi>().unwrap().id, "base");
}

#[tokio::test]
async fn test_plan_matches_runtime_order() {
    let mut fixture = ModuleTestFixture::new();
    fixture
        .add_module("app", &["store", "bus"])
        .add_module("bus", &["store", "logger"])
        .add_module("store", &["config"]);

    let (discovered, failures) = ModuleDiscovery::new(&fixture.modules_dir)
        .discover_modules()
        .await
        .unwrap();
    assert!(failures.is_empty());
    let plan = ModuleDependencies::plan(&discovered).unwrap();

    let manager = fixture.loaded_manager().await;
    assert_eq!(plan.load_order, manager.loaded_module_ids());
    assert!(plan.blocked.is_empty());
}

#[tokio::test]
async fn test_plan_follows_depth_first_load() {
    // "a" is resolved first and drags "z" ahead of "b"
    let mut fixture = ModuleTestFixture::new();
    fixture
        .add_module("a", &["z"])
        .add_module("b", &[])
        .add_module("z", &[]);

    let (discovered, _) = ModuleDiscovery::new(&fixture.modules_dir)
        .discover_modules()
        .await
        .unwrap();
    let plan = ModuleDependencies::plan(&discovered).unwrap();

    let manager = fixture.loaded_manager().await;
    assert_eq!(manager.loaded_module_ids(), ["z", "a", "b"]);
    assert_eq!(plan.load_order, manager.loaded_module_ids());
}

#[tokio::test]
async fn test_plan_reports_missing_and_cycles() {
    let mut fixture = ModuleTestFixture::new();
    fixture.add_module("ok", &[]).add_module("needs", &["ghost"]);
    let discovery = ModuleDiscovery::new(&fixture.modules_dir);
    let (discovered, _) = discovery.discover_modules().await.unwrap();

    let plan = ModuleDependencies::plan(&discovered).unwrap();
    assert_eq!(plan.load_order, vec!["ok"]);
    assert!(plan.missing().contains("ghost"));

    fixture.add_module("a", &["b"]).add_module("b", &["a"]);
    let (discovered, _) = discovery.discover_modules().await.unwrap();
    assert!(matches!(
        ModuleDependencies::plan(&discovered),
        Err(ModuleError::CyclicDependency { .. })
    ));

    // Nothing was initialized by planning
    assert!(fixture.journal.events().is_empty());
}
