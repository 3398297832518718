//! Module system traits and interfaces
//!
//! Defines the contract every module implements, the context bags exchanged
//! between the runtime and modules, and the module system error type.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::module::system::{ConfigStore, HostLogger};

/// Reserved id of the configuration store system module
pub const CONFIG_MODULE_ID: &str = "config";

/// Reserved id of the logger system module
pub const LOGGER_MODULE_ID: &str = "logger";

/// Ids that are always resolvable without being declared in a manifest
pub const SYSTEM_MODULE_IDS: [&str; 2] = [LOGGER_MODULE_ID, CONFIG_MODULE_ID];

/// Returns true if `id` names a system module
pub fn is_system_module(id: &str) -> bool {
    SYSTEM_MODULE_IDS.contains(&id)
}

/// A published capability object, shared between the runtime and its readers
pub type Api = Arc<dyn Any + Send + Sync>;

/// Options supplied by the host at load time
pub type InitOptions = serde_json::Map<String, serde_json::Value>;

/// Module lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModuleState {
    /// Not present in the runtime
    Unloaded,
    /// Dependencies are being loaded
    Resolving,
    /// Own initializer is running
    Initializing,
    /// Initialized and registered
    Loaded,
    /// Cleanup is running
    Unloading,
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModuleState::Unloaded => "unloaded",
            ModuleState::Resolving => "resolving",
            ModuleState::Initializing => "initializing",
            ModuleState::Loaded => "loaded",
            ModuleState::Unloading => "unloading",
        };
        f.write_str(s)
    }
}

/// Context produced by a module's initializer
///
/// Holds the published capability object (`api`) plus any other values the
/// module exposes to its dependents. The runtime does not look inside.
#[derive(Clone, Default)]
pub struct ModuleContext {
    api: Option<Api>,
    values: HashMap<String, Api>,
}

impl ModuleContext {
    /// Create an empty context (no api published)
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context publishing `api`
    pub fn with_api<T: Any + Send + Sync>(api: T) -> Self {
        Self::from_shared_api(Arc::new(api))
    }

    /// Create a context publishing an already shared api object
    pub fn from_shared_api(api: Api) -> Self {
        Self {
            api: Some(api),
            values: HashMap::new(),
        }
    }

    /// Expose an additional value under `key`
    pub fn insert<T: Any + Send + Sync>(mut self, key: impl Into<String>, value: T) -> Self {
        self.values.insert(key.into(), Arc::new(value));
        self
    }

    /// The published api, untyped
    pub fn api(&self) -> Option<&Api> {
        self.api.as_ref()
    }

    /// The published api, downcast to `T`
    pub fn api_as<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.api.clone().and_then(|api| api.downcast::<T>().ok())
    }

    /// An exposed value, downcast to `T`
    pub fn value<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.values
            .get(key)
            .cloned()
            .and_then(|v| v.downcast::<T>().ok())
    }

    /// Keys of the exposed values (excluding `api`)
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl fmt::Debug for ModuleContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = self.keys().collect();
        keys.sort_unstable();
        f.debug_struct("ModuleContext")
            .field("has_api", &self.api.is_some())
            .field("values", &keys)
            .finish()
    }
}

/// Context injected into a module's initializer
///
/// Every declared dependency's context keyed by its id, the system modules
/// under their reserved ids, and the options supplied by the host.
#[derive(Clone)]
pub struct InitContext {
    /// Id of the module being initialized
    pub module_id: String,
    /// Dependency contexts keyed by module id (always includes system modules)
    pub dependencies: HashMap<String, Arc<ModuleContext>>,
    /// Host supplied options
    pub options: InitOptions,
}

impl InitContext {
    /// Context of a dependency (or system module)
    pub fn dependency(&self, id: &str) -> Option<&Arc<ModuleContext>> {
        self.dependencies.get(id)
    }

    /// Api of a dependency, downcast to `T`
    pub fn api<T: Any + Send + Sync>(&self, id: &str) -> Result<Arc<T>, ModuleError> {
        self.dependencies
            .get(id)
            .and_then(|ctx| ctx.api_as::<T>())
            .ok_or_else(|| ModuleError::ApiNotFound(id.to_string()))
    }

    /// The configuration store
    pub fn config(&self) -> Result<Arc<ConfigStore>, ModuleError> {
        self.api::<ConfigStore>(CONFIG_MODULE_ID)
    }

    /// A logger prefixed with this module's id
    pub fn logger(&self) -> Result<HostLogger, ModuleError> {
        let root = self.api::<HostLogger>(LOGGER_MODULE_ID)?;
        Ok(root.with_context(&self.module_id))
    }

    /// A single host supplied option
    pub fn option(&self, key: &str) -> Option<&serde_json::Value> {
        self.options.get(key)
    }

    /// All host supplied options deserialized into `T`
    pub fn options_as<T: DeserializeOwned>(&self) -> Result<T, ModuleError> {
        let value = serde_json::Value::Object(self.options.clone());
        Ok(serde_json::from_value(value)?)
    }
}

impl fmt::Debug for InitContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut deps: Vec<&String> = self.dependencies.keys().collect();
        deps.sort_unstable();
        f.debug_struct("InitContext")
            .field("module_id", &self.module_id)
            .field("dependencies", &deps)
            .field("options", &self.options)
            .finish()
    }
}

/// Module trait that all modules must implement
///
/// Instances are produced by factories registered in the
/// [`EntryRegistry`](crate::module::loader::EntryRegistry).
#[async_trait]
pub trait ModuleEntry: Send + Sync {
    /// Initialize the module
    ///
    /// Called once per load, after every declared dependency has finished
    /// initializing. The returned context is what dependents receive.
    async fn initialize(&self, context: InitContext) -> Result<ModuleContext, ModuleError>;

    /// Release resources held by the module
    ///
    /// Called once when the module is unloaded, only if
    /// [`has_cleanup`](Self::has_cleanup) returns true.
    async fn cleanup(&self) -> Result<(), ModuleError> {
        Ok(())
    }

    /// Whether the module provides a cleanup hook
    fn has_cleanup(&self) -> bool {
        false
    }
}

/// Module system errors
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("Module manifest not found: {0}")]
    ManifestNotFound(String),

    #[error("Invalid module manifest: {0}")]
    InvalidManifest(String),

    #[error("Cyclic dependency detected: {}", cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    #[error("Cannot unload module {module} as it is required by: {}", dependents.join(", "))]
    DependencyConflict {
        module: String,
        dependents: Vec<String>,
    },

    #[error("Invalid module entry point: {0}")]
    InvalidEntryPoint(String),

    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    #[error("Module API not found: {0}")]
    ApiNotFound(String),

    #[error("Configuration persistence failed: {0}")]
    ConfigPersistence(String),

    #[error("Module runtime is not initialized")]
    RuntimeNotInitialized,

    #[error("System module {0} cannot be unloaded individually")]
    SystemModule(String),

    #[error("Module {module} initialization failed: {reason}")]
    InitializationError { module: String, reason: String },

    #[error("Module {module} cleanup failed: {reason}")]
    CleanupError { module: String, reason: String },

    #[error("Module operation failed: {0}")]
    OperationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl ModuleError {
    /// True for errors caused by the structure of a module (manifest, entry
    /// point, dependency graph) rather than its runtime behaviour
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ModuleError::ManifestNotFound(_)
                | ModuleError::InvalidManifest(_)
                | ModuleError::CyclicDependency { .. }
                | ModuleError::InvalidEntryPoint(_)
        )
    }
}

impl From<serde_json::Error> for ModuleError {
    fn from(e: serde_json::Error) -> Self {
        ModuleError::SerializationError(e.to_string())
    }
}

impl From<std::io::Error> for ModuleError {
    fn from(e: std::io::Error) -> Self {
        ModuleError::OperationError(e.to_string())
    }
}

impl From<anyhow::Error> for ModuleError {
    fn from(e: anyhow::Error) -> Self {
        ModuleError::OperationError(e.to_string())
    }
}
