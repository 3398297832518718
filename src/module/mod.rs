//! Module system for the host
//!
//! Discovers module directories, resolves their dependencies depth-first,
//! runs their initializers with injected contexts, and tears them down in
//! reverse order.
//!
//! ## Architecture
//!
//! - **Manifests**: each module directory carries a `manifest.json`
//! - **Entry points**: module code is registered with the host in an [`EntryRegistry`]
//! - **System modules**: `config` and `logger` are always injected
//! - **Capabilities**: published apis are readable through the [`ApiHub`]

pub mod api;
pub mod builtin;
pub mod loader;
pub mod manager;
pub mod registry;
pub mod system;
pub mod traits;
pub mod validation;

pub use api::ApiHub;
pub use loader::{EntryFactory, EntryRegistry};
pub use manager::{DiscoveryReport, ModuleManager, ShutdownReport};
pub use registry::{DependencyPlan, ModuleDependencies, ModuleDiscovery, ModuleManifest};
pub use system::{ConfigStore, HostLogger, LogLevel};
pub use traits::{
    Api, InitContext, InitOptions, ModuleContext, ModuleEntry, ModuleError, ModuleState,
    CONFIG_MODULE_ID, LOGGER_MODULE_ID,
};
