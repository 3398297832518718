//! modhost - a module lifecycle runtime
//!
//! Loads self-describing modules from a directory tree, orders them by their
//! declared dependencies, injects each one with the contexts of its
//! dependencies plus the system modules (configuration store and logger), and
//! publishes their apis in a shared capability registry.
//!
//! ## Example
//!
//! ```rust,no_run
//! use modhost::module::builtin::register_builtin;
//! use modhost::{EntryRegistry, InitOptions, ModuleManager};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let mut entries = EntryRegistry::new();
//! register_builtin(&mut entries);
//!
//! let mut manager = ModuleManager::new("./modules", entries);
//! manager.initialize_runtime("./config/config.json").await?;
//! let report = manager.discover_and_load_all("./modules", InitOptions::new()).await?;
//! println!("loaded: {:?}", report.loaded);
//!
//! manager.unload_all_modules().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod module;
pub mod utils;

pub use config::{HostConfig, LoggingConfig};
pub use module::{
    Api, ApiHub, ConfigStore, DiscoveryReport, EntryRegistry, HostLogger, InitContext,
    InitOptions, ModuleContext, ModuleEntry, ModuleError, ModuleManager, ModuleState,
    ShutdownReport, CONFIG_MODULE_ID, LOGGER_MODULE_ID,
};
