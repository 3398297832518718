//! System modules
//!
//! Always-present modules that every discovered module can depend on without
//! declaring them: the configuration store and the logger.

pub mod config_store;
pub mod logger;

pub use config_store::{ConfigDocument, ConfigStore};
pub use logger::{HostLogger, LogLevel, DEFAULT_LOG_PREFIX};
