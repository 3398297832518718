//! Shared helpers for locking, logging, environment and signals

pub mod env;
pub mod lock;
pub mod logging;
pub mod signal;

pub use env::{env_bool, env_opt};
pub use lock::{with_read_lock, with_write_lock};
#[cfg(feature = "json-logging")]
pub use logging::init_json_logging;
pub use logging::{init_logging, init_logging_from_config, resolve_filter};
pub use signal::{wait_for_shutdown_signal, ShutdownSignal};
