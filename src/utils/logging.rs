//! Logging initialization for the module host
//!
//! - Respects RUST_LOG environment variable
//! - Falls back to the filter from the host configuration
//! - Defaults to "info"
//!
//! # Usage
//! ```rust
//! use modhost::utils::init_logging;
//!
//! init_logging(None); // Uses RUST_LOG or defaults to "info"
//! ```

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when neither RUST_LOG nor the configuration sets one
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Pick the effective filter directive
///
/// RUST_LOG wins over the configured filter, which wins over the default.
pub fn resolve_filter(rust_log: Option<&str>, configured: Option<&str>) -> String {
    rust_log
        .or(configured)
        .unwrap_or(DEFAULT_LOG_FILTER)
        .to_string()
}

fn env_filter(filter: Option<&str>) -> EnvFilter {
    let rust_log = std::env::var("RUST_LOG").ok();
    EnvFilter::new(resolve_filter(rust_log.as_deref(), filter))
}

/// Initialize human-readable logging
///
/// # Arguments
/// * `filter` - Optional log filter from config (e.g., "info", "modhost=debug").
///              RUST_LOG still takes precedence.
pub fn init_logging(filter: Option<&str>) {
    // Output goes to stderr; NO_COLOR disables ANSI colors
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_ansi(std::env::var("NO_COLOR").is_err()),
        )
        .with(env_filter(filter))
        .try_init();
}

/// Initialize logging with JSON output (for log aggregation systems)
#[cfg(feature = "json-logging")]
pub fn init_json_logging(filter: Option<&str>) {
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true)
                .with_span_list(true),
        )
        .with(env_filter(filter))
        .try_init();
}

/// Initialize logging from the host configuration
///
/// # Example
/// ```rust
/// use modhost::config::HostConfig;
/// use modhost::utils::init_logging_from_config;
///
/// let config = HostConfig::default();
/// init_logging_from_config(&config.logging);
/// ```
pub fn init_logging_from_config(config: &crate::config::LoggingConfig) {
    let filter = config.filter.as_deref();

    if config.json_format {
        #[cfg(feature = "json-logging")]
        {
            init_json_logging(filter);
        }
        #[cfg(not(feature = "json-logging"))]
        {
            // Fall back to regular logging if json-logging feature not enabled
            init_logging(filter);
        }
    } else {
        init_logging(filter);
    }
}
