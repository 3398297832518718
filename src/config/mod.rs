//! Configuration management for the module host
//!
//! Handles host configuration loading (JSON or TOML) and environment
//! overrides. This is the host's own configuration; per-module settings live
//! in the [`ConfigStore`](crate::module::system::ConfigStore).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::module::system::LogLevel;
use crate::utils::{env_bool, env_opt};

/// Environment variable overriding `modules_dir`
pub const MODULES_DIR_ENV: &str = "MODHOST_MODULES_DIR";

/// Environment variable overriding `config_path`
pub const CONFIG_PATH_ENV: &str = "MODHOST_CONFIG";

/// Environment variable enabling `allow_partial_start`
pub const ALLOW_PARTIAL_ENV: &str = "MODHOST_ALLOW_PARTIAL";

/// Logging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log filter (e.g. "info", "modhost=debug"). RUST_LOG takes precedence.
    #[serde(default)]
    pub filter: Option<String>,

    /// Emit JSON records (requires the `json-logging` feature)
    #[serde(default)]
    pub json_format: bool,

    /// Threshold of the `logger` system module. Derived from `filter` when unset.
    #[serde(default)]
    pub level: Option<LogLevel>,
}

impl LoggingConfig {
    /// Threshold handed to the `logger` system module
    ///
    /// An explicit `level` wins. Otherwise a bare level in `filter` (e.g.
    /// "debug") is used, and anything else falls back to info.
    pub fn module_log_level(&self) -> LogLevel {
        if let Some(level) = self.level {
            return level;
        }
        self.filter
            .as_deref()
            .and_then(|filter| filter.parse().ok())
            .unwrap_or(LogLevel::Info)
    }
}

/// Host configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Path of the module configuration document
    #[serde(default = "default_config_path")]
    pub config_path: PathBuf,

    /// Directory scanned for modules
    #[serde(default = "default_modules_dir")]
    pub modules_dir: PathBuf,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Keep running when some modules fail to load
    #[serde(default)]
    pub allow_partial_start: bool,
}

fn default_config_path() -> PathBuf {
    PathBuf::from("./config/config.json")
}

fn default_modules_dir() -> PathBuf {
    PathBuf::from("./modules")
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            config_path: default_config_path(),
            modules_dir: default_modules_dir(),
            logging: LoggingConfig::default(),
            allow_partial_start: false,
        }
    }
}

impl HostConfig {
    /// Load configuration from a file, choosing the format by extension
    ///
    /// `.toml` files are parsed as TOML, everything else as JSON.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            _ => Self::from_json_file(path),
        }
    }

    /// Load configuration from JSON file
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: HostConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_toml_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: HostConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to JSON file
    pub fn to_json_file(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply `MODHOST_MODULES_DIR`, `MODHOST_CONFIG` and `MODHOST_ALLOW_PARTIAL`
    pub fn apply_env_overrides(&mut self) {
        if let Some(dir) = env_opt(MODULES_DIR_ENV) {
            debug!("{} overrides modules_dir: {}", MODULES_DIR_ENV, dir);
            self.modules_dir = PathBuf::from(dir);
        }
        if let Some(path) = env_opt(CONFIG_PATH_ENV) {
            debug!("{} overrides config_path: {}", CONFIG_PATH_ENV, path);
            self.config_path = PathBuf::from(path);
        }
        if env_bool(ALLOW_PARTIAL_ENV) {
            self.allow_partial_start = true;
        }
    }
}
