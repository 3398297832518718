//! Logger system module
//!
//! A prefix-carrying logging capability injected into every module. Records
//! are filtered by a runtime adjustable severity threshold and forwarded to
//! `tracing` with the prefix attached as a field.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Default root prefix
pub const DEFAULT_LOG_PREFIX: &str = "modhost";

/// Severity of a log record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
}

impl LogLevel {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => LogLevel::Debug,
            1 => LogLevel::Info,
            2 => LogLevel::Warn,
            _ => LogLevel::Error,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(s)
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" | "trace" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("Unknown log level: {}", other)),
        }
    }
}

/// Logging capability published under the `logger` id
///
/// Cloning is cheap; children created with [`with_context`](Self::with_context)
/// share the threshold of their root.
#[derive(Clone)]
pub struct HostLogger {
    prefix: String,
    level: Arc<AtomicU8>,
}

impl HostLogger {
    /// Root logger with the given prefix and threshold
    pub fn new(prefix: impl Into<String>, level: LogLevel) -> Self {
        Self {
            prefix: prefix.into(),
            level: Arc::new(AtomicU8::new(level as u8)),
        }
    }

    /// Child logger whose prefix is `<prefix>:<context>`
    pub fn with_context(&self, context: &str) -> Self {
        Self {
            prefix: format!("{}:{}", self.prefix, context),
            level: Arc::clone(&self.level),
        }
    }

    /// Prefix attached to every record
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Current threshold
    pub fn level(&self) -> LogLevel {
        LogLevel::from_u8(self.level.load(Ordering::Relaxed))
    }

    /// Change the threshold for this logger and every logger sharing it
    pub fn set_level(&self, level: LogLevel) {
        self.level.store(level as u8, Ordering::Relaxed);
    }

    /// Returns true if records at `level` pass the threshold
    pub fn enabled(&self, level: LogLevel) -> bool {
        level >= self.level()
    }

    /// Emit a record at `level`
    pub fn log(&self, level: LogLevel, message: &str) {
        self.emit(level, &self.prefix, message);
    }

    /// Emit a record at `level` tagged `<prefix>:<context>`
    ///
    /// Same as logging through `with_context(context)` but without keeping a
    /// child logger around.
    pub fn log_with(&self, level: LogLevel, context: &str, message: &str) {
        if !self.enabled(level) {
            return;
        }
        self.emit(level, &self.record_prefix(Some(context)), message);
    }

    /// Prefix a record carries, with an optional per-call context
    pub fn record_prefix(&self, context: Option<&str>) -> String {
        match context {
            Some(context) if !context.is_empty() => format!("{}:{}", self.prefix, context),
            _ => self.prefix.clone(),
        }
    }

    fn emit(&self, level: LogLevel, prefix: &str, message: &str) {
        if !self.enabled(level) {
            return;
        }
        match level {
            LogLevel::Debug => tracing::debug!(prefix, "{}", message),
            LogLevel::Info => tracing::info!(prefix, "{}", message),
            LogLevel::Warn => tracing::warn!(prefix, "{}", message),
            LogLevel::Error => tracing::error!(prefix, "{}", message),
        }
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }
}

impl Default for HostLogger {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_PREFIX, LogLevel::Info)
    }
}

impl fmt::Debug for HostLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostLogger")
            .field("prefix", &self.prefix)
            .field("level", &self.level())
            .finish()
    }
}
