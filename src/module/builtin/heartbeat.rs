//! Heartbeat module
//!
//! Logs a tick at a fixed interval read from the configuration store. The
//! settings are written back with defaults on first start.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::module::traits::{InitContext, ModuleContext, ModuleEntry, ModuleError};

/// Module and entry point id
pub const HEARTBEAT_MODULE_ID: &str = "heartbeat";

/// Settings stored under the `heartbeat` key of the configuration store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatSettings {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_interval_ms() -> u64 {
    30_000
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
        }
    }
}

/// Api published by the heartbeat module
#[derive(Debug, Default)]
pub struct HeartbeatApi {
    beats: AtomicU64,
    interval: Duration,
}

impl HeartbeatApi {
    /// Ticks emitted since the module was loaded
    pub fn beats(&self) -> u64 {
        self.beats.load(Ordering::Relaxed)
    }

    /// Tick interval in effect
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

struct Ticker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Heartbeat module entry
#[derive(Default)]
pub struct HeartbeatModule {
    ticker: Mutex<Option<Ticker>>,
}

#[async_trait]
impl ModuleEntry for HeartbeatModule {
    async fn initialize(&self, context: InitContext) -> Result<ModuleContext, ModuleError> {
        let config = context.config()?;
        let logger = context.logger()?;

        let settings = match config.get_typed::<HeartbeatSettings>(&context.module_id).await {
            Ok(Some(settings)) => settings,
            Ok(None) => {
                let settings = HeartbeatSettings::default();
                config.set_typed(&context.module_id, &settings).await?;
                settings
            }
            Err(e) => {
                logger.warn(&format!("Invalid settings, using defaults: {}", e));
                HeartbeatSettings::default()
            }
        };

        if settings.interval_ms == 0 {
            return Err(ModuleError::InitializationError {
                module: context.module_id.clone(),
                reason: "interval_ms must be greater than zero".to_string(),
            });
        }

        let interval = Duration::from_millis(settings.interval_ms);
        let api = Arc::new(HeartbeatApi {
            beats: AtomicU64::new(0),
            interval,
        });

        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let task_api = Arc::clone(&api);
        let task_logger = logger.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let n = task_api.beats.fetch_add(1, Ordering::Relaxed) + 1;
                        task_logger.debug(&format!("beat {}", n));
                    }
                }
            }
        });

        *self.ticker.lock().await = Some(Ticker { cancel, handle });
        logger.info(&format!("Started with interval {:?}", interval));

        Ok(ModuleContext::from_shared_api(api))
    }

    async fn cleanup(&self) -> Result<(), ModuleError> {
        if let Some(ticker) = self.ticker.lock().await.take() {
            ticker.cancel.cancel();
            if let Err(e) = ticker.handle.await {
                return Err(ModuleError::OperationError(format!(
                    "Heartbeat task failed: {}",
                    e
                )));
            }
            debug!("Heartbeat task stopped");
        }
        Ok(())
    }

    fn has_cleanup(&self) -> bool {
        true
    }
}
