//! Signal handling for graceful shutdown

use std::fmt;
use tokio::signal;
use tracing::warn;

/// Signal that ended the wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Terminate,
    Interrupt,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownSignal::Terminate => f.write_str("SIGTERM"),
            ShutdownSignal::Interrupt => f.write_str("SIGINT"),
        }
    }
}

/// Wait for SIGTERM or SIGINT (Ctrl+C elsewhere)
pub async fn wait_for_shutdown_signal() -> ShutdownSignal {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to register SIGTERM handler: {}", e);
                // Fall back to Ctrl+C only
                let _ = signal::ctrl_c().await;
                return ShutdownSignal::Interrupt;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => ShutdownSignal::Terminate,
            _ = signal::ctrl_c() => ShutdownSignal::Interrupt,
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for shutdown signal: {}", e);
        }
        ShutdownSignal::Interrupt
    }
}
