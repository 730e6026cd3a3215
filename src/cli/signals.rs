//! Ctrl+C handling for a running recording

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

/// Raises a recording's stop flag on SIGINT / Ctrl+C
pub struct ShutdownSignal {
    shutdown: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn with_flag(flag: Arc<AtomicBool>) -> Self {
        Self { shutdown: flag }
    }

    /// Listen for Ctrl+C in the background. Must be called inside a tokio runtime.
    pub fn setup(&self) {
        let shutdown = Arc::clone(&self.shutdown);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                debug!("Received Ctrl+C, stopping");
                shutdown.store(true, Ordering::SeqCst);
            }
        });
    }
}
