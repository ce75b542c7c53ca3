//! Shutdown signalling

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::signal;
use tracing::info;
use vantage_core::tracing::prefix;

/// Cooperative stop flag shared by the pipeline loops.
///
/// Loops check it once per cycle; tripping it never interrupts a capture or
/// detection already in progress.
#[derive(Debug, Clone, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Returns a future that resolves when a shutdown signal is received.
///
/// Handles both Ctrl+C and SIGTERM (on Unix).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("{} Received Ctrl+C, shutting down", prefix::CLOSE);
        }
        _ = terminate => {
            info!("{} Received terminate signal, shutting down", prefix::CLOSE);
        }
    }
}
