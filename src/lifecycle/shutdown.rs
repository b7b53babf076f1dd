//! Shutdown coordination.

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::lifecycle::signals::terminate_signal;

/// Fans a single stop request out to every running server.
///
/// Clones share the channel, so any clone can fire it.
#[derive(Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Receiver that resolves once the stop request is sent. Subscribe
    /// before the request can fire or it is missed.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Ask every subscriber to stop. Returns how many were reached.
    pub fn trigger(&self) -> usize {
        self.tx.send(()).unwrap_or(0)
    }

    /// Fire on SIGTERM, in the background.
    pub fn trigger_on_terminate(&self) -> JoinHandle<()> {
        let shutdown = self.clone();
        tokio::spawn(async move {
            terminate_signal().await;
            let servers = shutdown.trigger();
            tracing::info!(servers, "Graceful shutdown requested");
        })
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
