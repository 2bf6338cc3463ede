use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tokio_util::sync::CancellationToken;

use crate::session_store::SessionStore;

/// Periodically reclaims expired store entries.
///
/// Reads already ignore expired entries, so the sweep interval only bounds
/// how long expired data stays in memory.
#[derive(Clone)]
pub struct StoreSweeper {
    store: Arc<SessionStore>,
    every: Duration,
}

impl StoreSweeper {
    pub fn new(store: Arc<SessionStore>, every: Duration) -> Self {
        Self { store, every }
    }

    /// Start the background sweep task.
    /// Returns a JoinHandle for graceful shutdown
    pub fn start(self, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut sweep_interval = interval(self.every);
            // the first tick completes immediately
            sweep_interval.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::debug!("Store sweeper stopped");
                        break;
                    }
                    _ = sweep_interval.tick() => {
                        let stats = self.store.purge_expired().await;
                        if stats.total() > 0 {
                            tracing::debug!(
                                sessions = stats.sessions,
                                tombstones = stats.tombstones,
                                files = stats.files,
                                scan_buffers = stats.scan_buffers,
                                "Swept expired store entries"
                            );
                        }
                    }
                }
            }
        })
    }
}
