//! Periodic expiration sweep.
//!
//! [`Sweeper`] runs [`CacheStore::sweep_expired`] on a fixed interval.
//! It is optional: lazy eviction already keeps reads correct; the
//! sweeper bounds storage growth for expired entries nothing reads
//! again.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::warn;

use super::CacheStore;

/// Handle to a background sweep task.
///
/// Dropping the handle closes the shutdown channel and the task winds
/// down on its own; [`shutdown`](Sweeper::shutdown) additionally waits
/// for it to finish.
pub struct Sweeper {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Sweeper {
    /// Spawn a sweep task on the current tokio runtime.
    ///
    /// The first sweep runs immediately, then once per `every`. `every`
    /// must be non-zero.
    pub fn spawn(store: Arc<CacheStore>, every: Duration) -> Self {
        let (shutdown, mut rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = store.sweep_expired().await {
                            warn!("cache sweep failed: {e}");
                        }
                    }
                    _ = rx.changed() => break,
                }
            }
        });
        Self { shutdown, handle }
    }

    /// Stop the task and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}
