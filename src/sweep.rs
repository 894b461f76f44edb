//! Background expiry sweep for abandoned locks.
//!
//! A client that crashes or loses connectivity mid-edit leaves its locks
//! held forever; the sweeper reclaims them. It is an explicit background
//! task with its own shutdown signal, ticking at a fixed interval
//! independent of request traffic. Each tick scans the store for locks
//! whose acquisition instant is older than the TTL and force-releases each
//! hit. Overlapping ticks need no extra coordination: `force_release` is
//! atomic and idempotent, so a lock already freed elsewhere just reports
//! false on the second attempt.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::Result;
use crate::lock::{LockKind, LockManager};
use crate::store::BoardStore;

/// Periodic sweep that force-releases locks held past their TTL.
pub struct ExpirySweeper {
    manager: Arc<LockManager>,
    store: Arc<dyn BoardStore>,
    ttl: Duration,
    interval: Duration,
}

/// Handle to a running sweeper. Dropping it signals the loop to stop;
/// [`SweeperHandle::shutdown`] additionally waits for it to wind down.
pub struct SweeperHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the sweep loop to stop and wait for it to wind down.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task.await;
    }
}

impl ExpirySweeper {
    pub fn new(
        manager: Arc<LockManager>,
        store: Arc<dyn BoardStore>,
        ttl: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            manager,
            store,
            ttl,
            interval,
        }
    }

    pub fn from_config(
        manager: Arc<LockManager>,
        store: Arc<dyn BoardStore>,
        config: &Config,
    ) -> Self {
        Self::new(manager, store, config.lock_ttl(), config.sweep_interval())
    }

    /// Start the background loop. The first sweep runs one full interval
    /// after spawn, then every interval until shutdown.
    pub fn spawn(self) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = tokio::time::sleep(self.interval) => {
                        match self.sweep_once().await {
                            Ok(expired) if expired > 0 => {
                                debug!(expired, "expiry sweep reclaimed locks");
                            }
                            Ok(_) => {}
                            // A failed tick never kills the loop; the next
                            // tick rescans from scratch.
                            Err(err) => warn!(%err, "expiry sweep failed; retrying next tick"),
                        }
                    }
                }
            }
        });

        SweeperHandle { shutdown_tx, task }
    }

    /// One full sweep over both lock kinds. Returns how many locks were
    /// force-released. Individual release failures are logged and skipped;
    /// they never abort the rest of the batch.
    pub async fn sweep_once(&self) -> Result<usize> {
        let ttl = chrono::Duration::from_std(self.ttl)
            .unwrap_or_else(|_| chrono::Duration::seconds(120));
        let threshold = chrono::Utc::now() - ttl;

        let mut expired = 0usize;
        for kind in LockKind::ALL {
            let overdue: Vec<_> = self
                .store
                .held_locks(kind)
                .await?
                .into_iter()
                .filter(|info| info.since < threshold)
                .collect();

            let mut releases = JoinSet::new();
            for info in overdue {
                let manager = self.manager.clone();
                releases.spawn(async move {
                    (info.card, manager.force_release(info.card, kind).await)
                });
            }

            while let Some(joined) = releases.join_next().await {
                match joined {
                    Ok((_, Ok(true))) => expired += 1,
                    // Already freed by the holder or a concurrent tick.
                    Ok((_, Ok(false))) => {}
                    Ok((card, Err(err))) => {
                        warn!(%card, %kind, %err, "failed to force-release expired lock");
                    }
                    Err(err) => warn!(%kind, %err, "expiry release task panicked"),
                }
            }
        }

        Ok(expired)
    }
}
