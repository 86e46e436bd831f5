//! Eviction Janitor
//!
//! Background task that periodically removes long-expired entries from a
//! store and sheds entries while memory usage sits above a soft limit.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{EntryStore, MemoryProbe, Metric, StatsSink, Sweep};

// == Janitor Config ==
#[derive(Debug, Clone)]
pub struct JanitorConfig {
    /// Delay between sweeps
    pub interval: Duration,
    /// How long an expired entry is kept for failover before removal
    pub stale_retention: Duration,
    /// Usage above which entries are evicted, None = never
    pub soft_limit_bytes: Option<usize>,
    /// Fraction of each shard evicted per sweep under pressure
    pub evict_fraction: f64,
}

/// What one sweep removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries dropped after their retention ran out
    pub expired: usize,
    /// Entries dropped because of memory pressure
    pub evicted: usize,
}

// == Janitor ==
pub struct Janitor<V> {
    name: String,
    store: Arc<dyn EntryStore<V>>,
    stats: Arc<dyn StatsSink>,
    probe: Arc<dyn MemoryProbe>,
    config: JanitorConfig,
}

impl<V> fmt::Debug for Janitor<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Janitor")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<V> Janitor<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(
        name: impl Into<String>,
        store: Arc<dyn EntryStore<V>>,
        stats: Arc<dyn StatsSink>,
        probe: Arc<dyn MemoryProbe>,
        config: JanitorConfig,
    ) -> Self {
        Self {
            name: name.into(),
            store,
            stats,
            probe,
            config,
        }
    }

    fn over_limit(&self) -> Option<(usize, usize)> {
        let limit = self.config.soft_limit_bytes?;
        let in_use = self.probe.in_use_bytes()?;
        (in_use > limit).then_some((in_use, limit))
    }

    // == Sweep Once ==
    /// Runs a single maintenance pass.
    ///
    /// Expired entries go first; pressure eviction only runs if usage is
    /// still above the soft limit afterwards.
    pub async fn sweep_once(&self) -> SweepReport {
        let expired = self
            .store
            .sweep(Sweep::Expired {
                now: Instant::now(),
                retention: self.config.stale_retention,
            })
            .await;

        let evicted = match self.over_limit() {
            Some((in_use, limit)) => {
                let evicted = self
                    .store
                    .sweep(Sweep::Pressure {
                        fraction: self.config.evict_fraction,
                    })
                    .await;
                self.stats.add(Metric::Evicted, evicted as f64, &self.name);

                if let Some((still, _)) = self.over_limit() {
                    warn!(
                        cache = %self.name,
                        in_use = still,
                        limit,
                        "memory still above soft limit after evicting {} entries",
                        evicted
                    );
                } else {
                    debug!(cache = %self.name, in_use, limit, evicted, "soft limit restored");
                }
                evicted
            }
            None => 0,
        };

        self.stats
            .set(Metric::Items, self.store.len() as f64, &self.name);

        SweepReport { expired, evicted }
    }

    // == Spawn ==
    /// Starts the periodic sweep on its own task.
    ///
    /// The task runs until the returned handle is shut down or dropped.
    pub fn spawn(self) -> JanitorHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            info!(
                cache = %self.name,
                "Starting janitor with interval of {:?}",
                self.config.interval
            );

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!(cache = %self.name, "Janitor cancelled");
                        break;
                    }
                    _ = tokio::time::sleep(self.config.interval) => {
                        let report = self.sweep_once().await;
                        if report.expired > 0 || report.evicted > 0 {
                            info!(
                                cache = %self.name,
                                "Janitor: removed {} expired and {} evicted entries",
                                report.expired,
                                report.evicted
                            );
                        } else {
                            debug!(cache = %self.name, "Janitor: nothing to remove");
                        }
                    }
                }
            }
        });

        JanitorHandle { cancel, task }
    }
}

// == Janitor Handle ==
/// Owner of a running janitor task.
#[derive(Debug)]
pub struct JanitorHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl JanitorHandle {
    /// Stops the janitor and waits for the current sweep to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Err(err) = (&mut self.task).await {
            warn!("Janitor task ended abnormally: {}", err);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for JanitorHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
