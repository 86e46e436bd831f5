//! Backend Selection
//!
//! Wires the configured caching strategy in front of the greeting upstream.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::cache::{
    Cache, CacheOptions, EntryBytes, EntryStore, MemoryProbe, MemoryStats, ProcessMemory,
    ShardedMap, SingleLockMap, StatsSnapshot,
};
use crate::config::{CacheConfig, MemorySource, Strategy};
use crate::error::Result;
use crate::greeting::{CachedMaker, Maker};
use crate::tasks::{Janitor, JanitorConfig, JanitorHandle};

/// Cache name reported by the advanced strategy.
pub const ADVANCED_CACHE_NAME: &str = "greetings";
/// Cache name reported by the naive strategy.
pub const NAIVE_CACHE_NAME: &str = "greetings-naive";
/// TTL the naive strategy falls back to when none is configured.
pub const NAIVE_DEFAULT_TTL: Duration = Duration::from_secs(3 * 60);

// == Backend ==
/// The greeting service as seen by the rest of the application.
///
/// Owns the janitor of the advanced strategy; call [`Backend::shutdown`] to
/// stop it in an orderly way.
pub struct Backend {
    strategy: Strategy,
    maker: Arc<dyn Maker>,
    cache: Option<Arc<Cache<String>>>,
    stats: Arc<MemoryStats>,
    janitor: Option<JanitorHandle>,
}

impl Backend {
    // == Build ==
    /// Builds the backend chosen by `config.strategy`.
    ///
    /// Must be called from within a tokio runtime when the strategy is
    /// advanced, since the janitor is spawned here.
    ///
    /// # Errors
    /// Returns `CacheError::Config` if the cache options are invalid.
    pub fn build(config: &CacheConfig, upstream: Arc<dyn Maker>, stats: Arc<MemoryStats>) -> Result<Self> {
        config.validate()?;

        let (cache, janitor) = match config.strategy {
            Strategy::None => (None, None),
            Strategy::Naive => {
                let store: Arc<dyn EntryStore<String>> = Arc::new(SingleLockMap::new());
                let options = CacheOptions::new(NAIVE_CACHE_NAME)
                    .ttl(Some(config.ttl.unwrap_or(NAIVE_DEFAULT_TTL)))
                    .failover(config.failover)
                    .collapse(false);
                (Some(Arc::new(Cache::new(options, store, stats.clone()))), None)
            }
            Strategy::Advanced => {
                let store: Arc<dyn EntryStore<String>> = Arc::new(ShardedMap::new(config.shard_count)?);
                let options = CacheOptions::new(ADVANCED_CACHE_NAME)
                    .ttl(config.ttl)
                    .failover(config.failover)
                    .collapse(true);
                let cache = Arc::new(Cache::new(options, store.clone(), stats.clone()));

                let probe: Arc<dyn MemoryProbe> = match config.memory_source {
                    MemorySource::Entries => Arc::new(EntryBytes::new(store.clone())),
                    MemorySource::Process => Arc::new(ProcessMemory),
                };
                let janitor = Janitor::new(
                    ADVANCED_CACHE_NAME,
                    store,
                    stats.clone(),
                    probe,
                    JanitorConfig {
                        interval: config.eviction_interval,
                        stale_retention: config.stale_retention,
                        soft_limit_bytes: config.memory_soft_limit_bytes,
                        evict_fraction: config.evict_fraction,
                    },
                );
                (Some(cache), Some(janitor.spawn()))
            }
        };

        let maker: Arc<dyn Maker> = match &cache {
            Some(cache) => Arc::new(CachedMaker::new(upstream, Arc::clone(cache))),
            None => upstream,
        };

        info!(
            strategy = %config.strategy,
            ttl = ?cache.as_ref().map(|_| config.ttl),
            failover = config.failover,
            "Greeting backend ready"
        );

        Ok(Self {
            strategy: config.strategy,
            maker,
            cache,
            stats,
            janitor,
        })
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Greeting maker, cached or not depending on the strategy.
    pub fn maker(&self) -> Arc<dyn Maker> {
        Arc::clone(&self.maker)
    }

    pub fn cache(&self) -> Option<&Arc<Cache<String>>> {
        self.cache.as_ref()
    }

    /// Name metrics are reported under, None for the pass-through strategy.
    pub fn cache_name(&self) -> Option<&str> {
        self.cache.as_deref().map(Cache::name)
    }

    pub fn stats(&self) -> Arc<MemoryStats> {
        Arc::clone(&self.stats)
    }

    pub fn stats_snapshot(&self) -> Option<StatsSnapshot> {
        self.cache_name().map(|name| self.stats.snapshot(name))
    }

    /// Stops background maintenance, waiting for a running sweep to finish.
    pub async fn shutdown(mut self) {
        if let Some(janitor) = self.janitor.take() {
            janitor.shutdown().await;
            info!(strategy = %self.strategy, "Janitor stopped");
        }
    }
}
