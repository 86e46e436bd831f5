//! Cache Facade
//!
//! Get-or-compute entry point combining an entry store, an optional request
//! collapser, a stats sink and the failover policy.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::{CacheKey, Collapser, EntryStore, Metric, StatsSink};
use crate::error::{CacheError, Result};

// == Cache Options ==
/// Behaviour switches of one facade instance.
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// Label attached to every emitted metric
    pub name: String,
    /// Entry TTL, None = unlimited
    pub ttl: Option<Duration>,
    /// Serve the previous value when upstream fails
    pub failover: bool,
    /// Share one computation between concurrent misses of a key
    pub collapse: bool,
}

impl CacheOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ttl: None,
            failover: false,
            collapse: true,
        }
    }

    pub fn ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn failover(mut self, failover: bool) -> Self {
        self.failover = failover;
        self
    }

    pub fn collapse(mut self, collapse: bool) -> Self {
        self.collapse = collapse;
        self
    }
}

struct Inner<V> {
    name: String,
    store: Arc<dyn EntryStore<V>>,
    stats: Arc<dyn StatsSink>,
    ttl: Option<Duration>,
}

impl<V> Inner<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn emit(&self, metric: Metric) {
        self.stats.add(metric, 1.0, &self.name);
    }

    /// Awaits a fresh computation and records its outcome.
    ///
    /// With `recheck`, an unexpired entry stored since the caller's lookup
    /// is returned instead and `fresh` is never polled.
    async fn settle(
        self: Arc<Self>,
        key: CacheKey,
        fresh: impl Future<Output = Result<V>>,
        recheck: bool,
    ) -> Result<V> {
        if recheck {
            if let Some(entry) = self.store.lookup(&key).await {
                if !entry.is_expired_at(Instant::now()) {
                    debug!(cache = %self.name, key = %key, "stored while waiting, skipping computation");
                    return Ok(entry.value);
                }
            }
        }

        match fresh.await {
            Ok(value) => {
                self.store.store(key, value.clone(), self.ttl).await;
                self.emit(Metric::Write);
                self.stats
                    .set(Metric::Items, self.store.len() as f64, &self.name);
                Ok(value)
            }
            Err(err) => {
                debug!(cache = %self.name, key = %key, error = %err, "computation failed");
                self.emit(Metric::Failed);
                Err(err)
            }
        }
    }
}

// == Cache ==
/// Memoizing cache in front of an upstream computation.
pub struct Cache<V> {
    inner: Arc<Inner<V>>,
    collapser: Option<Arc<Collapser<V>>>,
    failover: bool,
}

impl<V> fmt::Debug for Cache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("name", &self.inner.name)
            .field("ttl", &self.inner.ttl)
            .field("failover", &self.failover)
            .field("collapse", &self.collapser.is_some())
            .finish()
    }
}

impl<V> Cache<V>
where
    V: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a facade over `store`, reporting to `stats`.
    pub fn new(options: CacheOptions, store: Arc<dyn EntryStore<V>>, stats: Arc<dyn StatsSink>) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: options.name,
                store,
                stats,
                ttl: options.ttl,
            }),
            collapser: options.collapse.then(|| Arc::new(Collapser::new())),
            failover: options.failover,
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn store(&self) -> &Arc<dyn EntryStore<V>> {
        &self.inner.store
    }

    pub fn len(&self) -> usize {
        self.inner.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.store.is_empty()
    }

    // == Get ==
    /// Returns the cached value for `key`, computing it on a miss.
    ///
    /// Unexpired entries are served without calling `compute`. Otherwise
    /// `compute` runs once (once across all concurrent callers when
    /// collapsing is on) and a successful result is stored. With failover
    /// on, an upstream error is replaced by the previous value if one is
    /// still held.
    ///
    /// With collapsing on, `compute` receives a token owned by the in-flight
    /// computation rather than by any caller, so a caller giving up never
    /// aborts it for the others. Without collapsing it receives `cancel`.
    ///
    /// # Errors
    /// - `CacheError::Cancelled` when `cancel` fires before an outcome is known
    /// - the error returned by `compute`, unless failover substitutes a value
    pub async fn get<F, Fut>(&self, cancel: &CancellationToken, key: &CacheKey, compute: F) -> Result<V>
    where
        F: FnOnce(CancellationToken) -> Fut + Send,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let stale = match self.inner.store.lookup(key).await {
            Some(entry) if !entry.is_expired_at(Instant::now()) => {
                self.inner.emit(Metric::Hit);
                return Ok(entry.value);
            }
            Some(entry) => {
                self.inner.emit(Metric::Expired);
                Some(entry.value)
            }
            None => {
                self.inner.emit(Metric::Miss);
                None
            }
        };

        let inner = Arc::clone(&self.inner);
        let owned_key = key.clone();

        let outcome = match &self.collapser {
            Some(collapser) => {
                // Only the caller that ends up leading runs `work`; the key
                // may have been stored between its lookup and that point.
                let work = move || inner.settle(owned_key, compute(CancellationToken::new()), true);
                collapser.run(cancel, key, work).await
            }
            None => {
                let fresh = inner.settle(owned_key, compute(cancel.clone()), false);
                tokio::select! {
                    _ = cancel.cancelled() => Err(CacheError::Cancelled),
                    outcome = fresh => outcome,
                }
            }
        };

        match (outcome, stale) {
            (Err(err), Some(value)) if self.failover && err.is_upstream() => {
                warn!(cache = %self.inner.name, key = %key, error = %err, "serving stale value");
                Ok(value)
            }
            (outcome, _) => outcome,
        }
    }

    // == Invalidate ==
    /// Drops the entry for `key`.
    pub async fn invalidate(&self, key: &CacheKey) -> bool {
        let removed = self.inner.store.delete(key).await;
        if removed {
            self.inner
                .stats
                .set(Metric::Items, self.inner.store.len() as f64, &self.inner.name);
        }
        removed
    }
}
