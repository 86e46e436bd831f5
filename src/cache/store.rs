//! Entry Store Module
//!
//! The capability set every cache backend provides to the facade.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::cache::{CacheEntry, CacheKey};

// == Sweep ==
/// One maintenance pass over a store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sweep {
    /// Remove entries that expired more than `retention` before `now`
    Expired { now: Instant, retention: Duration },
    /// Drop roughly `fraction` of the least recently read entries
    Pressure { fraction: f64 },
}

// == Entry Store ==
/// Keyed storage of cache entries.
///
/// `lookup` returns expired entries too: deciding whether an entry may be
/// served is up to the caller, which may still want it for failover.
#[async_trait]
pub trait EntryStore<V>: Send + Sync
where
    V: Clone + Send + Sync + 'static,
{
    /// Returns a copy of the entry for `key`, recording the access.
    async fn lookup(&self, key: &CacheKey) -> Option<CacheEntry<V>>;

    /// Inserts or replaces the entry for `key`.
    async fn store(&self, key: CacheKey, value: V, ttl: Option<Duration>);

    /// Removes the entry for `key`, returning whether one existed.
    async fn delete(&self, key: &CacheKey) -> bool;

    /// Runs one maintenance pass, returning the number of removed entries.
    async fn sweep(&self, sweep: Sweep) -> usize;

    /// Current number of entries.
    fn len(&self) -> usize;

    /// Approximate bytes held by all entries.
    fn approx_bytes(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Number of entries to drop out of `len` for a pressure sweep.
///
/// Rounds up so that small shards still shed at least one entry.
pub(crate) fn eviction_quota(len: usize, fraction: f64) -> usize {
    if len == 0 {
        return 0;
    }
    ((len as f64 * fraction).ceil() as usize).clamp(1, len)
}
