//! Single-Lock Map
//!
//! Baseline store: one reader/writer lock over one map for the whole keyspace.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::cache::store::eviction_quota;
use crate::cache::{ApproxSize, CacheEntry, CacheKey, EntryStore, Sweep};

// == Single Lock Map ==
/// Unbounded map guarded by a single `RwLock`.
///
/// Every operation on every key contends on the same lock.
#[derive(Debug)]
pub struct SingleLockMap<V> {
    entries: RwLock<HashMap<CacheKey, CacheEntry<V>>>,
    len: AtomicUsize,
    bytes: AtomicUsize,
    tick: AtomicU64,
}

impl<V> SingleLockMap<V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            len: AtomicUsize::new(0),
            bytes: AtomicUsize::new(0),
            tick: AtomicU64::new(0),
        }
    }

    fn next_tick(&self) -> u64 {
        self.tick.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn account(&self, map: &HashMap<CacheKey, CacheEntry<V>>, bytes: usize) {
        self.len.store(map.len(), Ordering::Relaxed);
        self.bytes.store(bytes, Ordering::Relaxed);
    }
}

impl<V> Default for SingleLockMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<V> EntryStore<V> for SingleLockMap<V>
where
    V: ApproxSize + Clone + Send + Sync + 'static,
{
    async fn lookup(&self, key: &CacheKey) -> Option<CacheEntry<V>> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        entry.touch(self.next_tick());
        Some(entry.clone())
    }

    async fn store(&self, key: CacheKey, value: V, ttl: Option<Duration>) {
        let entry = CacheEntry::new(&key, value, ttl, Instant::now(), self.next_tick());
        let added = entry.approx_size;

        let mut entries = self.entries.write().await;
        let removed = entries.insert(key, entry).map_or(0, |old| old.approx_size);
        let bytes = self.bytes.load(Ordering::Relaxed) + added - removed;
        self.account(&entries, bytes);
    }

    async fn delete(&self, key: &CacheKey) -> bool {
        let mut entries = self.entries.write().await;
        match entries.remove(key) {
            Some(old) => {
                let bytes = self.bytes.load(Ordering::Relaxed) - old.approx_size;
                self.account(&entries, bytes);
                true
            }
            None => false,
        }
    }

    async fn sweep(&self, sweep: Sweep) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();

        match sweep {
            Sweep::Expired { now, retention } => {
                entries.retain(|_, entry| !entry.is_past_retention(now, retention));
            }
            Sweep::Pressure { fraction } => {
                let quota = eviction_quota(entries.len(), fraction);
                let mut by_access: Vec<(u64, CacheKey)> = entries
                    .iter()
                    .map(|(key, entry)| (entry.last_access(), key.clone()))
                    .collect();
                by_access.sort_unstable();
                for (_, key) in by_access.into_iter().take(quota) {
                    entries.remove(&key);
                }
            }
        }

        let bytes = entries.values().map(|entry| entry.approx_size).sum();
        self.account(&entries, bytes);
        before - entries.len()
    }

    fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    fn approx_bytes(&self) -> usize {
        self.bytes.load(Ordering::Relaxed)
    }
}
