//! Sharded Map
//!
//! Splits the keyspace into independently locked shards so unrelated keys do
//! not contend with each other.
//!
//! ```text
//!   CacheKey ──hash(seed, key) & (S-1)──▶ shard index
//!
//!   ┌─────────┬─────────┬─────────┬─────────┐
//!   │ Shard 0 │ Shard 1 │   ...   │ Shard S │   each: RwLock<HashMap>
//!   └─────────┴─────────┴─────────┴─────────┘
//! ```
//!
//! Maintenance sweeps take one shard lock at a time, so a sweep never pauses
//! traffic on more than one shard.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::cache::store::eviction_quota;
use crate::cache::{ApproxSize, CacheEntry, CacheKey, EntryStore, Sweep};
use crate::error::{CacheError, Result};

// == Shard Selector ==
/// Deterministic key-to-shard mapping using a seeded hash and a power-of-two mask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardSelector {
    mask: usize,
    seed: u64,
}

impl ShardSelector {
    /// Creates a selector for `shards` shards.
    ///
    /// Fails unless `shards` is a positive power of two.
    pub fn new(shards: usize, seed: u64) -> Result<Self> {
        if shards == 0 || !shards.is_power_of_two() {
            return Err(CacheError::Config(format!(
                "shard count must be a positive power of two, got {}",
                shards
            )));
        }
        Ok(Self {
            mask: shards - 1,
            seed,
        })
    }

    pub fn shard_count(&self) -> usize {
        self.mask + 1
    }

    /// Maps a key to a shard index in `[0, shards)`.
    pub fn shard_for_key<K: Hash + ?Sized>(&self, key: &K) -> usize {
        let mut hasher = DefaultHasher::new();
        self.seed.hash(&mut hasher);
        key.hash(&mut hasher);
        (hasher.finish() as usize) & self.mask
    }
}

#[derive(Debug)]
struct Shard<V> {
    entries: RwLock<HashMap<CacheKey, CacheEntry<V>>>,
    bytes: AtomicUsize,
}

impl<V> Shard<V> {
    fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            bytes: AtomicUsize::new(0),
        }
    }
}

// == Sharded Map ==
/// Entry store partitioned into a fixed number of shards.
#[derive(Debug)]
pub struct ShardedMap<V> {
    shards: Box<[Shard<V>]>,
    selector: ShardSelector,
    len: AtomicUsize,
    tick: AtomicU64,
}

impl<V> ShardedMap<V> {
    // == Constructor ==
    /// Creates a map with `shard_count` shards.
    ///
    /// # Errors
    /// `CacheError::Config` unless `shard_count` is a positive power of two.
    pub fn new(shard_count: usize) -> Result<Self> {
        let selector = ShardSelector::new(shard_count, 0)?;
        let shards = (0..shard_count).map(|_| Shard::new()).collect();
        Ok(Self {
            shards,
            selector,
            len: AtomicUsize::new(0),
            tick: AtomicU64::new(0),
        })
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Number of entries held by each shard.
    pub async fn shard_lengths(&self) -> Vec<usize> {
        let mut lengths = Vec::with_capacity(self.shards.len());
        for shard in self.shards.iter() {
            lengths.push(shard.entries.read().await.len());
        }
        lengths
    }

    fn shard(&self, key: &CacheKey) -> &Shard<V> {
        &self.shards[self.selector.shard_for_key(key)]
    }

    fn next_tick(&self) -> u64 {
        self.tick.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[async_trait]
impl<V> EntryStore<V> for ShardedMap<V>
where
    V: ApproxSize + Clone + Send + Sync + 'static,
{
    async fn lookup(&self, key: &CacheKey) -> Option<CacheEntry<V>> {
        let entries = self.shard(key).entries.read().await;
        let entry = entries.get(key)?;
        entry.touch(self.next_tick());
        Some(entry.clone())
    }

    async fn store(&self, key: CacheKey, value: V, ttl: Option<Duration>) {
        let entry = CacheEntry::new(&key, value, ttl, Instant::now(), self.next_tick());
        let added = entry.approx_size;
        let shard = self.shard(&key);

        let mut entries = shard.entries.write().await;
        match entries.insert(key, entry) {
            Some(old) => {
                shard.bytes.fetch_add(added, Ordering::Relaxed);
                shard.bytes.fetch_sub(old.approx_size, Ordering::Relaxed);
            }
            None => {
                shard.bytes.fetch_add(added, Ordering::Relaxed);
                self.len.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    async fn delete(&self, key: &CacheKey) -> bool {
        let shard = self.shard(key);
        let mut entries = shard.entries.write().await;
        match entries.remove(key) {
            Some(old) => {
                shard.bytes.fetch_sub(old.approx_size, Ordering::Relaxed);
                self.len.fetch_sub(1, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    async fn sweep(&self, sweep: Sweep) -> usize {
        let mut removed = 0;

        for shard in self.shards.iter() {
            let mut entries = shard.entries.write().await;
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
                    if quota < by_access.len() {
                        by_access.select_nth_unstable(quota);
                    }
                    for (_, key) in by_access.into_iter().take(quota) {
                        entries.remove(&key);
                    }
                }
            }

            let dropped = before - entries.len();
            if dropped > 0 {
                let bytes = entries.values().map(|entry| entry.approx_size).sum();
                shard.bytes.store(bytes, Ordering::Relaxed);
                self.len.fetch_sub(dropped, Ordering::Relaxed);
                removed += dropped;
            }
        }

        removed
    }

    fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    fn approx_bytes(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.bytes.load(Ordering::Relaxed))
            .sum()
    }
}
