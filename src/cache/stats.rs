//! Cache Statistics Module
//!
//! Named counter and gauge events emitted by caches, and the sinks that
//! receive them.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

const METRIC_COUNT: usize = 7;

// == Metric ==
/// Names of the events a cache emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Hit,
    Miss,
    Expired,
    Write,
    Failed,
    Evicted,
    /// Gauge of current entry count
    Items,
}

impl Metric {
    pub const ALL: [Metric; METRIC_COUNT] = [
        Metric::Hit,
        Metric::Miss,
        Metric::Expired,
        Metric::Write,
        Metric::Failed,
        Metric::Evicted,
        Metric::Items,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Hit => "hit",
            Metric::Miss => "miss",
            Metric::Expired => "expired",
            Metric::Write => "write",
            Metric::Failed => "failed",
            Metric::Evicted => "evicted",
            Metric::Items => "items",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Stats Event ==
/// A single metric observation tagged with the cache it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsEvent {
    pub metric: Metric,
    pub delta: f64,
    pub cache_name: String,
}

// == Stats Sink ==
/// Receiver of cache metrics.
///
/// Implementations must return promptly: they are called on the request path.
pub trait StatsSink: Send + Sync {
    /// Adds `delta` to a counter.
    fn add(&self, metric: Metric, delta: f64, cache_name: &str);

    /// Sets a gauge to `value`.
    fn set(&self, metric: Metric, value: f64, cache_name: &str);
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStats;

impl StatsSink for NoopStats {
    fn add(&self, _metric: Metric, _delta: f64, _cache_name: &str) {}

    fn set(&self, _metric: Metric, _value: f64, _cache_name: &str) {}
}

// == Memory Stats ==
/// In-process sink keeping one set of lock-free counters per cache name.
///
/// The name registry only takes its write lock the first time a cache name
/// is seen; every later event is a single atomic update.
#[derive(Debug, Default)]
pub struct MemoryStats {
    caches: RwLock<HashMap<String, Arc<Counters>>>,
}

#[derive(Debug, Default)]
struct Counters {
    /// f64 bit patterns, indexed by `Metric::index`
    values: [AtomicU64; METRIC_COUNT],
}

impl Counters {
    fn add(&self, metric: Metric, delta: f64) {
        let slot = &self.values[metric.index()];
        let mut current = slot.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(current) + delta).to_bits();
            match slot.compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    fn set(&self, metric: Metric, value: f64) {
        self.values[metric.index()].store(value.to_bits(), Ordering::Relaxed);
    }

    fn get(&self, metric: Metric) -> f64 {
        f64::from_bits(self.values[metric.index()].load(Ordering::Relaxed))
    }
}

impl MemoryStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn counters(&self, cache_name: &str) -> Arc<Counters> {
        if let Some(counters) = self.caches.read().get(cache_name) {
            return Arc::clone(counters);
        }
        let mut caches = self.caches.write();
        Arc::clone(caches.entry(cache_name.to_string()).or_default())
    }

    /// Current value of one metric, 0 for unknown caches.
    pub fn value(&self, metric: Metric, cache_name: &str) -> f64 {
        self.caches
            .read()
            .get(cache_name)
            .map(|c| c.get(metric))
            .unwrap_or(0.0)
    }

    // == Snapshot ==
    /// Returns every metric of one cache.
    pub fn snapshot(&self, cache_name: &str) -> StatsSnapshot {
        StatsSnapshot::from_events(cache_name, &self.events(cache_name))
    }

    /// Returns every non-zero metric of one cache as events.
    pub fn events(&self, cache_name: &str) -> Vec<StatsEvent> {
        Metric::ALL
            .iter()
            .map(|&metric| StatsEvent {
                metric,
                delta: self.value(metric, cache_name),
                cache_name: cache_name.to_string(),
            })
            .filter(|event| event.delta != 0.0)
            .collect()
    }
}

impl StatsSink for MemoryStats {
    fn add(&self, metric: Metric, delta: f64, cache_name: &str) {
        self.counters(cache_name).add(metric, delta);
    }

    fn set(&self, metric: Metric, value: f64, cache_name: &str) {
        self.counters(cache_name).set(metric, value);
    }
}

// == Stats Snapshot ==
/// Point-in-time view of one cache's metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub cache_name: String,
    pub hits: u64,
    pub misses: u64,
    pub expired: u64,
    pub writes: u64,
    pub failed: u64,
    pub evicted: u64,
    pub items: u64,
}

impl StatsSnapshot {
    /// Folds the events recorded for `cache_name` into a snapshot.
    ///
    /// Events tagged with another cache are ignored.
    pub fn from_events(cache_name: &str, events: &[StatsEvent]) -> Self {
        let mut snapshot = StatsSnapshot {
            cache_name: cache_name.to_string(),
            ..StatsSnapshot::default()
        };
        for event in events.iter().filter(|e| e.cache_name == cache_name) {
            let delta = event.delta.max(0.0) as u64;
            let slot = match event.metric {
                Metric::Hit => &mut snapshot.hits,
                Metric::Miss => &mut snapshot.misses,
                Metric::Expired => &mut snapshot.expired,
                Metric::Write => &mut snapshot.writes,
                Metric::Failed => &mut snapshot.failed,
                Metric::Evicted => &mut snapshot.evicted,
                Metric::Items => &mut snapshot.items,
            };
            *slot += delta;
        }
        snapshot
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses + expired), or 0.0 if no lookups happened.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses + self.expired;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
