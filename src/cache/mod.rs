//! Cache Module
//!
//! Memoizing cache core: entry stores, request collapsing, stats and the
//! get-or-compute facade.

mod collapse;
mod entry;
mod facade;
mod memory;
mod naive;
mod sharded;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use collapse::Collapser;
pub use entry::{ApproxSize, CacheEntry, CacheKey, ENTRY_OVERHEAD};
pub use facade::{Cache, CacheOptions};
pub use memory::{EntryBytes, MemoryProbe, ProcessMemory};
pub use naive::SingleLockMap;
pub use sharded::{ShardSelector, ShardedMap};
pub use stats::{MemoryStats, Metric, NoopStats, StatsEvent, StatsSink, StatsSnapshot};
pub use store::{EntryStore, Sweep};
