//! Memory probes sampled by the janitor when enforcing the soft limit.

use std::fmt;
use std::sync::Arc;

use crate::cache::EntryStore;

/// Source of an approximate "bytes in use" reading.
pub trait MemoryProbe: Send + Sync {
    /// Current usage in bytes, None when it cannot be measured.
    fn in_use_bytes(&self) -> Option<usize>;
}

// == Entry Bytes ==
/// Reports the approximate bytes held by one entry store.
pub struct EntryBytes<V> {
    store: Arc<dyn EntryStore<V>>,
}

impl<V> EntryBytes<V> {
    pub fn new(store: Arc<dyn EntryStore<V>>) -> Self {
        Self { store }
    }
}

impl<V> fmt::Debug for EntryBytes<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryBytes").finish_non_exhaustive()
    }
}

impl<V> MemoryProbe for EntryBytes<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn in_use_bytes(&self) -> Option<usize> {
        Some(self.store.approx_bytes())
    }
}

// == Process Memory ==
/// Reports the resident set size of the current process.
///
/// Reads `/proc/self/statm`; on platforms without procfs every reading is
/// None and pressure eviction never triggers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessMemory;

const PAGE_SIZE: usize = 4096;

impl MemoryProbe for ProcessMemory {
    fn in_use_bytes(&self) -> Option<usize> {
        let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
        parse_statm_resident(&statm).map(|pages| pages * PAGE_SIZE)
    }
}

/// Extracts the resident page count, the second field of statm.
fn parse_statm_resident(statm: &str) -> Option<usize> {
    statm.split_whitespace().nth(1)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SingleLockMap;

    #[test]
    fn test_parse_statm() {
        assert_eq!(parse_statm_resident("1000 250 30 4 0 90 0\n"), Some(250));
        assert_eq!(parse_statm_resident("1000"), None);
        assert_eq!(parse_statm_resident(""), None);
    }

    #[tokio::test]
    async fn test_entry_bytes_follows_store() {
        let store: Arc<dyn EntryStore<String>> = Arc::new(SingleLockMap::new());
        let probe = EntryBytes::new(Arc::clone(&store));
        assert_eq!(probe.in_use_bytes(), Some(0));

        store.store("k".into(), "value".to_string(), None).await;
        assert_eq!(probe.in_use_bytes(), Some(store.approx_bytes()));
        assert!(store.approx_bytes() > 0);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_process_memory_reads_procfs() {
        let bytes = ProcessMemory.in_use_bytes().unwrap();
        assert!(bytes > 0);
    }
}
