//! Cache Entry Module
//!
//! Defines cache keys and the records held by entry stores.

use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

/// Fixed bookkeeping cost charged to every entry on top of key and value bytes.
pub const ENTRY_OVERHEAD: usize = 64;

// == Cache Key ==
/// Opaque, cheaply cloneable key derived from the upstream input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(Arc<str>);

impl CacheKey {
    pub fn new(key: impl AsRef<str>) -> Self {
        Self(Arc::from(key.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for CacheKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for CacheKey {
    fn from(key: String) -> Self {
        Self(Arc::from(key))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// == Approximate Size ==
/// Rough heap footprint of a cached value, used for soft-limit accounting.
pub trait ApproxSize {
    fn approx_size(&self) -> usize;
}

impl ApproxSize for String {
    fn approx_size(&self) -> usize {
        mem::size_of::<String>() + self.capacity()
    }
}

impl ApproxSize for Arc<str> {
    fn approx_size(&self) -> usize {
        mem::size_of::<Arc<str>>() + self.len()
    }
}

impl ApproxSize for Vec<u8> {
    fn approx_size(&self) -> usize {
        mem::size_of::<Vec<u8>>() + self.capacity()
    }
}

// == Cache Entry ==
/// A value with its absolute expiry and accounting metadata.
#[derive(Debug)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Expiration instant, None = never expires
    pub expires_at: Option<Instant>,
    /// Approximate bytes charged against the soft limit
    pub approx_size: usize,
    /// Logical access tick, bumped on every hit
    last_access: AtomicU64,
}

impl<V: ApproxSize> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new entry for `key` expiring `ttl` after `now`.
    ///
    /// # Arguments
    /// * `key` - Key the entry is stored under, counted in its size
    /// * `value` - The value to store
    /// * `ttl` - Optional TTL, None = never expires
    /// * `now` - Reference instant for the expiry
    /// * `tick` - Initial access tick
    pub fn new(key: &CacheKey, value: V, ttl: Option<Duration>, now: Instant, tick: u64) -> Self {
        let approx_size = ENTRY_OVERHEAD + key.len() + value.approx_size();
        Self {
            value,
            expires_at: ttl.map(|ttl| now + ttl),
            approx_size,
            last_access: AtomicU64::new(tick),
        }
    }
}

impl<V> CacheEntry<V> {
    // == Is Expired ==
    /// Checks if the entry has expired at `now`.
    ///
    /// Boundary condition: an entry is expired once `now` reaches its
    /// expiration instant.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(expires) => now >= expires,
            None => false,
        }
    }

    /// True when the entry expired more than `retention` before `now`.
    pub fn is_past_retention(&self, now: Instant, retention: Duration) -> bool {
        match self.expires_at {
            Some(expires) => now >= expires + retention,
            None => false,
        }
    }

    /// Records an access at `tick`.
    pub fn touch(&self, tick: u64) {
        self.last_access.fetch_max(tick, Ordering::Relaxed);
    }

    pub fn last_access(&self) -> u64 {
        self.last_access.load(Ordering::Relaxed)
    }
}

impl<V: Clone> Clone for CacheEntry<V> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            expires_at: self.expires_at,
            approx_size: self.approx_size,
            last_access: AtomicU64::new(self.last_access()),
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_without_ttl_never_expires() {
        let now = Instant::now();
        let entry = CacheEntry::new(&"k".into(), "v".to_string(), None, now, 0);

        assert!(entry.expires_at.is_none());
        assert!(!entry.is_expired_at(now + Duration::from_secs(3600 * 24 * 365)));
        assert!(!entry.is_past_retention(now + Duration::from_secs(3600), Duration::ZERO));
    }

    #[test]
    fn test_entry_expiration_boundary() {
        let now = Instant::now();
        let entry = CacheEntry::new(&"k".into(), "v".to_string(), Some(Duration::from_millis(100)), now, 0);

        assert!(!entry.is_expired_at(now + Duration::from_millis(99)));
        assert!(entry.is_expired_at(now + Duration::from_millis(100)));
    }

    #[test]
    fn test_retention_extends_past_expiry() {
        let now = Instant::now();
        let entry = CacheEntry::new(&"k".into(), "v".to_string(), Some(Duration::from_secs(1)), now, 0);
        let retention = Duration::from_secs(10);

        assert!(entry.is_expired_at(now + Duration::from_secs(5)));
        assert!(!entry.is_past_retention(now + Duration::from_secs(5), retention));
        assert!(entry.is_past_retention(now + Duration::from_secs(11), retention));
    }

    #[test]
    fn test_size_counts_key_and_value() {
        let key = CacheKey::new("abcd");
        let value = String::from("hello");
        let expected = ENTRY_OVERHEAD + 4 + value.approx_size();
        let entry = CacheEntry::new(&key, value, None, Instant::now(), 0);

        assert_eq!(entry.approx_size, expected);
    }

    #[test]
    fn test_touch_only_moves_forward() {
        let entry = CacheEntry::new(&"k".into(), "v".to_string(), None, Instant::now(), 5);
        entry.touch(3);
        assert_eq!(entry.last_access(), 5);
        entry.touch(9);
        assert_eq!(entry.last_access(), 9);
        assert_eq!(entry.clone().last_access(), 9);
    }

    #[test]
    fn test_key_conversions() {
        let a: CacheKey = "en-US:World".into();
        let b: CacheKey = String::from("en-US:World").into();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "en-US:World");
        assert!(!a.is_empty());
    }
}
