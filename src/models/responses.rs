//! Response DTOs for the greeting API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::StatsSnapshot;
use crate::config::Strategy;

/// Response body for GET /hello
#[derive(Debug, Clone, Serialize)]
pub struct HelloResponse {
    pub message: String,
}

impl HelloResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Response body for POST /fill
#[derive(Debug, Clone, Serialize)]
pub struct FillResponse {
    /// Greetings that were produced successfully
    pub filled: usize,
}

/// Response body for the stats endpoint (GET /stats)
///
/// Counters are zero under the pass-through strategy.
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Active caching strategy
    pub strategy: String,
    /// Name metrics are reported under
    pub cache_name: Option<String>,
    pub hits: u64,
    pub misses: u64,
    pub expired: u64,
    pub writes: u64,
    pub failed: u64,
    pub evicted: u64,
    /// Current number of entries in cache
    pub items: u64,
    /// Hit rate (hits / (hits + misses + expired))
    pub hit_rate: f64,
}

impl StatsResponse {
    /// Creates a new StatsResponse from a stats snapshot
    pub fn new(strategy: Strategy, snapshot: Option<StatsSnapshot>) -> Self {
        let hit_rate = snapshot.as_ref().map_or(0.0, StatsSnapshot::hit_rate);
        let cache_name = snapshot.as_ref().map(|s| s.cache_name.clone());
        let s = snapshot.unwrap_or_default();
        Self {
            strategy: strategy.to_string(),
            cache_name,
            hits: s.hits,
            misses: s.misses,
            expired: s.expired,
            writes: s.writes,
            failed: s.failed,
            evicted: s.evicted,
            items: s.items,
            hit_rate,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
