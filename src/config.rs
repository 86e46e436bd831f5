//! Configuration Module
//!
//! Handles loading and validating service configuration from environment variables.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{CacheError, Result};

// == Strategy ==
/// Caching strategy placed in front of the greeting upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Every request reaches upstream
    None,
    /// Single lock over one map, lazy TTL expiry
    Naive,
    /// Sharded map with janitor, soft memory limit, collapsing and failover
    Advanced,
}

impl FromStr for Strategy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(Strategy::None),
            "naive" => Ok(Strategy::Naive),
            "advanced" => Ok(Strategy::Advanced),
            other => Err(CacheError::Config(format!("unknown cache strategy '{}'", other))),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::None => "none",
            Strategy::Naive => "naive",
            Strategy::Advanced => "advanced",
        };
        f.write_str(name)
    }
}

// == Memory Source ==
/// Where the janitor samples memory usage from when enforcing the soft limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemorySource {
    /// Approximate bytes held by cache entries
    Entries,
    /// Resident set size of the whole process
    Process,
}

impl FromStr for MemorySource {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "entries" => Ok(MemorySource::Entries),
            "process" => Ok(MemorySource::Process),
            other => Err(CacheError::Config(format!("unknown memory source '{}'", other))),
        }
    }
}

/// Cache options recognised by the backend selector.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Which backend to build
    pub strategy: Strategy,
    /// Entry time to live, None = unlimited
    pub ttl: Option<Duration>,
    /// Number of shards, power of two (advanced only)
    pub shard_count: usize,
    /// Delay between janitor sweeps (advanced only)
    pub eviction_interval: Duration,
    /// Soft memory limit in bytes, None = disabled
    pub memory_soft_limit_bytes: Option<usize>,
    /// Serve the last good value when upstream fails
    pub failover: bool,
    /// Fraction of each shard evicted per sweep under memory pressure
    pub evict_fraction: f64,
    /// How long expired entries are kept around for failover
    pub stale_retention: Duration,
    /// Memory sample used against the soft limit
    pub memory_source: MemorySource,
}

impl CacheConfig {
    // == Validate ==
    /// Rejects option combinations that cannot produce a working cache.
    pub fn validate(&self) -> Result<()> {
        if self.strategy != Strategy::Advanced {
            return Ok(());
        }
        if self.shard_count == 0 || !self.shard_count.is_power_of_two() {
            return Err(CacheError::Config(format!(
                "shard count must be a positive power of two, got {}",
                self.shard_count
            )));
        }
        if self.eviction_interval.is_zero() {
            return Err(CacheError::Config(
                "eviction interval must be greater than zero".to_string(),
            ));
        }
        if !(self.evict_fraction > 0.0 && self.evict_fraction <= 1.0) {
            return Err(CacheError::Config(format!(
                "evict fraction must be in (0, 1], got {}",
                self.evict_fraction
            )));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Advanced,
            ttl: None,
            shard_count: 64,
            eviction_interval: Duration::from_secs(30),
            memory_soft_limit_bytes: Some(100 * 1024 * 1024),
            failover: true,
            evict_fraction: 0.1,
            stale_retention: Duration::from_secs(24 * 60 * 60),
            memory_source: MemorySource::Entries,
        }
    }
}

/// Service configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Cache options
    pub cache: CacheConfig,
    /// Artificial latency added to every upstream call
    pub upstream_delay: Duration,
    /// HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_STRATEGY` - `none`, `naive` or `advanced` (default: advanced)
    /// - `CACHE_TTL_MS` - Entry TTL in milliseconds, 0 = unlimited (default: 0)
    /// - `CACHE_SHARD_COUNT` - Shard count (default: 64)
    /// - `CACHE_EVICTION_INTERVAL_MS` - Janitor interval (default: 30000)
    /// - `CACHE_MEMORY_SOFT_LIMIT_BYTES` - Soft limit, 0 = disabled (default: 100 MiB)
    /// - `CACHE_FAILOVER` - Serve stale values on upstream errors, `on`/`off` (default: true)
    /// - `CACHE_EVICT_FRACTION` - Pressure eviction fraction (default: 0.1)
    /// - `CACHE_STALE_RETENTION_MS` - Expired entry retention (default: 24h)
    /// - `CACHE_MEMORY_SOURCE` - `entries` or `process` (default: entries)
    /// - `UPSTREAM_DELAY_MS` - Simulated upstream latency (default: 0)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    ///
    /// Unparseable numbers fall back to defaults; unknown strategy or memory
    /// source names and unrecognised switch values are configuration errors.
    pub fn from_env() -> Result<Self> {
        let defaults = CacheConfig::default();

        let strategy = match env::var("CACHE_STRATEGY") {
            Ok(v) => v.parse()?,
            Err(_) => defaults.strategy,
        };
        let memory_source = match env::var("CACHE_MEMORY_SOURCE") {
            Ok(v) => v.parse()?,
            Err(_) => defaults.memory_source,
        };

        let cache = CacheConfig {
            strategy,
            ttl: match env_parse::<u64>("CACHE_TTL_MS") {
                Some(0) => None,
                Some(ms) => Some(Duration::from_millis(ms)),
                None => defaults.ttl,
            },
            shard_count: env_parse("CACHE_SHARD_COUNT").unwrap_or(defaults.shard_count),
            eviction_interval: env_parse("CACHE_EVICTION_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.eviction_interval),
            memory_soft_limit_bytes: match env_parse::<usize>("CACHE_MEMORY_SOFT_LIMIT_BYTES") {
                Some(0) => None,
                Some(bytes) => Some(bytes),
                None => defaults.memory_soft_limit_bytes,
            },
            failover: match env::var("CACHE_FAILOVER") {
                Ok(v) => parse_flag("CACHE_FAILOVER", &v)?,
                Err(_) => defaults.failover,
            },
            evict_fraction: env_parse("CACHE_EVICT_FRACTION").unwrap_or(defaults.evict_fraction),
            stale_retention: env_parse("CACHE_STALE_RETENTION_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.stale_retention),
            memory_source,
        };
        cache.validate()?;

        Ok(Self {
            cache,
            upstream_delay: Duration::from_millis(env_parse("UPSTREAM_DELAY_MS").unwrap_or(0)),
            server_port: env_parse("SERVER_PORT").unwrap_or(3000),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            upstream_delay: Duration::ZERO,
            server_port: 3000,
        }
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// Parses an on/off switch, rejecting anything unrecognised.
fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        other => Err(CacheError::Config(format!(
            "{} must be on or off, got '{}'",
            name, other
        ))),
    }
}
