//! Cache Story - caching strategies in front of a greeting service
//!
//! Provides a get-or-compute cache facade over interchangeable entry stores,
//! with request collapsing, stale-on-error failover and a background janitor
//! enforcing TTL retention and a soft memory limit.

pub mod api;
pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod greeting;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use backend::Backend;
pub use config::Config;
