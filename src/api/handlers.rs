//! API Handlers
//!
//! HTTP request handlers for each greeting service endpoint.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use tokio_util::sync::CancellationToken;

use crate::backend::Backend;
use crate::cache::MemoryStats;
use crate::config::Strategy;
use crate::error::{CacheError, Result};
use crate::greeting::{self, Maker};
use crate::models::{
    FillRequest, FillResponse, HealthResponse, HelloQuery, HelloResponse, StatsResponse,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Greeting maker, cached according to the strategy
    pub maker: Arc<dyn Maker>,
    pub stats: Arc<MemoryStats>,
    pub strategy: Strategy,
    /// Name the cache reports metrics under, None when not caching
    pub cache_name: Option<String>,
}

impl AppState {
    /// Creates a new AppState serving through `backend`.
    pub fn from_backend(backend: &Backend) -> Self {
        Self {
            maker: backend.maker(),
            stats: backend.stats(),
            strategy: backend.strategy(),
            cache_name: backend.cache_name().map(str::to_string),
        }
    }
}

/// Token cancelled when the returned guard is dropped.
///
/// Axum drops the handler future when the client goes away, which cancels
/// whatever the request is still waiting on.
fn request_token() -> (CancellationToken, tokio_util::sync::DropGuard) {
    let token = CancellationToken::new();
    let guard = token.clone().drop_guard();
    (token, guard)
}

/// Handler for GET /hello
///
/// Returns a greeting for the given name and locale.
pub async fn hello_handler(
    State(state): State<AppState>,
    Query(query): Query<HelloQuery>,
) -> Result<Json<HelloResponse>> {
    if let Some(error_msg) = query.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let (cancel, _guard) = request_token();
    let message = state.maker.hello(&cancel, &query.into_params()).await?;

    Ok(Json(HelloResponse::new(message)))
}

/// Handler for POST /fill
///
/// Requests `n` synthetic greetings so that they land in the cache.
pub async fn fill_handler(
    State(state): State<AppState>,
    Json(req): Json<FillRequest>,
) -> Result<Json<FillResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let (cancel, _guard) = request_token();
    let filled = greeting::fill(state.maker.as_ref(), &cancel, req.n).await;

    Ok(Json(FillResponse { filled }))
}

/// Handler for GET /stats
///
/// Returns current cache statistics.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let snapshot = state
        .cache_name
        .as_deref()
        .map(|name| state.stats.snapshot(name));

    Json(StatsResponse::new(state.strategy, snapshot))
}

/// Handler for GET /health
///
/// Returns health status of the server.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::greeting::SimpleMaker;

    fn backend(strategy: Strategy) -> Backend {
        let config = CacheConfig {
            strategy,
            shard_count: 4,
            ..CacheConfig::default()
        };
        Backend::build(&config, Arc::new(SimpleMaker::default()), Arc::new(MemoryStats::new())).unwrap()
    }

    fn query(name: &str) -> Query<HelloQuery> {
        Query(HelloQuery {
            name: Some(name.to_string()),
            locale: None,
        })
    }

    #[tokio::test]
    async fn test_hello_then_stats() {
        let backend = backend(Strategy::Advanced);
        let state = AppState::from_backend(&backend);

        let first = hello_handler(State(state.clone()), query("Ann")).await.unwrap();
        let second = hello_handler(State(state.clone()), query("Ann")).await.unwrap();
        assert_eq!(first.message, "Hello, Ann!");
        assert_eq!(second.message, first.message);

        let stats = stats_handler(State(state)).await;
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.items, 1);
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
        backend.shutdown().await;
    }

    #[tokio::test]
    async fn test_hello_upstream_failure() {
        let backend = backend(Strategy::Naive);
        let state = AppState::from_backend(&backend);

        let result = hello_handler(State(state.clone()), query("bug")).await;
        assert!(matches!(result, Err(CacheError::Upstream(_))));
        assert_eq!(stats_handler(State(state)).await.failed, 1);
    }

    #[tokio::test]
    async fn test_hello_name_too_long() {
        let backend = backend(Strategy::None);
        let state = AppState::from_backend(&backend);

        let result = hello_handler(State(state), query(&"a".repeat(300))).await;
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_fill_handler_populates_cache() {
        let backend = backend(Strategy::Advanced);
        let state = AppState::from_backend(&backend);

        let response = fill_handler(State(state.clone()), Json(FillRequest { n: 50 })).await.unwrap();
        assert_eq!(response.filled, 50);
        assert_eq!(backend.cache().unwrap().len(), 50);
        assert_eq!(stats_handler(State(state)).await.writes, 50);
        backend.shutdown().await;
    }

    #[tokio::test]
    async fn test_stats_handler_pass_through() {
        let backend = backend(Strategy::None);
        let response = stats_handler(State(AppState::from_backend(&backend))).await;
        assert_eq!(response.strategy, "none");
        assert_eq!(response.hits, 0);
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }
}
