//! Error types for the greeting cache
//!
//! Provides unified error handling using thiserror.

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache core and its HTTP surface.
///
/// Cloneable so that a single collapsed computation can hand the same
/// outcome to every waiter.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// The upstream computation failed
    #[error("Upstream failed: {0}")]
    Upstream(Arc<anyhow::Error>),

    /// The caller's context ended while it was waiting
    #[error("Operation cancelled")]
    Cancelled,

    /// Invalid option combination detected at construction time
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl CacheError {
    /// Wraps any error as an upstream failure.
    pub fn upstream(err: impl Into<anyhow::Error>) -> Self {
        CacheError::Upstream(Arc::new(err.into()))
    }

    /// Returns true for errors produced by the upstream computation.
    pub fn is_upstream(&self) -> bool {
        matches!(self, CacheError::Upstream(_))
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CacheError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_helper_keeps_message() {
        let err = CacheError::upstream(anyhow::anyhow!("boom"));
        assert!(err.is_upstream());
        assert_eq!(err.to_string(), "Upstream failed: boom");
    }

    #[test]
    fn test_clone_shares_upstream_source() {
        let err = CacheError::upstream(anyhow::anyhow!("shared"));
        let copy = err.clone();
        match (err, copy) {
            (CacheError::Upstream(a), CacheError::Upstream(b)) => assert!(Arc::ptr_eq(&a, &b)),
            _ => panic!("expected upstream errors"),
        }
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            CacheError::Cancelled.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            CacheError::InvalidRequest("x".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            CacheError::upstream(anyhow::anyhow!("x")).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
