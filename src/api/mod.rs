//! API Module
//!
//! HTTP handlers and routing for the greeting service.
//!
//! # Endpoints
//! - `GET /hello` - Greet a name in a locale
//! - `POST /fill` - Warm the cache with synthetic greetings
//! - `GET /stats` - Get cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
