//! Greeting makers: the plain upstream and its cached decorator.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cache::Cache;
use crate::error::{CacheError, Result};
use crate::greeting::{Locale, Params};

/// Prefix of the synthetic names used to warm the cache.
pub const FILL_NAME_PREFIX: &str = "looooooooooooooooooooooooooooongstring";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GreetingError {
    /// The upstream chokes on this name
    #[error("#$@@^! %C 🤖")]
    Glitch,
}

// == Maker ==
/// Produces greetings.
#[async_trait]
pub trait Maker: Send + Sync {
    async fn hello(&self, cancel: &CancellationToken, params: &Params) -> Result<String>;
}

// == Simple Maker ==
/// Upstream greeter with an optional artificial delay.
#[derive(Debug, Clone, Default)]
pub struct SimpleMaker {
    delay: Duration,
}

impl SimpleMaker {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl Maker for SimpleMaker {
    async fn hello(&self, cancel: &CancellationToken, params: &Params) -> Result<String> {
        if !self.delay.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => return Err(CacheError::Cancelled),
                _ = tokio::time::sleep(self.delay) => {}
            }
        }

        if params.name.eq_ignore_ascii_case("bug") {
            return Err(CacheError::upstream(GreetingError::Glitch));
        }

        Ok(match params.locale {
            Locale::EnUs => format!("Hello, {}!", params.name),
            Locale::RuRu => format!("Привет, {}!", params.name),
        })
    }
}

// == Cached Maker ==
/// Serves greetings through a cache, falling back to the upstream maker.
pub struct CachedMaker {
    upstream: Arc<dyn Maker>,
    cache: Arc<Cache<String>>,
}

impl CachedMaker {
    pub fn new(upstream: Arc<dyn Maker>, cache: Arc<Cache<String>>) -> Self {
        Self { upstream, cache }
    }
}

#[async_trait]
impl Maker for CachedMaker {
    async fn hello(&self, cancel: &CancellationToken, params: &Params) -> Result<String> {
        let key = params.cache_key();
        let upstream = Arc::clone(&self.upstream);
        let params = params.clone();

        self.cache
            .get(cancel, &key, move |token| async move {
                upstream.hello(&token, &params).await
            })
            .await
    }
}

// == Fill ==
/// Requests `n` distinct synthetic greetings, returning how many succeeded.
pub async fn fill(maker: &dyn Maker, cancel: &CancellationToken, n: usize) -> usize {
    let mut filled = 0;
    for i in 0..n {
        let params = Params::new(format!("{}{}", FILL_NAME_PREFIX, i), Locale::EnUs);
        match maker.hello(cancel, &params).await {
            Ok(_) => filled += 1,
            Err(CacheError::Cancelled) => break,
            Err(err) => debug!(name = %params.name, error = %err, "fill request failed"),
        }
    }
    filled
}
