//! Request Collapser
//!
//! Registry of in-flight computations, at most one per key. The first caller
//! for a key spawns the computation; every caller arriving while it runs
//! waits on the same watch channel and receives a clone of the same outcome.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cache::CacheKey;
use crate::error::{CacheError, Result};

type Outcome<V> = Option<Result<V>>;

// == Collapser ==
#[derive(Debug)]
pub struct Collapser<V> {
    calls: Mutex<HashMap<CacheKey, watch::Receiver<Outcome<V>>>>,
}

impl<V> Default for Collapser<V> {
    fn default() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
        }
    }
}

/// Removes the registry slot once the computation settles, even if it panicked.
struct InFlightGuard<V> {
    collapser: Arc<Collapser<V>>,
    key: CacheKey,
}

impl<V> Drop for InFlightGuard<V> {
    fn drop(&mut self) {
        self.collapser.calls.lock().remove(&self.key);
    }
}

impl<V> Collapser<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with a computation currently running.
    pub fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }

    // == Run ==
    /// Returns the outcome of the single in-flight computation for `key`,
    /// starting `work` if none is running.
    ///
    /// `work` runs on its own task and is not owned by any caller: if `cancel`
    /// fires, this caller returns `CacheError::Cancelled` while the
    /// computation keeps going for everyone else still waiting.
    pub async fn run<Fut>(
        self: &Arc<Self>,
        cancel: &CancellationToken,
        key: &CacheKey,
        work: impl FnOnce() -> Fut + Send,
    ) -> Result<V>
    where
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let (mut rx, leader) = {
            let mut calls = self.calls.lock();
            match calls.get(key) {
                Some(rx) => {
                    debug!(key = %key, "joining in-flight computation");
                    (rx.clone(), None)
                }
                None => {
                    let (tx, rx) = watch::channel(None);
                    calls.insert(key.clone(), rx.clone());
                    (rx, Some(tx))
                }
            }
        };

        // The registry lock is released before `work` runs: the guard takes
        // it again when dropped, including while unwinding from `work`.
        if let Some(tx) = leader {
            let guard = InFlightGuard {
                collapser: Arc::clone(self),
                key: key.clone(),
            };
            let fut = work();
            tokio::spawn(async move {
                let outcome = fut.await;
                // Publish before the slot is released so late joiners
                // still see the result.
                let _ = tx.send(Some(outcome));
                drop(guard);
            });
        }

        tokio::select! {
            _ = cancel.cancelled() => Err(CacheError::Cancelled),
            settled = rx.wait_for(Option::is_some) => match settled {
                Ok(outcome) => outcome.clone().unwrap_or(Err(CacheError::Cancelled)),
                Err(_) => Err(CacheError::upstream(anyhow::anyhow!(
                    "computation for '{}' aborted",
                    key
                ))),
            },
        }
    }
}
