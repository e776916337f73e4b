//! TTL-based memoization of idempotent computations.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::store::CounterStore;

use super::key::CacheKey;

/// A memoizing cache over the shared store.
///
/// Failures of the store or of (de)serialization never fail the wrapped
/// computation; they degrade to a miss or to skipped storage.
pub struct ResponseCache {
    store: Option<Arc<dyn CounterStore>>,
}

impl ResponseCache {
    /// Create a cache backed by the given store.
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store: Some(store) }
    }

    /// Create a cache with no store. Every lookup misses and nothing is
    /// stored, matching the degraded behavior when the store is down.
    pub fn detached() -> Self {
        Self { store: None }
    }

    /// Return the cached value for `key`, or run `compute`, cache its
    /// result for `ttl`, and return it.
    ///
    /// Concurrent misses on the same key are not deduplicated: each caller
    /// runs `compute` independently and each overwrites the entry.
    pub async fn get_or_compute<T, F, Fut>(&self, key: &CacheKey, ttl: Duration, compute: F) -> T
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let Some(store) = &self.store else {
            trace!(key = %key, "No store configured, computing without cache");
            return compute().await;
        };

        let rendered = key.render();

        match store.get(&rendered).await {
            Ok(Some(cached)) => match serde_json::from_str(&cached) {
                Ok(value) => {
                    debug!(key = %rendered, "Cache hit");
                    return value;
                }
                Err(error) => {
                    warn!(key = %rendered, error = %error, "Failed to decode cached value, treating as miss");
                }
            },
            Ok(None) => {
                trace!(key = %rendered, "Cache miss");
            }
            Err(error) => {
                warn!(key = %rendered, error = %error, "Store unavailable, computing without cache");
                return compute().await;
            }
        }

        let value = compute().await;

        match serde_json::to_string(&value) {
            Ok(serialized) => {
                if let Err(error) = store.set_with_ttl(&rendered, &serialized, ttl).await {
                    warn!(key = %rendered, error = %error, "Failed to store cache entry");
                }
            }
            Err(error) => {
                warn!(key = %rendered, error = %error, "Result not serializable, skipping cache");
            }
        }

        value
    }

    /// Delete every cache entry matching the glob `pattern`. An empty
    /// pattern is a no-op: callers must pass an explicit wildcard to
    /// invalidate broadly. Returns the number of entries removed.
    pub async fn invalidate(&self, pattern: &str) -> u64 {
        if pattern.is_empty() {
            return 0;
        }
        let Some(store) = &self.store else {
            return 0;
        };
        match store.delete_matching(pattern).await {
            Ok(deleted) => {
                if deleted > 0 {
                    info!(pattern = %pattern, deleted = deleted, "Invalidated cache entries");
                }
                deleted
            }
            Err(error) => {
                warn!(pattern = %pattern, error = %error, "Cache invalidation failed");
                0
            }
        }
    }
}
