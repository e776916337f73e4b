//! Per-route composition of admission and cache stages.
//!
//! Routes declare what applies to them via [`RoutePolicy`]; the dispatch
//! layer runs the stages in order instead of wrapping handlers. A rejected
//! admission short-circuits before the handler or cache is touched.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::{CacheKey, ResponseCache};
use crate::ratelimit::{AdmissionDecision, ClientIdentity, Quota, RateLimitPolicy, RateLimiter};
use crate::store::CounterStore;

/// What applies to a route: an optional rate limit and an optional cache
/// TTL. Both absent means the handler runs unconditionally.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutePolicy {
    /// Admission policy for the route, if rate limited.
    #[serde(default)]
    pub rate_limit: Option<RateLimitPolicy>,

    /// Cache TTL in seconds, if responses are cacheable.
    #[serde(default)]
    pub cache_ttl_secs: Option<u64>,
}

impl RoutePolicy {
    /// The cache TTL as a `Duration`, if configured.
    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl_secs.map(Duration::from_secs)
    }
}

/// The result of dispatching a request through the pipeline.
#[derive(Debug)]
pub enum DispatchOutcome<T> {
    /// The handler ran (or its cached result was served). Quota metadata is
    /// present when the route is rate limited and the store was reachable.
    Completed { value: T, quota: Option<Quota> },
    /// Admission was refused; the handler did not run.
    RateLimited { quota: Quota },
}

impl<T> DispatchOutcome<T> {
    /// The completed value, if admission succeeded.
    pub fn value(&self) -> Option<&T> {
        match self {
            DispatchOutcome::Completed { value, .. } => Some(value),
            DispatchOutcome::RateLimited { .. } => None,
        }
    }
}

/// The admission-then-cache stage chain shared by all routes.
pub struct Pipeline {
    limiter: RateLimiter,
    cache: ResponseCache,
}

impl Pipeline {
    /// Create a pipeline over the given store.
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self {
            limiter: RateLimiter::new(store.clone()),
            cache: ResponseCache::new(store),
        }
    }

    /// Create a pipeline with no store: every stage degrades to
    /// pass-through.
    pub fn detached() -> Self {
        Self {
            limiter: RateLimiter::detached(),
            cache: ResponseCache::detached(),
        }
    }

    /// Create a pipeline from separately constructed components.
    pub fn with_components(limiter: RateLimiter, cache: ResponseCache) -> Self {
        Self { limiter, cache }
    }

    /// Run `handler` for a request on `route` from `identity`, applying the
    /// stages `policy` declares. `cache_key` is required for the cache stage
    /// to engage; without one the handler runs uncached.
    pub async fn dispatch<T, F, Fut>(
        &self,
        identity: &ClientIdentity,
        route: &str,
        cache_key: Option<&CacheKey>,
        policy: &RoutePolicy,
        handler: F,
    ) -> DispatchOutcome<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let quota = match &policy.rate_limit {
            Some(rate_limit) => {
                match self.limiter.check_admission(identity, route, rate_limit).await {
                    AdmissionDecision::Reject { quota } => {
                        debug!(route = %route, identity = %identity, "Dispatch refused");
                        return DispatchOutcome::RateLimited { quota };
                    }
                    AdmissionDecision::Admit { quota } => quota,
                }
            }
            None => None,
        };

        let value = match (policy.cache_ttl(), cache_key) {
            (Some(ttl), Some(key)) => self.cache.get_or_compute(key, ttl, handler).await,
            _ => handler().await,
        };

        DispatchOutcome::Completed { value, quota }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::store::MemoryStore;

    fn limited_policy(requests_limit: u64) -> RoutePolicy {
        RoutePolicy {
            rate_limit: Some(RateLimitPolicy {
                requests_limit,
                window_secs: 60,
                key_prefix: "demo".to_string(),
                ..RateLimitPolicy::default()
            }),
            cache_ttl_secs: None,
        }
    }

    #[tokio::test]
    async fn test_rejection_short_circuits_the_handler() {
        let pipeline = Pipeline::new(Arc::new(MemoryStore::new()));
        let identity = ClientIdentity::Peer("1.2.3.4".to_string());
        let policy = limited_policy(1);
        let calls = AtomicU32::new(0);

        let first = pipeline
            .dispatch(&identity, "/api/x", None, &policy, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                "ok".to_string()
            })
            .await;
        assert!(matches!(first, DispatchOutcome::Completed { .. }));

        let second = pipeline
            .dispatch(&identity, "/api/x", None, &policy, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                "ok".to_string()
            })
            .await;
        match second {
            DispatchOutcome::RateLimited { quota } => {
                assert_eq!(quota.limit, 1);
                assert_eq!(quota.remaining, 0);
            }
            DispatchOutcome::Completed { .. } => panic!("second dispatch should be refused"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_admitted_dispatch_carries_quota() {
        let pipeline = Pipeline::new(Arc::new(MemoryStore::new()));
        let identity = ClientIdentity::User("alice".to_string());

        let outcome = pipeline
            .dispatch(&identity, "/api/x", None, &limited_policy(5), || async {
                42u64
            })
            .await;
        match outcome {
            DispatchOutcome::Completed { value, quota } => {
                assert_eq!(value, 42);
                let quota = quota.expect("rate limited route should carry quota");
                assert_eq!(quota.limit, 5);
                assert_eq!(quota.remaining, 4);
            }
            DispatchOutcome::RateLimited { .. } => panic!("should be admitted"),
        }
    }

    #[tokio::test]
    async fn test_cache_stage_skips_repeat_computation() {
        let pipeline = Pipeline::new(Arc::new(MemoryStore::new()));
        let identity = ClientIdentity::Peer("1.2.3.4".to_string());
        let policy = RoutePolicy {
            rate_limit: None,
            cache_ttl_secs: Some(60),
        };
        let key = CacheKey::new("cached_data").kwarg("user_id", "anonymous");
        let calls = AtomicU32::new(0);

        for _ in 0..3 {
            let outcome = pipeline
                .dispatch(&identity, "/api/cached-data", Some(&key), &policy, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    "expensive".to_string()
                })
                .await;
            assert_eq!(outcome.value().unwrap(), "expensive");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unconfigured_route_runs_directly() {
        let pipeline = Pipeline::new(Arc::new(MemoryStore::new()));
        let identity = ClientIdentity::Peer("1.2.3.4".to_string());
        let calls = AtomicU32::new(0);

        for _ in 0..3 {
            let outcome = pipeline
                .dispatch(&identity, "/api/open", None, &RoutePolicy::default(), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                })
                .await;
            match outcome {
                DispatchOutcome::Completed { quota, .. } => assert!(quota.is_none()),
                DispatchOutcome::RateLimited { .. } => panic!("no policy, must not limit"),
            }
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_detached_pipeline_admits_and_computes() {
        let pipeline = Pipeline::detached();
        let identity = ClientIdentity::Peer("1.2.3.4".to_string());
        let policy = limited_policy(1);

        for _ in 0..5 {
            let outcome = pipeline
                .dispatch(&identity, "/api/x", None, &policy, || async { 1u64 })
                .await;
            assert!(matches!(
                outcome,
                DispatchOutcome::Completed { quota: None, .. }
            ));
        }
    }
}
