//! Admission control over the shared counter store.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::store::{CounterStore, ExpiryPolicy};

use super::identity::ClientIdentity;

/// Default maximum requests per window.
const DEFAULT_REQUESTS_LIMIT: u64 = 100;
/// Default window length in seconds.
const DEFAULT_WINDOW_SECS: u64 = 60;
/// Default key prefix for rate limit counters.
const DEFAULT_KEY_PREFIX: &str = "rate_limit";

/// A per-route rate limit policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    /// Maximum requests admitted per window.
    #[serde(default = "default_requests_limit")]
    pub requests_limit: u64,

    /// Window length in seconds.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Prefix for the composite counter key.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// How the window TTL is applied on each hit.
    #[serde(default)]
    pub expiry: ExpiryPolicy,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            requests_limit: default_requests_limit(),
            window_secs: default_window_secs(),
            key_prefix: default_key_prefix(),
            expiry: ExpiryPolicy::default(),
        }
    }
}

fn default_requests_limit() -> u64 {
    DEFAULT_REQUESTS_LIMIT
}

fn default_window_secs() -> u64 {
    DEFAULT_WINDOW_SECS
}

fn default_key_prefix() -> String {
    DEFAULT_KEY_PREFIX.to_string()
}

impl RateLimitPolicy {
    /// The window length as a `Duration`.
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Quota metadata attached to an admission decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quota {
    /// The configured limit for the window.
    pub limit: u64,
    /// Requests left before rejection.
    pub remaining: u64,
    /// When the current window expires.
    pub reset_at: DateTime<Utc>,
}

impl Quota {
    /// The standard rate limit header triple for HTTP responses.
    pub fn header_triple(&self) -> [(&'static str, String); 3] {
        [
            ("X-RateLimit-Limit", self.limit.to_string()),
            ("X-RateLimit-Remaining", self.remaining.to_string()),
            ("X-RateLimit-Reset", self.reset_at.timestamp().to_string()),
        ]
    }
}

/// JSON body for an HTTP 429 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectionBody {
    pub error: String,
    pub limit: u64,
    pub remaining: u64,
    pub reset: i64,
}

impl RejectionBody {
    /// Build the rejection body from the decision's quota.
    pub fn from_quota(quota: &Quota) -> Self {
        Self {
            error: "Rate limit exceeded".to_string(),
            limit: quota.limit,
            remaining: 0,
            reset: quota.reset_at.timestamp(),
        }
    }
}

/// The outcome of an admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionDecision {
    /// The request may proceed. Quota metadata is absent when the store was
    /// unavailable and the limiter degraded to pass-through.
    Admit { quota: Option<Quota> },
    /// The request exceeded its quota and must be refused.
    Reject { quota: Quota },
}

impl AdmissionDecision {
    /// Whether the request was admitted.
    pub fn is_admitted(&self) -> bool {
        matches!(self, AdmissionDecision::Admit { .. })
    }

    /// Quota metadata, if the store was reachable.
    pub fn quota(&self) -> Option<&Quota> {
        match self {
            AdmissionDecision::Admit { quota } => quota.as_ref(),
            AdmissionDecision::Reject { quota } => Some(quota),
        }
    }
}

/// Fixed-window admission control backed by a shared counter store.
///
/// The limiter holds no in-process counter state; correctness under
/// concurrent callers rests on the store's atomic increment.
pub struct RateLimiter {
    store: Option<Arc<dyn CounterStore>>,
}

impl RateLimiter {
    /// Create a limiter backed by the given store.
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store: Some(store) }
    }

    /// Create a limiter with no store. Every check admits with no quota
    /// metadata, matching the degraded behavior when the store is down.
    pub fn detached() -> Self {
        Self { store: None }
    }

    /// Decide whether a request from `identity` for `route` is admitted
    /// under `policy`.
    pub async fn check_admission(
        &self,
        identity: &ClientIdentity,
        route: &str,
        policy: &RateLimitPolicy,
    ) -> AdmissionDecision {
        let Some(store) = &self.store else {
            warn!("No store configured, admitting without rate limiting");
            return AdmissionDecision::Admit { quota: None };
        };

        let key = format!("{}:{}:{}", policy.key_prefix, identity.as_key(), route);

        trace!(key = %key, limit = policy.requests_limit, "Checking admission");

        let count = match store
            .increment_and_expire(&key, policy.window(), policy.expiry)
            .await
        {
            Ok(count) => count,
            Err(error) => {
                warn!(key = %key, error = %error, "Store unavailable, admitting without rate limiting");
                return AdmissionDecision::Admit { quota: None };
            }
        };

        let ttl = match store.time_to_live(&key).await {
            Ok(Some(ttl)) => ttl,
            // A just-expired or unreadable key still resolves to a full
            // window from now.
            Ok(None) | Err(_) => policy.window(),
        };
        let reset_at = Utc::now()
            + chrono::Duration::from_std(ttl)
                .unwrap_or_else(|_| chrono::Duration::seconds(policy.window_secs as i64));

        if count > policy.requests_limit {
            warn!(key = %key, count = count, limit = policy.requests_limit, "Rate limit exceeded");
            return AdmissionDecision::Reject {
                quota: Quota {
                    limit: policy.requests_limit,
                    remaining: 0,
                    reset_at,
                },
            };
        }

        debug!(key = %key, count = count, "Request admitted");

        AdmissionDecision::Admit {
            quota: Some(Quota {
                limit: policy.requests_limit,
                remaining: policy.requests_limit.saturating_sub(count),
                reset_at,
            }),
        }
    }
}
