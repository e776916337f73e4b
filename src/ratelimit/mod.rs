//! Rate limiting: client identity resolution and admission decisions.

mod identity;
mod limiter;

pub use identity::ClientIdentity;
pub use limiter::{AdmissionDecision, Quota, RateLimitPolicy, RateLimiter, RejectionBody};
