//! Counter store trait for abstracting over keyed counter/cache backends.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by a counter store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store is unreachable or refused the operation.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The subscription connection was closed by the store.
    #[error("Subscription closed")]
    SubscriptionClosed,
}

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// How a counter key's TTL is applied on increment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryPolicy {
    /// Re-apply the TTL on every increment. A continuously active client
    /// extends its own window, so the limit behaves as a sliding cap.
    #[default]
    RefreshOnHit,
    /// Set the TTL only when the key is created; the window ends at a fixed
    /// deadline regardless of later hits.
    FixedWindow,
}

/// A message received on a subscribed channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreMessage {
    /// The channel the message arrived on.
    pub channel: String,
    /// The raw serialized payload.
    pub payload: String,
}

/// Stream of messages produced by a subscription.
pub type MessageStream = Pin<Box<dyn Stream<Item = StoreMessage> + Send>>;

/// Trait for keyed counter store implementations.
///
/// This abstracts the shared store the rate limiter, response cache, and
/// event bus are built on. All operations are assumed atomic per key on the
/// store side; callers do no in-process locking.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically increment the counter at `key` and apply `ttl` according
    /// to `policy`. Returns the post-increment count.
    async fn increment_and_expire(
        &self,
        key: &str,
        ttl: Duration,
        policy: ExpiryPolicy,
    ) -> StoreResult<u64>;

    /// Time remaining before `key` expires, or `None` if the key does not
    /// exist (or has already expired).
    async fn time_to_live(&self, key: &str) -> StoreResult<Option<Duration>>;

    /// Fetch the value stored at `key`, if any.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Store `value` at `key` with the given TTL, overwriting any previous
    /// value.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    /// Delete every key matching the glob-style `pattern` (`*` and `?`
    /// wildcards). Returns the number of keys deleted.
    async fn delete_matching(&self, pattern: &str) -> StoreResult<u64>;

    /// Deliver `payload` to all current subscribers of `channel`. Returns
    /// the number of receivers.
    async fn publish(&self, channel: &str, payload: &str) -> StoreResult<u64>;

    /// Open a subscription to the given channels. The returned stream yields
    /// messages until dropped or the store closes the connection.
    async fn subscribe(&self, channels: &[String]) -> StoreResult<MessageStream>;
}
