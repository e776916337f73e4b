//! In-process counter store implementation.
//!
//! `MemoryStore` backs the full `CounterStore` capability with process-local
//! state: sharded maps for counters and cached values, and a broadcast
//! channel per pub/sub channel for fan-out. Expiry is lazy: deadlines are
//! checked on access, and an expired entry behaves exactly like an absent
//! one. `delete_matching` doubles as a sweep of expired entries, and
//! `publish` prunes channels whose subscribers are all gone, so the maps do
//! not grow without bound under a recurring invalidation/publish workload.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use super::backend::{
    CounterStore, ExpiryPolicy, MessageStream, StoreMessage, StoreResult,
};
use super::pattern::key_matches;

/// Per-channel broadcast capacity. Slow subscribers past this many pending
/// messages lose the oldest ones, consistent with at-most-once delivery.
const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug)]
struct CounterEntry {
    count: u64,
    expires_at: Instant,
}

#[derive(Debug)]
struct ValueEntry {
    value: String,
    expires_at: Instant,
}

/// An in-memory `CounterStore`.
///
/// Suitable for single-process deployments and tests. All state is lost on
/// restart.
#[derive(Default)]
pub struct MemoryStore {
    counters: DashMap<String, CounterEntry>,
    values: DashMap<String, ValueEntry>,
    channels: DashMap<String, broadcast::Sender<StoreMessage>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn sender_for(&self, channel: &str) -> broadcast::Sender<StoreMessage> {
        self.channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .value()
            .clone()
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn increment_and_expire(
        &self,
        key: &str,
        ttl: Duration,
        policy: ExpiryPolicy,
    ) -> StoreResult<u64> {
        let now = Instant::now();
        // The entry API holds the shard lock for the whole update, so the
        // increment is atomic with respect to concurrent callers.
        match self.counters.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if entry.expires_at <= now {
                    // The window elapsed; this hit starts a fresh one.
                    entry.count = 1;
                    entry.expires_at = now + ttl;
                } else {
                    entry.count += 1;
                    if policy == ExpiryPolicy::RefreshOnHit {
                        entry.expires_at = now + ttl;
                    }
                }
                Ok(entry.count)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CounterEntry {
                    count: 1,
                    expires_at: now + ttl,
                });
                Ok(1)
            }
        }
    }

    async fn time_to_live(&self, key: &str) -> StoreResult<Option<Duration>> {
        let now = Instant::now();
        if let Some(entry) = self.counters.get(key) {
            if entry.expires_at > now {
                return Ok(Some(entry.expires_at - now));
            }
        }
        if let Some(entry) = self.values.get(key) {
            if entry.expires_at > now {
                return Ok(Some(entry.expires_at - now));
            }
        }
        Ok(None)
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let expired = match self.values.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Ok(Some(entry.value.clone()));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.values.remove(key);
        }
        Ok(None)
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        self.values.insert(
            key.to_string(),
            ValueEntry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete_matching(&self, pattern: &str) -> StoreResult<u64> {
        let now = Instant::now();
        let mut deleted = 0u64;
        // Expired entries are dropped during the walk but do not count:
        // they were already indistinguishable from absent keys.
        self.values.retain(|key, entry| {
            if entry.expires_at <= now {
                return false;
            }
            if key_matches(pattern, key) {
                deleted += 1;
                false
            } else {
                true
            }
        });
        self.counters.retain(|key, entry| {
            if entry.expires_at <= now {
                return false;
            }
            if key_matches(pattern, key) {
                deleted += 1;
                false
            } else {
                true
            }
        });
        Ok(deleted)
    }

    async fn publish(&self, channel: &str, payload: &str) -> StoreResult<u64> {
        let Some(sender) = self.channels.get(channel).map(|s| s.value().clone()) else {
            return Ok(0);
        };
        let message = StoreMessage {
            channel: channel.to_string(),
            payload: payload.to_string(),
        };
        match sender.send(message) {
            Ok(receivers) => Ok(receivers as u64),
            // send errors only when there are no receivers; drop the
            // abandoned channel so the map does not accumulate them.
            Err(_) => {
                self.channels
                    .remove_if(channel, |_, sender| sender.receiver_count() == 0);
                Ok(0)
            }
        }
    }

    async fn subscribe(&self, channels: &[String]) -> StoreResult<MessageStream> {
        let streams: Vec<_> = channels
            .iter()
            .map(|channel| {
                let receiver = self.sender_for(channel).subscribe();
                BroadcastStream::new(receiver)
                    .filter_map(|result| futures::future::ready(result.ok()))
            })
            .collect();
        Ok(Box::pin(stream::select_all(streams)))
    }
}
