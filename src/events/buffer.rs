//! Bounded in-memory buffer of recently received events.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Maximum number of events retained for polling-style retrieval.
pub const MAX_STORED_MESSAGES: usize = 100;

/// An event as observed by the listener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceivedEvent {
    /// The channel the event arrived on.
    pub channel: String,
    /// The deserialized payload.
    pub message: serde_json::Value,
    /// When the listener received it.
    pub received_at: DateTime<Utc>,
}

/// A FIFO buffer of the most recently received events.
///
/// Process-local and lost on restart; independent of delivery to live
/// subscribers.
pub struct RecentBuffer {
    entries: RwLock<VecDeque<ReceivedEvent>>,
    capacity: usize,
}

impl Default for RecentBuffer {
    fn default() -> Self {
        Self::with_capacity(MAX_STORED_MESSAGES)
    }
}

impl RecentBuffer {
    /// Create a buffer with the standard capacity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a buffer with a custom capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Append an event, evicting the oldest if the buffer is full.
    pub fn push(&self, event: ReceivedEvent) {
        let mut entries = self.entries.write();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(event);
    }

    /// Return up to `limit` events, most recent first, optionally filtered
    /// by channel. A pure read: the buffer is unchanged.
    pub fn query(&self, channel_filter: Option<&str>, limit: usize) -> Vec<ReceivedEvent> {
        let entries = self.entries.read();
        let mut matched: Vec<ReceivedEvent> = entries
            .iter()
            .rev()
            .filter(|event| channel_filter.map_or(true, |channel| event.channel == channel))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.received_at.cmp(&a.received_at));
        matched.truncate(limit);
        matched
    }

    /// Number of buffered events.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(channel: &str, n: i64) -> ReceivedEvent {
        ReceivedEvent {
            channel: channel.to_string(),
            message: serde_json::json!({ "n": n }),
            received_at: DateTime::from_timestamp(1_700_000_000 + n, 0).unwrap(),
        }
    }

    #[test]
    fn test_eviction_keeps_the_most_recent() {
        let buffer = RecentBuffer::new();
        for n in 0..150 {
            buffer.push(event("events", n));
        }

        assert_eq!(buffer.len(), MAX_STORED_MESSAGES);
        let all = buffer.query(None, MAX_STORED_MESSAGES);
        assert_eq!(all.first().unwrap().message["n"], 149);
        assert_eq!(all.last().unwrap().message["n"], 50);
    }

    #[test]
    fn test_query_is_most_recent_first() {
        let buffer = RecentBuffer::new();
        for n in 0..5 {
            buffer.push(event("events", n));
        }

        let recent = buffer.query(None, 3);
        let ns: Vec<i64> = recent
            .iter()
            .map(|e| e.message["n"].as_i64().unwrap())
            .collect();
        assert_eq!(ns, vec![4, 3, 2]);
    }

    #[test]
    fn test_query_filters_by_channel() {
        let buffer = RecentBuffer::new();
        buffer.push(event("events", 1));
        buffer.push(event("notifications", 2));
        buffer.push(event("events", 3));

        let recent = buffer.query(Some("events"), 10);
        assert_eq!(recent.len(), 2);
        assert!(recent.iter().all(|e| e.channel == "events"));
    }

    #[test]
    fn test_query_is_idempotent() {
        let buffer = RecentBuffer::new();
        buffer.push(event("events", 1));

        let first = buffer.query(None, 10);
        let second = buffer.query(None, 10);
        assert_eq!(first, second);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_query_on_empty_buffer() {
        let buffer = RecentBuffer::new();
        assert!(buffer.is_empty());
        assert!(buffer.query(Some("events"), 10).is_empty());
    }
}
