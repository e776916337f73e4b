//! Structured event fan-out and recent-event retention.

mod buffer;
mod bus;

pub use buffer::{ReceivedEvent, RecentBuffer, MAX_STORED_MESSAGES};
pub use bus::{
    EventBus, ListenerHandle, PublishError, PublishReceipt, RecentEvents, DEFAULT_QUERY_LIMIT,
};
