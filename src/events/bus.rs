//! Event publication and the background subscription listener.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::store::CounterStore;

use super::buffer::{ReceivedEvent, RecentBuffer};

/// Default number of events returned by a recent-events query.
pub const DEFAULT_QUERY_LIMIT: usize = 10;

/// Errors surfaced to a publisher.
///
/// These are caller bugs, not infrastructure hiccups, so unlike the rest of
/// the event bus they are reported rather than swallowed.
#[derive(Debug, Error)]
pub enum PublishError {
    /// No channel was given.
    #[error("No channel specified")]
    EmptyChannel,

    /// The payload serialized to JSON null.
    #[error("No message specified")]
    EmptyPayload,

    /// The payload could not be serialized.
    #[error("Failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Confirmation returned to a publisher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishReceipt {
    pub success: bool,
    pub channel: String,
    pub recipients: u64,
    pub timestamp: DateTime<Utc>,
}

/// Result of a recent-events query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentEvents {
    pub channel_filter: Option<String>,
    pub limit: usize,
    pub count: usize,
    pub events: Vec<ReceivedEvent>,
}

/// Handle to a running listener task.
///
/// Dropping the handle leaves the listener running for the life of the
/// process; call [`ListenerHandle::shutdown`] to stop it cleanly.
pub struct ListenerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    /// Signal the listener to stop and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

/// Publish/subscribe fan-out with a bounded recent-history buffer.
pub struct EventBus {
    store: Option<Arc<dyn CounterStore>>,
    recent: Arc<RecentBuffer>,
}

impl EventBus {
    /// Create an event bus backed by the given store.
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self {
            store: Some(store),
            recent: Arc::new(RecentBuffer::new()),
        }
    }

    /// Create an event bus with no store. Publishing reaches nobody and the
    /// listener idles, matching the degraded behavior when the store is
    /// down.
    pub fn detached() -> Self {
        Self {
            store: None,
            recent: Arc::new(RecentBuffer::new()),
        }
    }

    /// Publish `payload` to `channel`. Returns the number of live
    /// subscribers that received it, 0 when the store is absent or down.
    pub async fn publish<T: Serialize>(
        &self,
        channel: &str,
        payload: &T,
    ) -> Result<u64, PublishError> {
        if channel.is_empty() {
            return Err(PublishError::EmptyChannel);
        }

        let value = serde_json::to_value(payload)?;
        if value.is_null() {
            return Err(PublishError::EmptyPayload);
        }
        let serialized = value.to_string();

        let Some(store) = &self.store else {
            warn!(channel = %channel, "No store configured, publishing to nobody");
            return Ok(0);
        };

        match store.publish(channel, &serialized).await {
            Ok(recipients) => {
                debug!(channel = %channel, recipients = recipients, "Published event");
                Ok(recipients)
            }
            Err(error) => {
                warn!(channel = %channel, error = %error, "Store unavailable, event not delivered");
                Ok(0)
            }
        }
    }

    /// Publish and wrap the outcome in the caller-facing receipt shape.
    pub async fn publish_with_receipt<T: Serialize>(
        &self,
        channel: &str,
        payload: &T,
    ) -> Result<PublishReceipt, PublishError> {
        let recipients = self.publish(channel, payload).await?;
        Ok(PublishReceipt {
            success: true,
            channel: channel.to_string(),
            recipients,
            timestamp: Utc::now(),
        })
    }

    /// Start the background listener for the given channels.
    ///
    /// Exactly one listener per process is expected; each received event is
    /// appended to the recent-history buffer. With no store configured the
    /// task idles until shut down.
    pub fn start_listener(&self, channels: Vec<String>) -> ListenerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let store = self.store.clone();
        let recent = Arc::clone(&self.recent);

        let task = tokio::spawn(async move {
            let stream = match &store {
                Some(store) => match store.subscribe(&channels).await {
                    Ok(stream) => {
                        info!(channels = ?channels, "Listener subscribed");
                        Some(stream)
                    }
                    Err(error) => {
                        warn!(error = %error, "Store unavailable, listener idle");
                        None
                    }
                },
                None => {
                    warn!("No store configured, listener idle");
                    None
                }
            };

            let Some(mut stream) = stream else {
                loop {
                    match shutdown_rx.changed().await {
                        Ok(()) => {
                            if *shutdown_rx.borrow_and_update() {
                                break;
                            }
                        }
                        // Handle dropped without a shutdown: the listener
                        // stays up for the life of the process.
                        Err(_) => std::future::pending::<()>().await,
                    }
                }
                return;
            };

            // Cleared once the handle is dropped, so the select below stops
            // polling a closed shutdown channel.
            let mut shutdown_open = true;

            loop {
                tokio::select! {
                    changed = shutdown_rx.changed(), if shutdown_open => match changed {
                        Ok(()) => {
                            if *shutdown_rx.borrow_and_update() {
                                info!("Listener shutting down");
                                break;
                            }
                        }
                        Err(_) => {
                            shutdown_open = false;
                        }
                    },
                    next = stream.next() => match next {
                        Some(message) => {
                            let parsed = match serde_json::from_str(&message.payload) {
                                Ok(value) => value,
                                Err(error) => {
                                    warn!(channel = %message.channel, error = %error, "Dropping undecodable event");
                                    continue;
                                }
                            };
                            debug!(channel = %message.channel, "Received event");
                            recent.push(ReceivedEvent {
                                channel: message.channel,
                                message: parsed,
                                received_at: Utc::now(),
                            });
                        }
                        None => {
                            info!("Subscription closed, listener exiting");
                            break;
                        }
                    }
                }
            }
        });

        ListenerHandle {
            shutdown: shutdown_tx,
            task,
        }
    }

    /// Query the recent-history buffer, most recent first. `limit` defaults
    /// to [`DEFAULT_QUERY_LIMIT`].
    pub fn query_recent(
        &self,
        channel_filter: Option<&str>,
        limit: Option<usize>,
    ) -> RecentEvents {
        let limit = limit.unwrap_or(DEFAULT_QUERY_LIMIT);
        let events = self.recent.query(channel_filter, limit);
        RecentEvents {
            channel_filter: channel_filter.map(str::to_string),
            limit,
            count: events.len(),
            events,
        }
    }
}
