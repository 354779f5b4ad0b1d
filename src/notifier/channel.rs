//! In-process broadcast notifier.
//!
//! Uses a tokio broadcast channel so any number of in-process subscribers
//! (dashboards, tests, embedding applications) see every lifecycle event.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

use crate::interfaces::event_notifier::{EventNotifier, Result, SagaEvent};

/// Channel capacity for broadcast.
const CHANNEL_CAPACITY: usize = 1024;

/// Publishes events to a broadcast channel.
///
/// Publishing with no subscribers is not an error; the event is dropped.
/// Slow subscribers that fall behind by more than the channel capacity see
/// `RecvError::Lagged`.
pub struct ChannelNotifier {
    sender: broadcast::Sender<Arc<SagaEvent>>,
}

impl Default for ChannelNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelNotifier {
    pub fn new() -> Self {
        Self::with_capacity(CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<SagaEvent>> {
        self.sender.subscribe()
    }

    /// Get a clone of the sender for creating linked subscribers.
    pub fn sender(&self) -> broadcast::Sender<Arc<SagaEvent>> {
        self.sender.clone()
    }
}

#[async_trait]
impl EventNotifier for ChannelNotifier {
    async fn publish(&self, event: SagaEvent) -> Result<()> {
        let event_type = event.event_type;
        let saga_id = event.saga_id;

        match self.sender.send(Arc::new(event)) {
            Ok(receivers) => {
                debug!(%event_type, %saga_id, receivers, "Published saga event to channel");
            }
            Err(_) => {
                debug!(%event_type, %saga_id, "No channel subscribers; event dropped");
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "channel"
    }
}
