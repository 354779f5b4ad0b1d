//! Notifier that writes lifecycle events to the tracing log.

use async_trait::async_trait;
use tracing::info;

use crate::interfaces::event_notifier::{EventNotifier, Result, SagaEvent};

/// Logs each event at `info`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EventNotifier for LogNotifier {
    async fn publish(&self, event: SagaEvent) -> Result<()> {
        info!(
            event_type = %event.event_type,
            saga_id = %event.saga_id,
            workflow = %event.workflow_name,
            correlation_id = event.correlation_id.as_deref().unwrap_or(""),
            metadata = %event.metadata,
            "Saga event"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}
