//! Event notifier implementations.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::{NotifierConfig, NotifierType};
use crate::interfaces::event_notifier::{EventNotifier, Result, SagaEvent};

pub mod channel;
pub mod log;
pub mod webhook;

pub use channel::ChannelNotifier;
pub use log::LogNotifier;
pub use webhook::WebhookNotifier;

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl EventNotifier for NoopNotifier {
    async fn publish(&self, _event: SagaEvent) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "none"
    }
}

/// Initialize the notifier selected by configuration.
pub fn init_notifier(config: &NotifierConfig) -> Result<Arc<dyn EventNotifier>> {
    let notifier: Arc<dyn EventNotifier> = match config.notifier_type {
        NotifierType::Log => Arc::new(LogNotifier::new()),
        NotifierType::Channel => Arc::new(ChannelNotifier::new()),
        NotifierType::Webhook => Arc::new(WebhookNotifier::new(&config.webhook)?),
        NotifierType::None => Arc::new(NoopNotifier),
    };
    info!("Notifier: {}", notifier.name());
    Ok(notifier)
}
