//! Event notifier configuration.

use serde::Deserialize;

/// Notifier type discriminator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifierType {
    /// Write lifecycle events to the tracing log.
    #[default]
    Log,
    /// In-process broadcast channel.
    Channel,
    /// HTTP webhook.
    Webhook,
    /// Discard events.
    None,
}

/// Event notifier configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    #[serde(rename = "type")]
    pub notifier_type: NotifierType,
    pub webhook: WebhookConfig,
}

/// Webhook notifier configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Endpoint receiving `POST`ed events.
    pub endpoint: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Delivery retries after the first attempt.
    pub max_retries: usize,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            timeout_secs: 10,
            max_retries: 3,
        }
    }
}
