//! Saga lifecycle event notification interface.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::model::SagaInstance;

/// Result type for notifier operations.
pub type Result<T> = std::result::Result<T, NotifyError>;

/// Errors that can occur while publishing events.
///
/// These never affect saga status; callers log and drop them.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Notifier unavailable: {0}")]
    Unavailable(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Event rejected by receiver: {0}")]
    Rejected(String),
}

/// Lifecycle event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SagaEventType {
    Running,
    Completed,
    Compensating,
    Failed,
    Cancelled,
}

impl SagaEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            SagaEventType::Running => "RUNNING",
            SagaEventType::Completed => "COMPLETED",
            SagaEventType::Compensating => "COMPENSATING",
            SagaEventType::Failed => "FAILED",
            SagaEventType::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for SagaEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lifecycle event for one saga.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SagaEvent {
    pub event_type: SagaEventType,
    pub saga_id: Uuid,
    pub workflow_name: String,
    pub correlation_id: Option<String>,
    pub metadata: Value,
    pub occurred_at: DateTime<Utc>,
}

impl SagaEvent {
    /// Event describing `saga` as just persisted.
    pub fn for_saga(event_type: SagaEventType, saga: &SagaInstance) -> Self {
        let mut metadata = serde_json::Map::new();
        metadata.insert(
            "current_step_index".to_string(),
            Value::from(saga.current_step_index),
        );
        if let Some(error) = &saga.error_message {
            metadata.insert("error_message".to_string(), Value::from(error.clone()));
        }
        Self {
            event_type,
            saga_id: saga.id,
            workflow_name: saga.workflow_name.clone(),
            correlation_id: saga.correlation_id.clone(),
            metadata: Value::Object(metadata),
            occurred_at: Utc::now(),
        }
    }
}

/// Best-effort publisher of saga lifecycle events.
///
/// Implementations:
/// - `LogNotifier`: writes events to the tracing log
/// - `ChannelNotifier`: in-process broadcast to subscribers
/// - `WebhookNotifier`: HTTP POST with bounded retry
/// - `NoopNotifier`: discards everything
#[async_trait]
pub trait EventNotifier: Send + Sync {
    async fn publish(&self, event: SagaEvent) -> Result<()>;

    /// Notifier name for logging.
    fn name(&self) -> &str;
}
