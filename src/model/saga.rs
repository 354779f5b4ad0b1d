//! Saga instances and the status state machine.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Lifecycle status of a saga instance.
///
/// ```text
/// Started --> Running --> Completed
///                |
///                v
///           Compensating --> Failed
///
/// Started | Running | Compensating --> Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SagaStatus {
    Started,
    Running,
    Completed,
    Compensating,
    Failed,
    Cancelled,
}

impl SagaStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [SagaStatus; 6] = [
        SagaStatus::Started,
        SagaStatus::Running,
        SagaStatus::Completed,
        SagaStatus::Compensating,
        SagaStatus::Failed,
        SagaStatus::Cancelled,
    ];

    /// Statuses a recovery sweep must pick up.
    pub const INCOMPLETE: [SagaStatus; 3] = [
        SagaStatus::Started,
        SagaStatus::Running,
        SagaStatus::Compensating,
    ];

    /// Terminal statuses never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SagaStatus::Completed | SagaStatus::Failed | SagaStatus::Cancelled
        )
    }

    /// Whether the state machine permits moving from `self` to `next`.
    pub fn can_transition_to(self, next: SagaStatus) -> bool {
        use SagaStatus::*;
        match (self, next) {
            (Started, Running) => true,
            (Running, Completed) | (Running, Compensating) => true,
            (Compensating, Failed) => true,
            (Started | Running | Compensating, Cancelled) => true,
            // Progress writes within a phase keep the status.
            (Running, Running) | (Compensating, Compensating) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SagaStatus::Started => "STARTED",
            SagaStatus::Running => "RUNNING",
            SagaStatus::Completed => "COMPLETED",
            SagaStatus::Compensating => "COMPENSATING",
            SagaStatus::Failed => "FAILED",
            SagaStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for SagaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown status string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown saga status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for SagaStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SagaStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// One in-flight or finished distributed transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaInstance {
    pub id: Uuid,
    pub workflow_name: String,
    /// Next step to execute while running; remaining steps to compensate
    /// while compensating.
    pub current_step_index: usize,
    pub status: SagaStatus,
    pub payload: Value,
    pub correlation_id: Option<String>,
    pub initiated_by: Option<String>,
    pub error_message: Option<String>,
    /// Sticky pending-cancellation flag, honored at the engine's next check point.
    pub cancel_requested: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SagaInstance {
    /// Create a fresh instance in `Started` with a generated id.
    pub fn new(
        workflow_name: impl Into<String>,
        payload: Value,
        correlation_id: Option<String>,
        initiated_by: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            workflow_name: workflow_name.into(),
            current_step_index: 0,
            status: SagaStatus::Started,
            payload,
            correlation_id,
            initiated_by,
            error_message: None,
            cancel_requested: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Copy of this instance moved to `next`, with `updated_at` refreshed.
    ///
    /// Entering `Completed` clears the error message. Returns `None` when the
    /// state machine forbids the move.
    pub fn transitioned(&self, next: SagaStatus) -> Option<SagaInstance> {
        if !self.status.can_transition_to(next) {
            return None;
        }
        let mut saga = self.clone();
        saga.status = next;
        saga.updated_at = Utc::now();
        // Only Compensating and Failed carry an error message.
        if matches!(next, SagaStatus::Completed | SagaStatus::Cancelled) {
            saga.error_message = None;
        }
        Some(saga)
    }
}

/// Merge a step response into the saga payload without overwriting keys.
///
/// Object responses contribute their keys that are absent from the payload.
/// Other non-null responses are stored under `step_name` when that key is free.
pub fn merge_payload(payload: &mut Value, step_name: &str, response: Value) {
    if response.is_null() {
        return;
    }
    if !payload.is_object() {
        let previous = std::mem::take(payload);
        let mut map = serde_json::Map::new();
        if !previous.is_null() {
            map.insert("input".to_string(), previous);
        }
        *payload = Value::Object(map);
    }
    let Some(target) = payload.as_object_mut() else {
        return;
    };
    match response {
        Value::Object(fields) => {
            for (key, value) in fields {
                target.entry(key).or_insert(value);
            }
        }
        other => {
            target.entry(step_name.to_string()).or_insert(other);
        }
    }
}
