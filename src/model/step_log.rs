//! Append-only audit records of step actions.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Direction of a logged action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepAction {
    Execute,
    Compensate,
}

impl StepAction {
    pub fn as_str(self) -> &'static str {
        match self {
            StepAction::Execute => "EXECUTE",
            StepAction::Compensate => "COMPENSATE",
        }
    }
}

impl fmt::Display for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "EXECUTE" => Ok(StepAction::Execute),
            "COMPENSATE" => Ok(StepAction::Compensate),
            other => Err(format!("Unknown step action: {other}")),
        }
    }
}

/// Final outcome of a logical action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepOutcome {
    Success,
    Failed,
    Timeout,
    Skipped,
}

impl StepOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            StepOutcome::Success => "SUCCESS",
            StepOutcome::Failed => "FAILED",
            StepOutcome::Timeout => "TIMEOUT",
            StepOutcome::Skipped => "SKIPPED",
        }
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SUCCESS" => Ok(StepOutcome::Success),
            "FAILED" => Ok(StepOutcome::Failed),
            "TIMEOUT" => Ok(StepOutcome::Timeout),
            "SKIPPED" => Ok(StepOutcome::Skipped),
            other => Err(format!("Unknown step outcome: {other}")),
        }
    }
}

/// One record per logical action. Retries of the same action are not
/// logged separately; the entry carries the final outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepLogEntry {
    pub id: Uuid,
    pub saga_id: Uuid,
    pub step_index: usize,
    pub step_name: String,
    pub action: StepAction,
    pub outcome: StepOutcome,
    pub request_payload: Option<Value>,
    pub response_payload: Option<Value>,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl StepLogEntry {
    /// Start a log entry for an action beginning now.
    pub fn begin(
        saga_id: Uuid,
        step_index: usize,
        step_name: impl Into<String>,
        action: StepAction,
        request_payload: Option<Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            saga_id,
            step_index,
            step_name: step_name.into(),
            action,
            outcome: StepOutcome::Skipped,
            request_payload,
            response_payload: None,
            error_message: None,
            started_at: now,
            completed_at: now,
        }
    }

    /// Close the entry as successful.
    pub fn succeeded(mut self, response: Value) -> Self {
        self.outcome = StepOutcome::Success;
        self.response_payload = Some(response);
        self.completed_at = Utc::now();
        self
    }

    /// Close the entry with a failure or timeout outcome.
    pub fn failed(mut self, outcome: StepOutcome, error: impl Into<String>) -> Self {
        self.outcome = outcome;
        self.error_message = Some(error.into());
        self.completed_at = Utc::now();
        self
    }

    /// Close the entry as skipped (no compensating method).
    pub fn skipped(mut self) -> Self {
        self.outcome = StepOutcome::Skipped;
        self.completed_at = Utc::now();
        self
    }
}
