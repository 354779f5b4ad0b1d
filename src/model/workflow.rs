//! Workflow definitions, steps and retry policy.

use std::time::Duration;

use serde::Serialize;

/// Default per-step deadline.
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(30);
/// Default number of attempts per forward step.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default delay after the first failed attempt.
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Retry behavior for a forward step.
///
/// Backoff is pure exponential with a fixed 2x multiplier and no jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Always at least 1.
    pub max_attempts: u32,
    /// Sleep after the first failed attempt.
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Exactly one attempt, no retry.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
        }
    }

    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
        }
    }

    /// Sleep that follows failed attempt `attempt` (1-based):
    /// `initial_backoff * 2^(attempt-1)`.
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        self.initial_backoff
            .checked_mul(1u32 << exponent)
            .unwrap_or(Duration::MAX)
    }

    /// Whether another attempt follows failed attempt `attempt` (1-based).
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// One unit of forward work bound to a remote service method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowStep {
    pub name: String,
    pub service_name: String,
    pub forward_method: String,
    pub compensate_method: Option<String>,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl WorkflowStep {
    /// Step with default timeout and retry policy.
    pub fn new(
        name: impl Into<String>,
        service_name: impl Into<String>,
        forward_method: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            service_name: service_name.into(),
            forward_method: forward_method.into(),
            compensate_method: None,
            timeout: DEFAULT_STEP_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_compensation(mut self, method: impl Into<String>) -> Self {
        self.compensate_method = Some(method.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Errors from definition validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    #[error("Workflow name must not be empty")]
    EmptyName,

    #[error("Workflow '{0}' has no steps")]
    NoSteps(String),

    #[error("Workflow '{workflow}' step {index}: {field} must not be empty")]
    EmptyStepField {
        workflow: String,
        index: usize,
        field: &'static str,
    },

    #[error("Workflow '{workflow}' step '{step}': max_attempts must be at least 1")]
    ZeroAttempts { workflow: String, step: String },

    #[error("Workflow '{workflow}' step '{step}': timeout must be greater than zero")]
    ZeroTimeout { workflow: String, step: String },

    #[error("Malformed workflow definition: {0}")]
    Malformed(String),
}

/// A named, ordered template of steps.
///
/// Immutable once registered; sagas hold an `Arc` snapshot of the
/// definition they started with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowDefinition {
    pub name: String,
    pub description: Option<String>,
    pub steps: Vec<WorkflowStep>,
    /// Route cancellation through compensation instead of stopping in place.
    pub compensate_on_cancel: bool,
}

impl WorkflowDefinition {
    pub fn new(name: impl Into<String>, steps: Vec<WorkflowStep>) -> Self {
        Self {
            name: name.into(),
            description: None,
            steps,
            compensate_on_cancel: false,
        }
    }

    pub fn with_compensate_on_cancel(mut self, enabled: bool) -> Self {
        self.compensate_on_cancel = enabled;
        self
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Check the structural rules every registered definition must satisfy.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        if self.name.trim().is_empty() {
            return Err(WorkflowError::EmptyName);
        }
        if self.steps.is_empty() {
            return Err(WorkflowError::NoSteps(self.name.clone()));
        }
        for (index, step) in self.steps.iter().enumerate() {
            let empty_field = [
                ("name", &step.name),
                ("service_name", &step.service_name),
                ("forward_method", &step.forward_method),
            ]
            .into_iter()
            .find(|(_, value)| value.trim().is_empty());

            if let Some((field, _)) = empty_field {
                return Err(WorkflowError::EmptyStepField {
                    workflow: self.name.clone(),
                    index,
                    field,
                });
            }
            if step.retry.max_attempts == 0 {
                return Err(WorkflowError::ZeroAttempts {
                    workflow: self.name.clone(),
                    step: step.name.clone(),
                });
            }
            if step.timeout.is_zero() {
                return Err(WorkflowError::ZeroTimeout {
                    workflow: self.name.clone(),
                    step: step.name.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn summary(&self) -> WorkflowSummary {
        WorkflowSummary {
            name: self.name.clone(),
            step_count: self.steps.len(),
            step_names: self.steps.iter().map(|s| s.name.clone()).collect(),
        }
    }
}

/// Listing view of a registered workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowSummary {
    pub name: String,
    pub step_count: usize,
    pub step_names: Vec<String>,
}
