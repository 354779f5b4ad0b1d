//! Saga data model.
//!
//! - `saga`: saga instances and the status state machine
//! - `step_log`: append-only audit records of step actions
//! - `workflow`: workflow definitions, steps and retry policy

pub mod saga;
pub mod step_log;
pub mod workflow;

pub use saga::{merge_payload, SagaInstance, SagaStatus};
pub use step_log::{StepAction, StepLogEntry, StepOutcome};
pub use workflow::{
    RetryPolicy, WorkflowDefinition, WorkflowError, WorkflowStep, WorkflowSummary,
    DEFAULT_INITIAL_BACKOFF, DEFAULT_MAX_ATTEMPTS, DEFAULT_STEP_TIMEOUT,
};
