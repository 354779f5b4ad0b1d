//! Saga execution engine.
//!
//! Drives one saga from its persisted position: forward steps with retry,
//! then either completion or a reverse compensation sweep. Every transition
//! is persisted (with its log entry) before the next remote call, and every
//! run starts by re-reading the saga from the store, so a run can resume
//! wherever a previous one stopped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::interfaces::{
    EventNotifier, SagaEvent, SagaEventType, SagaStore, StepInvoker, StorageError,
};
use crate::model::{
    merge_payload, SagaInstance, SagaStatus, StepAction, StepLogEntry, StepOutcome,
    WorkflowDefinition, WorkflowStep,
};

pub mod active;

pub use active::{ActiveGuard, ActiveSagas};

/// Error message recorded when cancellation routes through compensation.
pub const CANCELLED_BY_REQUEST: &str = "cancelled by request";

/// Errors that abort one execution attempt.
///
/// The saga stays at its last persisted state; a later run resumes it.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Storage error: {0}")]
    Store(#[from] StorageError),

    #[error("Saga {saga_id} belongs to workflow '{expected}', not '{actual}'")]
    WorkflowMismatch {
        saga_id: Uuid,
        expected: String,
        actual: String,
    },

    #[error("Saga {saga_id} is at step {index} but workflow '{workflow}' has {step_count} steps")]
    StepOutOfRange {
        saga_id: Uuid,
        workflow: String,
        index: usize,
        step_count: usize,
    },

    #[error("Illegal saga transition {from} -> {to}")]
    IllegalTransition { from: SagaStatus, to: SagaStatus },
}

/// How an execution attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The saga is terminal with this status.
    Finished(SagaStatus),
    /// Another execution in this process is driving the saga.
    AlreadyActive,
    /// The saga was made terminal by someone else mid-run.
    Superseded,
}

enum Checkpoint {
    Proceed,
    Cancel,
    Superseded,
}

/// Executes sagas against a store, an invoker and a notifier.
pub struct ExecutionEngine {
    store: Arc<dyn SagaStore>,
    invoker: Arc<dyn StepInvoker>,
    notifier: Arc<dyn EventNotifier>,
    active: Arc<ActiveSagas>,
}

impl ExecutionEngine {
    pub fn new(
        store: Arc<dyn SagaStore>,
        invoker: Arc<dyn StepInvoker>,
        notifier: Arc<dyn EventNotifier>,
    ) -> Self {
        Self {
            store,
            invoker,
            notifier,
            active: Arc::new(ActiveSagas::new()),
        }
    }

    /// Live execution table, shared with the façade for cancel signalling.
    pub fn active(&self) -> &Arc<ActiveSagas> {
        &self.active
    }

    /// Drive saga `id` until it is terminal or the attempt aborts.
    pub async fn run(
        &self,
        id: Uuid,
        workflow: Arc<WorkflowDefinition>,
    ) -> Result<RunOutcome, EngineError> {
        let Some(mut guard) = self.active.try_acquire(id) else {
            debug!(saga_id = %id, "Saga already has a live execution");
            return Ok(RunOutcome::AlreadyActive);
        };
        self.drive(id, &workflow, guard.cancel_signal()).await
    }

    /// Run saga `id` on its own task.
    ///
    /// The saga is claimed before this returns, so a cancel issued right
    /// after reaches the new execution. Returns `None` when the saga already
    /// has a live execution.
    pub fn spawn(
        self: &Arc<Self>,
        id: Uuid,
        workflow: Arc<WorkflowDefinition>,
    ) -> Option<JoinHandle<Result<RunOutcome, EngineError>>> {
        let mut guard = self.active.try_acquire(id)?;
        let engine = Arc::clone(self);

        Some(tokio::spawn(async move {
            let result = engine.drive(id, &workflow, guard.cancel_signal()).await;
            if let Err(e) = &result {
                error!(saga_id = %id, error = %e, "Saga execution aborted; left at last persisted state");
            }
            drop(guard);
            result
        }))
    }

    async fn drive(
        &self,
        id: Uuid,
        workflow: &WorkflowDefinition,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<RunOutcome, EngineError> {
        let saga = self.store.get(id).await?;
        if saga.workflow_name != workflow.name {
            return Err(EngineError::WorkflowMismatch {
                saga_id: id,
                expected: saga.workflow_name,
                actual: workflow.name.clone(),
            });
        }
        if saga.is_terminal() {
            debug!(saga_id = %id, status = %saga.status, "Saga already terminal");
            return Ok(RunOutcome::Finished(saga.status));
        }

        match saga.status {
            SagaStatus::Started if saga.cancel_requested => self.cancel(saga, workflow).await,
            SagaStatus::Started => {
                let running = transition(&saga, SagaStatus::Running)?;
                if !self.persist(&running, None).await? {
                    return Ok(RunOutcome::Superseded);
                }
                info!(saga_id = %id, workflow = %workflow.name, "Saga running");
                self.emit(SagaEventType::Running, &running);
                self.forward(running, workflow, cancel).await
            }
            SagaStatus::Running => {
                info!(saga_id = %id, step = saga.current_step_index, "Resuming saga");
                self.forward(saga, workflow, cancel).await
            }
            SagaStatus::Compensating => {
                info!(saga_id = %id, step = saga.current_step_index, "Resuming compensation");
                self.compensate(saga, workflow).await
            }
            terminal => Ok(RunOutcome::Finished(terminal)),
        }
    }

    /// Forward phase: execute steps from the persisted index.
    async fn forward(
        &self,
        mut saga: SagaInstance,
        workflow: &WorkflowDefinition,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<RunOutcome, EngineError> {
        while saga.current_step_index < workflow.step_count() {
            let index = saga.current_step_index;
            let step = &workflow.steps[index];
            let entry = StepLogEntry::begin(
                saga.id,
                index,
                &step.name,
                StepAction::Execute,
                Some(saga.payload.clone()),
            );

            let mut attempt = 1;
            let result = loop {
                match self.checkpoint(&mut saga).await? {
                    Checkpoint::Proceed => {}
                    Checkpoint::Superseded => return Ok(RunOutcome::Superseded),
                    Checkpoint::Cancel => return self.cancel(saga, workflow).await,
                }

                match self
                    .invoker
                    .invoke(&step.service_name, &step.forward_method, &saga.payload, step.timeout)
                    .await
                {
                    Ok(response) => break Ok(response),
                    Err(e) if step.retry.should_retry(attempt) => {
                        let delay = step.retry.backoff_after(attempt);
                        warn!(
                            saga_id = %saga.id,
                            step = %step.name,
                            attempt,
                            max_attempts = step.retry.max_attempts,
                            ?delay,
                            error = %e,
                            "Step attempt failed; retrying"
                        );
                        backoff(delay, cancel).await;
                        attempt += 1;
                    }
                    Err(e) => break Err(e),
                }
            };

            match result {
                Ok(response) => {
                    let entry = entry.succeeded(response.clone());
                    let mut next = transition(&saga, SagaStatus::Running)?;
                    merge_payload(&mut next.payload, &step.name, response);
                    next.current_step_index = index + 1;
                    if !self.persist(&next, Some(&entry)).await? {
                        return Ok(RunOutcome::Superseded);
                    }
                    debug!(saga_id = %saga.id, step = %step.name, attempts = attempt, "Step succeeded");
                    saga = next;
                }
                Err(e) => {
                    let outcome = if e.is_timeout() {
                        StepOutcome::Timeout
                    } else {
                        StepOutcome::Failed
                    };
                    let entry = entry.failed(outcome, e.to_string());
                    let mut next = transition(&saga, SagaStatus::Compensating)?;
                    next.error_message = Some(format!(
                        "step '{}' failed after {} attempt(s): {}",
                        step.name, attempt, e
                    ));
                    if !self.persist(&next, Some(&entry)).await? {
                        return Ok(RunOutcome::Superseded);
                    }
                    warn!(
                        saga_id = %saga.id,
                        step = %step.name,
                        attempts = attempt,
                        %outcome,
                        error = %e,
                        "Step exhausted retries; compensating"
                    );
                    self.emit(SagaEventType::Compensating, &next);
                    return self.compensate(next, workflow).await;
                }
            }
        }

        self.finish(saga, SagaStatus::Completed).await
    }

    /// Compensation phase: undo completed steps in reverse order.
    ///
    /// Each step gets one attempt. Failures are logged and the sweep goes on.
    async fn compensate(
        &self,
        mut saga: SagaInstance,
        workflow: &WorkflowDefinition,
    ) -> Result<RunOutcome, EngineError> {
        while saga.current_step_index > 0 {
            match self.checkpoint(&mut saga).await? {
                Checkpoint::Superseded => return Ok(RunOutcome::Superseded),
                Checkpoint::Cancel if !workflow.compensate_on_cancel => {
                    return self.finish(saga, SagaStatus::Cancelled).await;
                }
                Checkpoint::Cancel | Checkpoint::Proceed => {}
            }

            let index = saga.current_step_index - 1;
            let step = step_at(&saga, workflow, index)?;
            let entry = StepLogEntry::begin(
                saga.id,
                index,
                &step.name,
                StepAction::Compensate,
                Some(saga.payload.clone()),
            );

            let entry = match &step.compensate_method {
                None => {
                    debug!(saga_id = %saga.id, step = %step.name, "No compensation defined; skipping");
                    entry.skipped()
                }
                Some(method) => match self
                    .invoker
                    .invoke(&step.service_name, method, &saga.payload, step.timeout)
                    .await
                {
                    Ok(response) => entry.succeeded(response),
                    Err(e) => {
                        let outcome = if e.is_timeout() {
                            StepOutcome::Timeout
                        } else {
                            StepOutcome::Failed
                        };
                        warn!(
                            saga_id = %saga.id,
                            step = %step.name,
                            error = %e,
                            "Compensation failed; continuing sweep"
                        );
                        entry.failed(outcome, e.to_string())
                    }
                },
            };

            let mut next = transition(&saga, SagaStatus::Compensating)?;
            next.current_step_index = index;
            if !self.persist(&next, Some(&entry)).await? {
                return Ok(RunOutcome::Superseded);
            }
            saga = next;
        }

        let terminal = if saga.cancel_requested {
            SagaStatus::Cancelled
        } else {
            SagaStatus::Failed
        };
        self.finish(saga, terminal).await
    }

    /// Honor a pending cancellation during the forward phase.
    async fn cancel(
        &self,
        saga: SagaInstance,
        workflow: &WorkflowDefinition,
    ) -> Result<RunOutcome, EngineError> {
        if workflow.compensate_on_cancel && saga.current_step_index > 0 {
            let mut next = transition(&saga, SagaStatus::Compensating)?;
            next.error_message = Some(CANCELLED_BY_REQUEST.to_string());
            if !self.persist(&next, None).await? {
                return Ok(RunOutcome::Superseded);
            }
            info!(saga_id = %saga.id, "Saga cancelled; compensating completed steps");
            self.emit(SagaEventType::Compensating, &next);
            return self.compensate(next, workflow).await;
        }
        self.finish(saga, SagaStatus::Cancelled).await
    }

    async fn finish(
        &self,
        saga: SagaInstance,
        status: SagaStatus,
    ) -> Result<RunOutcome, EngineError> {
        let next = transition(&saga, status)?;
        if !self.persist(&next, None).await? {
            return Ok(RunOutcome::Superseded);
        }

        info!(
            saga_id = %next.id,
            workflow = %next.workflow_name,
            status = %status,
            step = next.current_step_index,
            "Saga finished"
        );
        let event_type = match status {
            SagaStatus::Completed => SagaEventType::Completed,
            SagaStatus::Cancelled => SagaEventType::Cancelled,
            _ => SagaEventType::Failed,
        };
        self.emit(event_type, &next);
        Ok(RunOutcome::Finished(status))
    }

    /// Re-read the saga and report whether to continue.
    async fn checkpoint(&self, saga: &mut SagaInstance) -> Result<Checkpoint, EngineError> {
        let current = self.store.get(saga.id).await?;
        if current.is_terminal() {
            info!(saga_id = %saga.id, status = %current.status, "Saga finished elsewhere; stopping");
            return Ok(Checkpoint::Superseded);
        }
        if current.cancel_requested {
            saga.cancel_requested = true;
            return Ok(Checkpoint::Cancel);
        }
        Ok(Checkpoint::Proceed)
    }

    /// Persist a transition. `Ok(false)` when the saga is already terminal.
    async fn persist(
        &self,
        saga: &SagaInstance,
        entry: Option<&StepLogEntry>,
    ) -> Result<bool, EngineError> {
        match self.store.apply_transition(saga, entry).await {
            Ok(()) => Ok(true),
            Err(StorageError::TerminalState { status, .. }) => {
                info!(saga_id = %saga.id, %status, "Saga finished elsewhere; stopping");
                Ok(false)
            }
            Err(e) => {
                error!(saga_id = %saga.id, status = %saga.status, error = %e, "Failed to persist saga transition");
                Err(e.into())
            }
        }
    }

    /// Publish an event without waiting; failures are logged and dropped.
    fn emit(&self, event_type: SagaEventType, saga: &SagaInstance) {
        let notifier = Arc::clone(&self.notifier);
        let event = SagaEvent::for_saga(event_type, saga);
        tokio::spawn(async move {
            if let Err(e) = notifier.publish(event).await {
                warn!(notifier = notifier.name(), %event_type, error = %e, "Failed to publish saga event");
            }
        });
    }
}

fn transition(saga: &SagaInstance, next: SagaStatus) -> Result<SagaInstance, EngineError> {
    saga.transitioned(next)
        .ok_or(EngineError::IllegalTransition {
            from: saga.status,
            to: next,
        })
}

fn step_at<'a>(
    saga: &SagaInstance,
    workflow: &'a WorkflowDefinition,
    index: usize,
) -> Result<&'a WorkflowStep, EngineError> {
    workflow
        .steps
        .get(index)
        .ok_or_else(|| EngineError::StepOutOfRange {
            saga_id: saga.id,
            workflow: workflow.name.clone(),
            index,
            step_count: workflow.step_count(),
        })
}

/// Sleep for `delay`, waking early if cancellation is signalled.
async fn backoff(delay: Duration, cancel: &mut watch::Receiver<bool>) {
    if *cancel.borrow() {
        return;
    }
    tokio::select! {
        _ = tokio::time::sleep(delay) => {}
        Ok(()) = cancel.changed() => {}
    }
}
