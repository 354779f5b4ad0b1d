//! Startup recovery sweep.
//!
//! Hands every non-terminal saga found in the store back to the engine.
//! Runs resume from the persisted step index, so nothing is executed twice
//! and no pending compensation is skipped.

use std::sync::Arc;

use tracing::{error, info};
use uuid::Uuid;

use crate::engine::ExecutionEngine;
use crate::interfaces::{SagaStore, StorageError};
use crate::registry::WorkflowRegistry;

/// What a sweep did with each incomplete saga.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Handed to the engine.
    pub resumed: Vec<Uuid>,
    /// Workflow no longer registered; left untouched.
    pub orphaned: Vec<Uuid>,
    /// Already driven by a live execution in this process.
    pub skipped: Vec<Uuid>,
}

impl RecoveryReport {
    pub fn total(&self) -> usize {
        self.resumed.len() + self.orphaned.len() + self.skipped.len()
    }
}

/// Resumes incomplete sagas.
pub struct RecoverySweep {
    store: Arc<dyn SagaStore>,
    registry: Arc<WorkflowRegistry>,
    engine: Arc<ExecutionEngine>,
}

impl RecoverySweep {
    pub fn new(
        store: Arc<dyn SagaStore>,
        registry: Arc<WorkflowRegistry>,
        engine: Arc<ExecutionEngine>,
    ) -> Self {
        Self {
            store,
            registry,
            engine,
        }
    }

    /// Spawn one execution per incomplete saga.
    ///
    /// Returns once every saga has been handed off; executions continue in
    /// the background.
    pub async fn run(&self) -> Result<RecoveryReport, StorageError> {
        let incomplete = self.store.list_incomplete().await?;
        let mut report = RecoveryReport::default();

        for saga in incomplete {
            let Some(workflow) = self.registry.get(&saga.workflow_name).await else {
                error!(
                    saga_id = %saga.id,
                    workflow = %saga.workflow_name,
                    status = %saga.status,
                    step = saga.current_step_index,
                    "Cannot recover saga: workflow is not registered"
                );
                report.orphaned.push(saga.id);
                continue;
            };

            match self.engine.spawn(saga.id, workflow) {
                Some(_) => report.resumed.push(saga.id),
                None => report.skipped.push(saga.id),
            }
        }

        info!(
            resumed = report.resumed.len(),
            orphaned = report.orphaned.len(),
            skipped = report.skipped.len(),
            "Recovery sweep complete"
        );
        Ok(report)
    }
}
