//! Caller-facing error taxonomy for the orchestrator façade.

use uuid::Uuid;

use crate::engine::EngineError;
use crate::interfaces::StorageError;
use crate::model::{SagaStatus, WorkflowError};
use crate::registry::RegistryError;

/// Result type for façade operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Errors surfaced to façade callers.
///
/// Step-level remote failures never appear here; they are recorded in the
/// step log and reflected in the saga's status.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl OrchestratorError {
    pub fn saga_not_found(id: Uuid) -> Self {
        Self::NotFound(format!("saga {id}"))
    }

    pub fn terminal(id: Uuid, status: SagaStatus) -> Self {
        Self::Conflict(format!("saga {id} is already {status}"))
    }
}

impl From<StorageError> for OrchestratorError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(id) => Self::saga_not_found(id),
            StorageError::TerminalState { id, status } => Self::terminal(id, status),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<WorkflowError> for OrchestratorError {
    fn from(err: WorkflowError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<RegistryError> for OrchestratorError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Invalid(_) | RegistryError::Parse(_) => {
                Self::Validation(err.to_string())
            }
            RegistryError::Io { .. } => Self::Internal(err.to_string()),
        }
    }
}

impl From<EngineError> for OrchestratorError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Store(e) => e.into(),
            other => Self::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_mapping() {
        let id = Uuid::new_v4();
        assert!(matches!(
            OrchestratorError::from(StorageError::NotFound(id)),
            OrchestratorError::NotFound(_)
        ));
        assert!(matches!(
            OrchestratorError::from(StorageError::TerminalState {
                id,
                status: SagaStatus::Completed
            }),
            OrchestratorError::Conflict(_)
        ));
        assert!(matches!(
            OrchestratorError::from(StorageError::Unavailable("down".into())),
            OrchestratorError::Internal(_)
        ));
    }

    #[test]
    fn test_workflow_error_is_validation() {
        let err = OrchestratorError::from(WorkflowError::EmptyName);
        assert!(matches!(err, OrchestratorError::Validation(_)));
        assert!(err.to_string().contains("name must not be empty"));
    }
}
