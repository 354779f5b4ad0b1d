//! Saga storage interface.

use async_trait::async_trait;
use uuid::Uuid;

use crate::model::{SagaInstance, SagaStatus, StepLogEntry};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Saga not found: {0}")]
    NotFound(Uuid),

    #[error("Saga already exists: {0}")]
    AlreadyExists(Uuid),

    #[error("Saga {id} is terminal ({status}); no further transitions are accepted")]
    TerminalState { id: Uuid, status: SagaStatus },

    #[error("Invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[cfg(feature = "sqlite")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Filter for saga listings. `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SagaFilter {
    pub workflow_name: Option<String>,
    pub status: Option<SagaStatus>,
    pub correlation_id: Option<String>,
}

impl SagaFilter {
    pub fn matches(&self, saga: &SagaInstance) -> bool {
        self.workflow_name
            .as_deref()
            .map_or(true, |name| saga.workflow_name == name)
            && self.status.map_or(true, |status| saga.status == status)
            && self
                .correlation_id
                .as_deref()
                .map_or(true, |cid| saga.correlation_id.as_deref() == Some(cid))
    }
}

/// Offset pagination request. `page` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 20,
        }
    }
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }
}

/// One page of a saga listing.
#[derive(Debug, Clone, PartialEq)]
pub struct SagaPage {
    pub items: Vec<SagaInstance>,
    /// Count of all sagas matching the filter.
    pub total: u64,
    pub has_next: bool,
}

impl SagaPage {
    pub fn new(items: Vec<SagaInstance>, total: u64, page: PageRequest) -> Self {
        let has_next = page.offset() + (items.len() as u64) < total;
        Self {
            items,
            total,
            has_next,
        }
    }
}

/// Durable keeper of saga state and the step log.
///
/// Implementations:
/// - `InMemorySagaStore`: process-local fallback, one lock over all state
/// - `SqliteSagaStore`: SQLite storage with transactional transitions
#[async_trait]
pub trait SagaStore: Send + Sync {
    /// Persist a new saga. Fails with `AlreadyExists` on id collision.
    async fn create(&self, saga: &SagaInstance) -> Result<()>;

    /// Persist a state transition and its log entry atomically.
    ///
    /// Either both the instance row and the entry are committed or neither
    /// is. Rejected with `TerminalState` when the stored saga is already
    /// terminal. The stored `cancel_requested` flag is never cleared.
    async fn apply_transition(
        &self,
        saga: &SagaInstance,
        entry: Option<&StepLogEntry>,
    ) -> Result<()>;

    /// Set the pending-cancellation flag on a non-terminal saga.
    ///
    /// Returns the updated instance.
    async fn request_cancellation(&self, id: Uuid) -> Result<SagaInstance>;

    /// Retrieve a saga. Fails with `NotFound`.
    async fn get(&self, id: Uuid) -> Result<SagaInstance>;

    /// Step log of a saga, in append order. Empty for unknown ids.
    async fn list_logs(&self, id: Uuid) -> Result<Vec<StepLogEntry>>;

    /// Every saga in `Started`, `Running` or `Compensating`.
    async fn list_incomplete(&self) -> Result<Vec<SagaInstance>>;

    /// Filtered, paginated listing, newest first.
    async fn list(&self, filter: &SagaFilter, page: PageRequest) -> Result<SagaPage>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_page_offset() {
        assert_eq!(PageRequest::new(1, 20).offset(), 0);
        assert_eq!(PageRequest::new(3, 20).offset(), 40);
        assert_eq!(PageRequest::new(0, 20).offset(), 0);
    }

    #[test]
    fn test_has_next() {
        let saga = SagaInstance::new("wf", json!({}), None, None);
        let page = SagaPage::new(vec![saga.clone(); 2], 5, PageRequest::new(1, 2));
        assert!(page.has_next);
        let page = SagaPage::new(vec![saga], 5, PageRequest::new(3, 2));
        assert!(!page.has_next);
    }

    #[test]
    fn test_filter_matches() {
        let mut saga = SagaInstance::new("wf", json!({}), Some("c-1".into()), None);
        saga.status = SagaStatus::Running;

        assert!(SagaFilter::default().matches(&saga));
        assert!(SagaFilter {
            workflow_name: Some("wf".into()),
            status: Some(SagaStatus::Running),
            correlation_id: Some("c-1".into()),
        }
        .matches(&saga));
        assert!(!SagaFilter {
            correlation_id: Some("c-2".into()),
            ..Default::default()
        }
        .matches(&saga));
        assert!(!SagaFilter {
            status: Some(SagaStatus::Failed),
            ..Default::default()
        }
        .matches(&saga));
    }
}
