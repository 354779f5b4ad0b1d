//! In-memory saga store.
//!
//! Fallback when no durable backend is configured. All state sits behind
//! one mutex, so every operation (including transitions) is trivially atomic.
//! Nothing survives a restart.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::interfaces::saga_store::{
    PageRequest, Result, SagaFilter, SagaPage, SagaStore, StorageError,
};
use crate::model::{SagaInstance, StepLogEntry};

#[derive(Default)]
struct MemoryState {
    sagas: BTreeMap<Uuid, SagaInstance>,
    logs: BTreeMap<Uuid, Vec<StepLogEntry>>,
}

/// Saga store backed by ordered maps under a single lock.
#[derive(Default)]
pub struct InMemorySagaStore {
    state: Mutex<MemoryState>,
}

impl InMemorySagaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sagas.
    pub async fn len(&self) -> usize {
        self.state.lock().await.sagas.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SagaStore for InMemorySagaStore {
    async fn create(&self, saga: &SagaInstance) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.sagas.contains_key(&saga.id) {
            return Err(StorageError::AlreadyExists(saga.id));
        }
        state.sagas.insert(saga.id, saga.clone());
        state.logs.insert(saga.id, Vec::new());
        Ok(())
    }

    async fn apply_transition(
        &self,
        saga: &SagaInstance,
        entry: Option<&StepLogEntry>,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        let stored = state
            .sagas
            .get_mut(&saga.id)
            .ok_or(StorageError::NotFound(saga.id))?;
        if stored.status.is_terminal() {
            return Err(StorageError::TerminalState {
                id: saga.id,
                status: stored.status,
            });
        }

        let cancel_requested = stored.cancel_requested || saga.cancel_requested;
        *stored = saga.clone();
        stored.cancel_requested = cancel_requested;

        if let Some(entry) = entry {
            state.logs.entry(saga.id).or_default().push(entry.clone());
        }
        Ok(())
    }

    async fn request_cancellation(&self, id: Uuid) -> Result<SagaInstance> {
        let mut state = self.state.lock().await;
        let stored = state
            .sagas
            .get_mut(&id)
            .ok_or(StorageError::NotFound(id))?;
        if stored.status.is_terminal() {
            return Err(StorageError::TerminalState {
                id,
                status: stored.status,
            });
        }
        stored.cancel_requested = true;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn get(&self, id: Uuid) -> Result<SagaInstance> {
        self.state
            .lock()
            .await
            .sagas
            .get(&id)
            .cloned()
            .ok_or(StorageError::NotFound(id))
    }

    async fn list_logs(&self, id: Uuid) -> Result<Vec<StepLogEntry>> {
        Ok(self
            .state
            .lock()
            .await
            .logs
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_incomplete(&self) -> Result<Vec<SagaInstance>> {
        let state = self.state.lock().await;
        let mut sagas: Vec<_> = state
            .sagas
            .values()
            .filter(|saga| !saga.is_terminal())
            .cloned()
            .collect();
        sagas.sort_by_key(|saga| saga.created_at);
        Ok(sagas)
    }

    async fn list(&self, filter: &SagaFilter, page: PageRequest) -> Result<SagaPage> {
        let state = self.state.lock().await;
        let mut matching: Vec<&SagaInstance> = state
            .sagas
            .values()
            .filter(|saga| filter.matches(saga))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.page_size as usize)
            .cloned()
            .collect();
        Ok(SagaPage::new(items, total, page))
    }
}
