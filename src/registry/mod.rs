//! Workflow registry - named workflow definitions shared by the engine.
//!
//! Read-mostly: lookups take a shared lock, registration takes the write lock.
//! Definitions are handed out as `Arc` snapshots, so re-registering a name
//! never changes the definition an in-flight saga is executing.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::model::{WorkflowDefinition, WorkflowError, WorkflowSummary};

pub mod loader;

pub use loader::{load_paths, parse_workflow};

/// Error types for registry and workflow source operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error(transparent)]
    Invalid(#[from] WorkflowError),

    #[error("Malformed workflow document: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

/// Thread-safe registry of workflow definitions by name.
#[derive(Default)]
pub struct WorkflowRegistry {
    workflows: RwLock<HashMap<String, Arc<WorkflowDefinition>>>,
}

impl WorkflowRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register a definition. Re-registration overwrites.
    pub async fn register(
        &self,
        definition: WorkflowDefinition,
    ) -> Result<Arc<WorkflowDefinition>, RegistryError> {
        definition.validate()?;

        let definition = Arc::new(definition);
        let replaced = self
            .workflows
            .write()
            .await
            .insert(definition.name.clone(), Arc::clone(&definition))
            .is_some();

        info!(
            workflow = %definition.name,
            steps = definition.step_count(),
            replaced,
            "Registered workflow"
        );
        Ok(definition)
    }

    /// Look up a definition by name.
    pub async fn get(&self, name: &str) -> Option<Arc<WorkflowDefinition>> {
        self.workflows.read().await.get(name).cloned()
    }

    /// Summaries of every registered workflow, sorted by name.
    pub async fn list(&self) -> Vec<WorkflowSummary> {
        let mut summaries: Vec<_> = self
            .workflows
            .read()
            .await
            .values()
            .map(|wf| wf.summary())
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        summaries
    }

    pub async fn len(&self) -> usize {
        self.workflows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.workflows.read().await.is_empty()
    }
}
