//! Orchestrator façade for in-process library usage.
//!
//! The single entry point for starting, inspecting, listing and cancelling
//! sagas and for registering workflows. Any RPC or HTTP binding sits on top
//! of this type.
//!
//! # Example
//!
//! ```ignore
//! use sagaflow::config::Config;
//! use sagaflow::orchestrator::{Orchestrator, StartSagaRequest};
//!
//! let orchestrator = Orchestrator::builder(Config::load(None)?)
//!     .build()
//!     .await?;
//!
//! orchestrator.register_workflow(include_str!("order.yaml")).await?;
//! let started = orchestrator
//!     .start_saga(StartSagaRequest::new("order-fulfillment", json!({"order_id": 7})))
//!     .await?;
//! let detail = orchestrator.get_saga(started.saga_id).await?;
//! ```

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::discovery::StaticEndpointResolver;
use crate::engine::ExecutionEngine;
use crate::error::{OrchestratorError, Result};
use crate::interfaces::{EventNotifier, PageRequest, SagaFilter, SagaPage, SagaStore, StepInvoker};
use crate::invoker::ResolvingInvoker;
use crate::model::{SagaInstance, SagaStatus, StepLogEntry, WorkflowDefinition, WorkflowSummary};
use crate::notifier::init_notifier;
use crate::recovery::{RecoveryReport, RecoverySweep};
use crate::registry::{load_paths, parse_workflow, WorkflowRegistry};
use crate::storage::init_storage;

/// Largest accepted page size for saga listings.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Request to start a saga.
#[derive(Debug, Clone, PartialEq)]
pub struct StartSagaRequest {
    pub workflow_name: String,
    pub payload: Value,
    pub correlation_id: Option<String>,
    pub initiated_by: Option<String>,
}

impl StartSagaRequest {
    pub fn new(workflow_name: impl Into<String>, payload: Value) -> Self {
        Self {
            workflow_name: workflow_name.into(),
            payload,
            correlation_id: None,
            initiated_by: None,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_initiated_by(mut self, initiated_by: impl Into<String>) -> Self {
        self.initiated_by = Some(initiated_by.into());
        self
    }
}

/// Result of `start_saga`. Execution continues asynchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StartedSaga {
    pub saga_id: Uuid,
    pub status: SagaStatus,
}

/// A saga together with its step log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SagaDetail {
    pub saga: SagaInstance,
    pub logs: Vec<StepLogEntry>,
}

/// Result of workflow registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisteredWorkflow {
    pub name: String,
    pub step_count: usize,
}

/// Builder for an `Orchestrator`.
///
/// Collaborators not supplied explicitly are created from configuration.
pub struct OrchestratorBuilder {
    config: Config,
    store: Option<Arc<dyn SagaStore>>,
    invoker: Option<Arc<dyn StepInvoker>>,
    notifier: Option<Arc<dyn EventNotifier>>,
    registry: Option<Arc<WorkflowRegistry>>,
}

impl OrchestratorBuilder {
    /// Create a new builder with given config.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            store: None,
            invoker: None,
            notifier: None,
            registry: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn SagaStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_invoker(mut self, invoker: Arc<dyn StepInvoker>) -> Self {
        self.invoker = Some(invoker);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn EventNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_registry(mut self, registry: Arc<WorkflowRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Build the orchestrator and load configured workflow files.
    pub async fn build(self) -> Result<Orchestrator> {
        let store = match self.store {
            Some(store) => store,
            None => init_storage(&self.config.storage)
                .await
                .map_err(|e| OrchestratorError::Internal(format!("storage init failed: {e}")))?,
        };

        let invoker = match self.invoker {
            Some(invoker) => invoker,
            None => {
                let resolver = StaticEndpointResolver::from_config(&self.config)
                    .await
                    .map_err(|e| OrchestratorError::Internal(format!("invoker init failed: {e}")))?;
                Arc::new(ResolvingInvoker::new(Arc::new(resolver)))
            }
        };

        let notifier = match self.notifier {
            Some(notifier) => notifier,
            None => init_notifier(&self.config.notifier)
                .map_err(|e| OrchestratorError::Internal(format!("notifier init failed: {e}")))?,
        };

        let registry = self.registry.unwrap_or_default();
        for definition in load_paths(self.config.workflows.paths.as_slice()) {
            let name = definition.name.clone();
            if let Err(e) = registry.register(definition).await {
                warn!(workflow = %name, error = %e, "Skipping workflow");
            }
        }

        let engine = Arc::new(ExecutionEngine::new(Arc::clone(&store), invoker, notifier));

        Ok(Orchestrator {
            registry,
            store,
            engine,
        })
    }
}

/// Saga orchestrator.
pub struct Orchestrator {
    registry: Arc<WorkflowRegistry>,
    store: Arc<dyn SagaStore>,
    engine: Arc<ExecutionEngine>,
}

impl Orchestrator {
    /// Create a new builder with given config.
    pub fn builder(config: Config) -> OrchestratorBuilder {
        OrchestratorBuilder::new(config)
    }

    /// Persist a new saga and start executing it in the background.
    pub async fn start_saga(&self, request: StartSagaRequest) -> Result<StartedSaga> {
        if request.workflow_name.trim().is_empty() {
            return Err(OrchestratorError::Validation(
                "workflow name must not be empty".to_string(),
            ));
        }
        let workflow = self
            .registry
            .get(&request.workflow_name)
            .await
            .ok_or_else(|| {
                OrchestratorError::Validation(format!(
                    "unknown workflow '{}'",
                    request.workflow_name
                ))
            })?;

        let saga = SagaInstance::new(
            request.workflow_name,
            request.payload,
            request.correlation_id,
            request.initiated_by,
        );
        self.store.create(&saga).await?;

        info!(
            saga_id = %saga.id,
            workflow = %saga.workflow_name,
            correlation_id = saga.correlation_id.as_deref().unwrap_or(""),
            "Saga started"
        );
        self.engine.spawn(saga.id, workflow);

        Ok(StartedSaga {
            saga_id: saga.id,
            status: saga.status,
        })
    }

    /// Saga state and its step log in append order.
    pub async fn get_saga(&self, id: Uuid) -> Result<SagaDetail> {
        let saga = self.store.get(id).await?;
        let logs = self.store.list_logs(id).await?;
        Ok(SagaDetail { saga, logs })
    }

    /// Filtered, paginated listing, newest first.
    pub async fn list_sagas(&self, filter: SagaFilter, page: PageRequest) -> Result<SagaPage> {
        if page.page == 0 {
            return Err(OrchestratorError::Validation(
                "page must be at least 1".to_string(),
            ));
        }
        if page.page_size == 0 || page.page_size > MAX_PAGE_SIZE {
            return Err(OrchestratorError::Validation(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        Ok(self.store.list(&filter, page).await?)
    }

    /// Request cancellation of a non-terminal saga.
    ///
    /// The flag is persisted first, then the live execution is woken. When no
    /// execution is attached in this process, one is started so the pending
    /// cancellation is honored at its first check point.
    pub async fn cancel_saga(&self, id: Uuid) -> Result<SagaInstance> {
        let saga = self.store.get(id).await?;
        if saga.is_terminal() {
            return Err(OrchestratorError::terminal(id, saga.status));
        }

        let saga = self.store.request_cancellation(id).await?;
        info!(saga_id = %id, status = %saga.status, "Saga cancellation requested");

        if !self.engine.active().signal_cancel(id) {
            match self.registry.get(&saga.workflow_name).await {
                Some(workflow) => {
                    self.engine.spawn(id, workflow);
                }
                None => warn!(
                    saga_id = %id,
                    workflow = %saga.workflow_name,
                    "Cancellation recorded but workflow is not registered; it applies on recovery"
                ),
            }
        }
        Ok(saga)
    }

    /// Parse, validate and register a YAML workflow document.
    pub async fn register_workflow(&self, source: &str) -> Result<RegisteredWorkflow> {
        let definition = parse_workflow(source)?;
        self.register_definition(definition).await
    }

    /// Validate and register a workflow built in code.
    pub async fn register_definition(
        &self,
        definition: WorkflowDefinition,
    ) -> Result<RegisteredWorkflow> {
        let registered = self.registry.register(definition).await?;
        Ok(RegisteredWorkflow {
            name: registered.name.clone(),
            step_count: registered.step_count(),
        })
    }

    pub async fn list_workflows(&self) -> Vec<WorkflowSummary> {
        self.registry.list().await
    }

    /// Resume every incomplete saga in the store.
    pub async fn recover(&self) -> Result<RecoveryReport> {
        let sweep = RecoverySweep::new(
            Arc::clone(&self.store),
            Arc::clone(&self.registry),
            Arc::clone(&self.engine),
        );
        Ok(sweep.run().await?)
    }

    pub fn registry(&self) -> &Arc<WorkflowRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn SagaStore> {
        &self.store
    }

    pub fn engine(&self) -> &Arc<ExecutionEngine> {
        &self.engine
    }
}
