//! Sagaflow - Saga Orchestration Engine
//!
//! Executes multi-step business transactions across remote services. Each
//! saga runs its workflow's steps in order with per-step retry and timeout;
//! when a step fails for good, already-completed steps are compensated in
//! reverse. Every transition is persisted so incomplete sagas resume after
//! a restart.

pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod interfaces;
pub mod invoker;
pub mod model;
pub mod notifier;
pub mod orchestrator;
pub mod recovery;
pub mod registry;
pub mod storage;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod utils;

pub use error::{OrchestratorError, Result};
pub use orchestrator::{Orchestrator, OrchestratorBuilder, StartSagaRequest};
