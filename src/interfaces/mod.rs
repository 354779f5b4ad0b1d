//! Abstract interfaces for sagaflow collaborators.
//!
//! These traits define the contracts for:
//! - Saga storage (durable state and step log)
//! - Step invocation (remote forward and compensating calls)
//! - Event notification (best-effort lifecycle events)

pub mod event_notifier;
pub mod saga_store;
pub mod step_invoker;

pub use event_notifier::{EventNotifier, NotifyError, SagaEvent, SagaEventType};
pub use saga_store::{PageRequest, SagaFilter, SagaPage, SagaStore, StorageError};
pub use step_invoker::{Caller, InvokeError, ServiceEndpointResolver, StepInvoker};
