//! Remote step invocation interfaces.
//!
//! `StepInvoker` is what the engine calls. The resolving implementation
//! splits it into two capabilities: a `ServiceEndpointResolver` that turns a
//! service name into a `Caller`, and the `Caller` that performs one method
//! call against that service.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

/// Errors from a single remote call.
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error("Call did not complete within {0:?}")]
    Timeout(Duration),

    #[error("No endpoint registered for service '{0}'")]
    ServiceNotFound(String),

    #[error("Remote failure ({status}): {message}")]
    Remote { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Response decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl InvokeError {
    /// Whether the failure was the deadline elapsing.
    pub fn is_timeout(&self) -> bool {
        match self {
            InvokeError::Timeout(_) => true,
            InvokeError::Http(err) => err.is_timeout(),
            _ => false,
        }
    }
}

/// Performs one remote call, forward or compensating.
#[async_trait]
pub trait StepInvoker: Send + Sync {
    /// Invoke `method` on `service` with `payload`, giving up after `deadline`.
    async fn invoke(
        &self,
        service: &str,
        method: &str,
        payload: &Value,
        deadline: Duration,
    ) -> Result<Value, InvokeError>;
}

/// Calls methods on one resolved service.
#[async_trait]
pub trait Caller: Send + Sync {
    async fn call(&self, method: &str, payload: &Value) -> Result<Value, InvokeError>;
}

/// Resolves a service name to a callable endpoint.
#[async_trait]
pub trait ServiceEndpointResolver: Send + Sync {
    async fn resolve(&self, service: &str) -> Result<Arc<dyn Caller>, InvokeError>;
}
