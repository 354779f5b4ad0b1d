//! Step invoker that resolves services by name and calls them under a deadline.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::interfaces::step_invoker::{InvokeError, ServiceEndpointResolver, StepInvoker};

/// `StepInvoker` over a `ServiceEndpointResolver`.
///
/// The deadline covers resolution and the call. Once it elapses the call is
/// abandoned and reported as `Timeout`, whatever the remote side does later.
pub struct ResolvingInvoker {
    resolver: Arc<dyn ServiceEndpointResolver>,
}

impl ResolvingInvoker {
    pub fn new(resolver: Arc<dyn ServiceEndpointResolver>) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl StepInvoker for ResolvingInvoker {
    async fn invoke(
        &self,
        service: &str,
        method: &str,
        payload: &Value,
        deadline: Duration,
    ) -> Result<Value, InvokeError> {
        let call = async {
            let caller = self.resolver.resolve(service).await?;
            caller.call(method, payload).await
        };

        match tokio::time::timeout(deadline, call).await {
            Ok(result) => result,
            Err(_) => {
                debug!(service, method, ?deadline, "Remote call exceeded deadline");
                Err(InvokeError::Timeout(deadline))
            }
        }
    }
}
