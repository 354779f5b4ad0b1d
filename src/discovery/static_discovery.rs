//! Static service endpoint resolution.
//!
//! Services are registered from configuration or `SAGAFLOW_STATIC_ENDPOINTS`:
//!
//! ```bash
//! SAGAFLOW_STATIC_ENDPOINTS="inventory-service=http://inventory:8080,payment-service=http://payments:9000"
//! ```
//!
//! One `HttpCaller` is created lazily per service and reused until the
//! service's address changes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::{Config, ServiceEndpoint};
use crate::interfaces::step_invoker::{Caller, InvokeError, ServiceEndpointResolver};
use crate::invoker::HttpCaller;

/// Resolver over a fixed `service -> base URL` table.
pub struct StaticEndpointResolver {
    client: Client,
    endpoints: RwLock<HashMap<String, String>>,
    callers: RwLock<HashMap<String, Arc<dyn Caller>>>,
}

impl StaticEndpointResolver {
    /// Create an empty resolver whose callers share `client`.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            endpoints: RwLock::new(HashMap::new()),
            callers: RwLock::new(HashMap::new()),
        }
    }

    /// Build from application configuration, including environment endpoints.
    pub async fn from_config(config: &Config) -> Result<Self, InvokeError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_millis(config.invoker.connect_timeout_ms))
            .build()?;

        let resolver = Self::new(client);
        for endpoint in config.resolved_endpoints() {
            resolver.register(endpoint).await;
        }
        Ok(resolver)
    }

    /// Update or add a service endpoint.
    pub async fn register(&self, endpoint: ServiceEndpoint) {
        let mut endpoints = self.endpoints.write().await;
        let changed = endpoints
            .get(&endpoint.name)
            .map_or(true, |address| *address != endpoint.address);

        if changed {
            info!(
                service = %endpoint.name,
                address = %endpoint.address,
                "Registering service endpoint"
            );
            // Drop a caller bound to the old address.
            self.callers.write().await.remove(&endpoint.name);
            endpoints.insert(endpoint.name, endpoint.address);
        }
    }

    /// Names of all registered services, sorted.
    pub async fn services(&self) -> Vec<String> {
        let mut names: Vec<_> = self.endpoints.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl ServiceEndpointResolver for StaticEndpointResolver {
    async fn resolve(&self, service: &str) -> Result<Arc<dyn Caller>, InvokeError> {
        if let Some(caller) = self.callers.read().await.get(service) {
            return Ok(Arc::clone(caller));
        }

        let address = self
            .endpoints
            .read()
            .await
            .get(service)
            .cloned()
            .ok_or_else(|| InvokeError::ServiceNotFound(service.to_string()))?;

        let mut callers = self.callers.write().await;
        let caller = callers
            .entry(service.to_string())
            .or_insert_with(|| {
                debug!(service, address = %address, "Creating HTTP caller");
                Arc::new(HttpCaller::new(self.client.clone(), service, address)) as Arc<dyn Caller>
            })
            .clone();
        Ok(caller)
    }
}
