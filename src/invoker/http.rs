//! HTTP caller for one remote service.
//!
//! Each method is a JSON `POST` to `{base_url}/{method}`. The response body
//! is the step result; an empty body is treated as `null`.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::interfaces::step_invoker::{Caller, InvokeError};

/// Longest remote error body kept in an `InvokeError::Remote`.
const MAX_ERROR_BODY: usize = 200;

/// Calls methods on one service over HTTP.
pub struct HttpCaller {
    client: Client,
    service: String,
    base_url: String,
}

impl HttpCaller {
    /// Create a caller sharing `client`'s connection pool.
    pub fn new(client: Client, service: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            service: service.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// URL a method is posted to.
    pub fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method.trim_start_matches('/'))
    }
}

#[async_trait]
impl Caller for HttpCaller {
    async fn call(&self, method: &str, payload: &Value) -> Result<Value, InvokeError> {
        let url = self.method_url(method);
        debug!(service = %self.service, url = %url, "Calling remote method");

        let response = self.client.post(&url).json(payload).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(InvokeError::Remote {
                status: status.as_u16(),
                message: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }
}
