//! HTTP webhook notifier.
//!
//! POSTs each lifecycle event as JSON to a configured endpoint, retrying
//! transient failures with exponential backoff.

use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::Client;
use tracing::{debug, warn};

use crate::config::WebhookConfig;
use crate::interfaces::event_notifier::{EventNotifier, NotifyError, Result, SagaEvent};

/// Posts events to a webhook endpoint.
pub struct WebhookNotifier {
    client: Client,
    endpoint: String,
    max_retries: usize,
    min_delay: Duration,
}

impl WebhookNotifier {
    /// Create a notifier from configuration.
    pub fn new(config: &WebhookConfig) -> Result<Self> {
        if config.endpoint.is_empty() {
            return Err(NotifyError::Unavailable(
                "webhook endpoint not configured".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            max_retries: config.max_retries,
            min_delay: Duration::from_millis(100),
        })
    }

    /// Override the first retry delay.
    pub fn with_min_delay(mut self, delay: Duration) -> Self {
        self.min_delay = delay;
        self
    }

    /// Backoff configuration for retries.
    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(Duration::from_secs(5))
            .with_max_times(self.max_retries)
            .with_jitter()
    }

    /// Determine if a failure is worth another attempt.
    fn is_retryable(err: &NotifyError) -> bool {
        match err {
            NotifyError::Http(e) => e.is_timeout() || e.is_connect(),
            NotifyError::Unavailable(_) => true,
            _ => false,
        }
    }

    async fn post(&self, event: &SagaEvent) -> Result<()> {
        let response = self.client.post(&self.endpoint).json(event).send().await?;
        let status = response.status();

        if status.is_success() {
            debug!(
                endpoint = %self.endpoint,
                saga_id = %event.saga_id,
                event_type = %event.event_type,
                "Saga event delivered"
            );
            return Ok(());
        }

        let body: String = response
            .text()
            .await
            .unwrap_or_default()
            .chars()
            .take(200)
            .collect();

        // 429 and 5xx are transient.
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            warn!(endpoint = %self.endpoint, %status, body = %body, "Webhook returned retryable status");
            Err(NotifyError::Unavailable(format!("HTTP {status} - {body}")))
        } else {
            Err(NotifyError::Rejected(format!("HTTP {status} - {body}")))
        }
    }
}

#[async_trait]
impl EventNotifier for WebhookNotifier {
    async fn publish(&self, event: SagaEvent) -> Result<()> {
        (|| async { self.post(&event).await })
            .retry(self.backoff())
            .when(Self::is_retryable)
            .await
    }

    fn name(&self) -> &str {
        "webhook"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::event_notifier::SagaEventType;
    use crate::model::SagaInstance;
    use serde_json::{json, Value};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer, max_retries: usize) -> WebhookConfig {
        WebhookConfig {
            endpoint: format!("{}/hooks", server.uri()),
            timeout_secs: 5,
            max_retries,
        }
    }

    fn event() -> SagaEvent {
        let saga = SagaInstance::new("order-fulfillment", json!({}), None, None);
        SagaEvent::for_saga(SagaEventType::Completed, &saga)
    }

    async fn received(server: &MockServer) -> Vec<wiremock::Request> {
        server.received_requests().await.unwrap_or_default()
    }

    #[test]
    fn test_missing_endpoint_rejected() {
        let err = WebhookNotifier::new(&WebhookConfig::default()).err().unwrap();
        assert!(matches!(err, NotifyError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_delivers_event_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hooks"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        let notifier = WebhookNotifier::new(&config(&server, 0)).unwrap();

        let event = event();
        notifier.publish(event.clone()).await.unwrap();

        let requests = received(&server).await;
        assert_eq!(requests.len(), 1);
        let body: Value = requests[0].body_json().unwrap();
        assert_eq!(body["event_type"], "COMPLETED");
        assert_eq!(body["saga_id"], event.saga_id.to_string());
    }

    #[tokio::test]
    async fn test_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hooks"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/hooks"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        let notifier = WebhookNotifier::new(&config(&server, 2))
            .unwrap()
            .with_min_delay(Duration::from_millis(1));

        notifier.publish(event()).await.unwrap();
        assert_eq!(received(&server).await.len(), 2);
    }

    #[tokio::test]
    async fn test_client_errors_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hooks"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad event"))
            .mount(&server)
            .await;
        let notifier = WebhookNotifier::new(&config(&server, 3))
            .unwrap()
            .with_min_delay(Duration::from_millis(1));

        let err = notifier.publish(event()).await.unwrap_err();
        assert!(matches!(err, NotifyError::Rejected(_)));
        assert_eq!(received(&server).await.len(), 1);
    }
}
