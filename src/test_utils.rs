//! Test utilities and mock implementations.
//!
//! This module provides scripted and failure-injecting implementations of
//! the collaborator traits for testing without remote services or a
//! durable store.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use uuid::Uuid;

use crate::interfaces::event_notifier::{
    EventNotifier, NotifyError, Result as NotifyResult, SagaEvent, SagaEventType,
};
use crate::interfaces::saga_store::{
    PageRequest, Result as StorageResult, SagaFilter, SagaPage, SagaStore, StorageError,
};
use crate::interfaces::step_invoker::{InvokeError, StepInvoker};
use crate::model::{SagaInstance, SagaStatus, StepLogEntry};

// ============================================================================
// Step invoker
// ============================================================================

/// Scripted reply to one invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedResponse {
    /// Return this value.
    Ok(Value),
    /// Fail with a remote error carrying this message.
    Fail(String),
    /// Wait out the call's deadline, then report a timeout.
    Timeout,
    /// Wait this long, then return the value.
    Delay(Duration, Value),
}

/// One recorded invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationRecord {
    pub service: String,
    pub method: String,
    pub payload: Value,
    pub deadline: Duration,
    pub at: Instant,
}

type MethodKey = (String, String);

/// Step invoker answering from per-method scripts.
///
/// One-shot replies queued with `push` are consumed first; after that the
/// method's `respond` default applies. Unscripted methods return `{}`.
#[derive(Default)]
pub struct ScriptedInvoker {
    queued: Mutex<HashMap<MethodKey, VecDeque<ScriptedResponse>>>,
    defaults: RwLock<HashMap<MethodKey, ScriptedResponse>>,
    calls: Mutex<Vec<InvocationRecord>>,
}

fn key(service: &str, method: &str) -> MethodKey {
    (service.to_string(), method.to_string())
}

impl ScriptedInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply to every call of `service.method` with `response`.
    pub async fn respond(&self, service: &str, method: &str, response: ScriptedResponse) {
        self.defaults
            .write()
            .await
            .insert(key(service, method), response);
    }

    /// Queue a one-shot reply for the next call of `service.method`.
    pub async fn push(&self, service: &str, method: &str, response: ScriptedResponse) {
        self.queued
            .lock()
            .await
            .entry(key(service, method))
            .or_default()
            .push_back(response);
    }

    /// All invocations so far, in call order.
    pub async fn calls(&self) -> Vec<InvocationRecord> {
        self.calls.lock().await.clone()
    }

    /// Invocations of one method, in call order.
    pub async fn calls_to(&self, service: &str, method: &str) -> Vec<InvocationRecord> {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|c| c.service == service && c.method == method)
            .cloned()
            .collect()
    }

    /// `service.method` strings in call order.
    pub async fn call_sequence(&self) -> Vec<String> {
        self.calls
            .lock()
            .await
            .iter()
            .map(|c| format!("{}.{}", c.service, c.method))
            .collect()
    }

    async fn next_response(&self, service: &str, method: &str) -> ScriptedResponse {
        let k = key(service, method);
        if let Some(response) = self
            .queued
            .lock()
            .await
            .get_mut(&k)
            .and_then(VecDeque::pop_front)
        {
            return response;
        }
        self.defaults
            .read()
            .await
            .get(&k)
            .cloned()
            .unwrap_or_else(|| ScriptedResponse::Ok(json!({})))
    }
}

#[async_trait]
impl StepInvoker for ScriptedInvoker {
    async fn invoke(
        &self,
        service: &str,
        method: &str,
        payload: &Value,
        deadline: Duration,
    ) -> Result<Value, InvokeError> {
        self.calls.lock().await.push(InvocationRecord {
            service: service.to_string(),
            method: method.to_string(),
            payload: payload.clone(),
            deadline,
            at: Instant::now(),
        });

        match self.next_response(service, method).await {
            ScriptedResponse::Ok(value) => Ok(value),
            ScriptedResponse::Fail(message) => Err(InvokeError::Remote {
                status: 500,
                message,
            }),
            ScriptedResponse::Timeout => {
                tokio::time::sleep(deadline).await;
                Err(InvokeError::Timeout(deadline))
            }
            ScriptedResponse::Delay(delay, value) => {
                if delay >= deadline {
                    tokio::time::sleep(deadline).await;
                    return Err(InvokeError::Timeout(deadline));
                }
                tokio::time::sleep(delay).await;
                Ok(value)
            }
        }
    }
}

// ============================================================================
// Event notifier
// ============================================================================

/// Notifier that records every event, optionally failing each publish.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<SagaEvent>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every publish fail (events are still recorded).
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub async fn events(&self) -> Vec<SagaEvent> {
        self.events.lock().await.clone()
    }

    /// Event types published for one saga.
    pub async fn event_types(&self, saga_id: Uuid) -> Vec<SagaEventType> {
        self.events
            .lock()
            .await
            .iter()
            .filter(|e| e.saga_id == saga_id)
            .map(|e| e.event_type)
            .collect()
    }

    /// Wait until an event of `event_type` for `saga_id` has been published.
    pub async fn wait_for(&self, saga_id: Uuid, event_type: SagaEventType, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.event_types(saga_id).await.contains(&event_type) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl EventNotifier for RecordingNotifier {
    async fn publish(&self, event: SagaEvent) -> NotifyResult<()> {
        self.events.lock().await.push(event);
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::Unavailable("recording notifier set to fail".into()));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

// ============================================================================
// Saga store
// ============================================================================

/// Store wrapper that starts failing transitions after a budget is spent.
///
/// Simulates a crash between steps: the wrapped store keeps exactly what
/// was committed before the failure.
pub struct FlakyStore {
    inner: Arc<dyn SagaStore>,
    remaining: Mutex<Option<usize>>,
}

impl FlakyStore {
    pub fn new(inner: Arc<dyn SagaStore>) -> Self {
        Self {
            inner,
            remaining: Mutex::new(None),
        }
    }

    /// Allow `count` more transitions, then fail every later one.
    pub async fn fail_transitions_after(&self, count: usize) {
        *self.remaining.lock().await = Some(count);
    }

    /// Stop injecting failures.
    pub async fn heal(&self) {
        *self.remaining.lock().await = None;
    }

    pub fn inner(&self) -> &Arc<dyn SagaStore> {
        &self.inner
    }
}

#[async_trait]
impl SagaStore for FlakyStore {
    async fn create(&self, saga: &SagaInstance) -> StorageResult<()> {
        self.inner.create(saga).await
    }

    async fn apply_transition(
        &self,
        saga: &SagaInstance,
        entry: Option<&StepLogEntry>,
    ) -> StorageResult<()> {
        {
            let mut remaining = self.remaining.lock().await;
            match remaining.as_mut() {
                Some(0) => {
                    return Err(StorageError::Unavailable("injected store failure".into()));
                }
                Some(count) => *count -= 1,
                None => {}
            }
        }
        self.inner.apply_transition(saga, entry).await
    }

    async fn request_cancellation(&self, id: Uuid) -> StorageResult<SagaInstance> {
        self.inner.request_cancellation(id).await
    }

    async fn get(&self, id: Uuid) -> StorageResult<SagaInstance> {
        self.inner.get(id).await
    }

    async fn list_logs(&self, id: Uuid) -> StorageResult<Vec<StepLogEntry>> {
        self.inner.list_logs(id).await
    }

    async fn list_incomplete(&self) -> StorageResult<Vec<SagaInstance>> {
        self.inner.list_incomplete().await
    }

    async fn list(&self, filter: &SagaFilter, page: PageRequest) -> StorageResult<SagaPage> {
        self.inner.list(filter, page).await
    }
}

/// Poll `store` until saga `id` reaches a terminal status.
pub async fn wait_for_terminal(
    store: &dyn SagaStore,
    id: Uuid,
    timeout: Duration,
) -> Option<SagaInstance> {
    wait_for_status(store, id, SagaStatus::is_terminal, timeout).await
}

/// Poll `store` until saga `id` has a status accepted by `accept`.
pub async fn wait_for_status(
    store: &dyn SagaStore,
    id: Uuid,
    accept: impl Fn(SagaStatus) -> bool,
    timeout: Duration,
) -> Option<SagaInstance> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Ok(saga) = store.get(id).await {
            if accept(saga.status) {
                return Some(saga);
            }
        }
        if Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
