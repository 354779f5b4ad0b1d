//! Orchestrator façade tests.
//!
//! Run with: cargo test --test orchestrator

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use uuid::Uuid;

use sagaflow::config::Config;
use sagaflow::interfaces::{PageRequest, SagaFilter, SagaStore};
use sagaflow::model::{SagaInstance, SagaStatus, StepAction};
use sagaflow::orchestrator::{Orchestrator, RegisteredWorkflow, StartSagaRequest, MAX_PAGE_SIZE};
use sagaflow::test_utils::{
    wait_for_terminal, RecordingNotifier, ScriptedInvoker, ScriptedResponse,
};
use sagaflow::OrchestratorError;

const ORDER_WORKFLOW: &str = r#"
name: order-fulfillment
description: Reserve, charge, ship
steps:
  - name: reserve-inventory
    service: inventory
    method: reserve
    compensate: release
  - name: process-payment
    service: payments
    method: charge
    compensate: refund
    retry: { max_attempts: 3, initial_backoff_ms: 10000 }
  - name: arrange-shipping
    service: shipping
    method: schedule
"#;

async fn orchestrator() -> (Orchestrator, Arc<ScriptedInvoker>) {
    let invoker = Arc::new(ScriptedInvoker::new());
    let orchestrator = Orchestrator::builder(Config::for_test())
        .with_invoker(invoker.clone())
        .with_notifier(Arc::new(RecordingNotifier::new()))
        .build()
        .await
        .unwrap();
    orchestrator.register_workflow(ORDER_WORKFLOW).await.unwrap();
    (orchestrator, invoker)
}

async fn wait_done(orchestrator: &Orchestrator, id: Uuid) -> SagaInstance {
    wait_for_terminal(orchestrator.store().as_ref(), id, Duration::from_secs(60))
        .await
        .expect("saga should reach a terminal status")
}

#[tokio::test]
async fn test_start_saga_runs_to_completion() {
    let (orchestrator, invoker) = orchestrator().await;

    let started = orchestrator
        .start_saga(
            StartSagaRequest::new("order-fulfillment", json!({"order_id": 1}))
                .with_correlation_id("order-1")
                .with_initiated_by("checkout"),
        )
        .await
        .unwrap();
    assert_eq!(started.status, SagaStatus::Started);

    let saga = wait_done(&orchestrator, started.saga_id).await;
    assert_eq!(saga.status, SagaStatus::Completed);

    let detail = orchestrator.get_saga(started.saga_id).await.unwrap();
    assert_eq!(detail.saga.correlation_id.as_deref(), Some("order-1"));
    assert_eq!(detail.saga.initiated_by.as_deref(), Some("checkout"));
    assert_eq!(detail.logs.len(), 3);
    assert!(detail.logs.iter().all(|e| e.action == StepAction::Execute));
    assert_eq!(invoker.calls().await.len(), 3);
}

#[tokio::test]
async fn test_start_saga_validation() {
    let (orchestrator, invoker) = orchestrator().await;

    let err = orchestrator
        .start_saga(StartSagaRequest::new("  ", json!({})))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::Validation(_)));

    let err = orchestrator
        .start_saga(StartSagaRequest::new("no-such-workflow", json!({})))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::Validation(_)));

    // Nothing was persisted or executed.
    let page = orchestrator
        .list_sagas(SagaFilter::default(), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(page.total, 0);
    assert!(invoker.calls().await.is_empty());
}

#[tokio::test]
async fn test_get_unknown_saga() {
    let (orchestrator, _) = orchestrator().await;
    let err = orchestrator.get_saga(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::NotFound(_)));
}

#[tokio::test]
async fn test_list_sagas_filters_and_validates_paging() {
    let (orchestrator, _) = orchestrator().await;
    orchestrator
        .register_workflow(
            "name: ping\nsteps:\n  - { name: ping, service: health, method: ping }\n",
        )
        .await
        .unwrap();

    let mut ids = Vec::new();
    for n in 0..3 {
        let started = orchestrator
            .start_saga(StartSagaRequest::new("ping", json!({"n": n})))
            .await
            .unwrap();
        ids.push(started.saga_id);
    }
    for id in &ids {
        wait_done(&orchestrator, *id).await;
    }

    let page = orchestrator
        .list_sagas(
            SagaFilter {
                workflow_name: Some("ping".to_string()),
                status: Some(SagaStatus::Completed),
                ..Default::default()
            },
            PageRequest::new(1, 2),
        )
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 2);
    assert!(page.has_next);

    let none = orchestrator
        .list_sagas(
            SagaFilter {
                workflow_name: Some("order-fulfillment".to_string()),
                ..Default::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(none.total, 0);

    for page in [PageRequest::new(0, 10), PageRequest::new(1, 0), PageRequest::new(1, MAX_PAGE_SIZE + 1)] {
        let err = orchestrator
            .list_sagas(SagaFilter::default(), page)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Validation(_)), "{page:?}");
    }
}

#[tokio::test(start_paused = true)]
async fn test_cancel_running_saga() {
    let (orchestrator, invoker) = orchestrator().await;
    invoker
        .push("payments", "charge", ScriptedResponse::Fail("gateway busy".into()))
        .await;

    let started = orchestrator
        .start_saga(StartSagaRequest::new("order-fulfillment", json!({})))
        .await
        .unwrap();
    for _ in 0..1000 {
        if !invoker.calls_to("payments", "charge").await.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let flagged = orchestrator.cancel_saga(started.saga_id).await.unwrap();
    assert!(flagged.cancel_requested);
    assert!(!flagged.is_terminal());

    let saga = wait_done(&orchestrator, started.saga_id).await;
    assert_eq!(saga.status, SagaStatus::Cancelled);
    assert_eq!(saga.current_step_index, 1);

    let detail = orchestrator.get_saga(started.saga_id).await.unwrap();
    assert!(detail
        .logs
        .iter()
        .all(|e| e.action == StepAction::Execute));
    assert!(invoker.calls_to("inventory", "release").await.is_empty());
}

#[tokio::test]
async fn test_cancel_saga_without_live_execution() {
    let (orchestrator, invoker) = orchestrator().await;

    // Persisted by a previous process; nothing is driving it here.
    let saga = SagaInstance::new("order-fulfillment", json!({}), None, None);
    orchestrator.store().create(&saga).await.unwrap();

    orchestrator.cancel_saga(saga.id).await.unwrap();

    let done = wait_done(&orchestrator, saga.id).await;
    assert_eq!(done.status, SagaStatus::Cancelled);
    assert!(invoker.calls().await.is_empty());
}

#[tokio::test]
async fn test_cancel_errors() {
    let (orchestrator, _) = orchestrator().await;

    let err = orchestrator.cancel_saga(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::NotFound(_)));

    let started = orchestrator
        .start_saga(StartSagaRequest::new("order-fulfillment", json!({})))
        .await
        .unwrap();
    let saga = wait_done(&orchestrator, started.saga_id).await;
    assert_eq!(saga.status, SagaStatus::Completed);

    let err = orchestrator.cancel_saga(saga.id).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::Conflict(_)));
}

#[tokio::test]
async fn test_register_and_list_workflows() {
    let (orchestrator, _) = orchestrator().await;

    let registered = orchestrator
        .register_workflow(
            r#"
name: account-opening
steps:
  - { name: kyc, service: compliance, method: check }
  - { name: open, service: ledger, method: open, compensate: close }
"#,
        )
        .await
        .unwrap();
    assert_eq!(
        registered,
        RegisteredWorkflow {
            name: "account-opening".to_string(),
            step_count: 2,
        }
    );

    let workflows = orchestrator.list_workflows().await;
    let names: Vec<_> = workflows.iter().map(|w| w.name.as_str()).collect();
    assert_eq!(names, vec!["account-opening", "order-fulfillment"]);
    assert_eq!(
        workflows[1].step_names,
        vec!["reserve-inventory", "process-payment", "arrange-shipping"]
    );
}

#[tokio::test]
async fn test_register_workflow_rejects_bad_documents() {
    let (orchestrator, _) = orchestrator().await;

    for source in [
        "name: empty\nsteps: []\n",
        "name: ''\nsteps:\n  - { name: a, service: s, method: m }\n",
        "name: zero\nsteps:\n  - { name: a, service: s, method: m, retry: { max_attempts: 0 } }\n",
        "name: typo\nsteps:\n  - { name: a, service: s, metod: m }\n",
        "not: [valid",
    ] {
        let err = orchestrator.register_workflow(source).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Validation(_)), "{source}: {err}");
    }
    assert_eq!(orchestrator.list_workflows().await.len(), 1);
}

#[tokio::test]
async fn test_build_loads_configured_workflow_paths() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("order.yaml"), ORDER_WORKFLOW).unwrap();
    std::fs::write(dir.path().join("broken.yml"), "name: broken\nsteps: []\n").unwrap();
    std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let mut config = Config::for_test();
    config.workflows.paths = vec![dir.path().display().to_string()];

    let orchestrator = Orchestrator::builder(config)
        .with_invoker(Arc::new(ScriptedInvoker::new()))
        .build()
        .await
        .unwrap();

    let names: Vec<_> = orchestrator
        .list_workflows()
        .await
        .into_iter()
        .map(|w| w.name)
        .collect();
    assert_eq!(names, vec!["order-fulfillment"]);
}
