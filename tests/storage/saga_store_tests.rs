//! SagaStore interface tests.
//!
//! These tests verify the contract of the SagaStore trait.
//! Each storage implementation should run these tests.

use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use sagaflow::interfaces::{PageRequest, SagaFilter, SagaStore, StorageError};
use sagaflow::model::{SagaInstance, SagaStatus, StepAction, StepLogEntry, StepOutcome};

/// Create a saga for `workflow` with a unique correlation id.
pub fn make_saga(workflow: &str) -> SagaInstance {
    SagaInstance::new(
        workflow,
        json!({"order_id": 42}),
        Some(format!("corr-{}", Uuid::new_v4())),
        Some("tests".to_string()),
    )
}

/// Execute-success log entry for `step_index`.
pub fn make_entry(saga: &SagaInstance, step_index: usize, name: &str) -> StepLogEntry {
    StepLogEntry::begin(
        saga.id,
        step_index,
        name,
        StepAction::Execute,
        Some(saga.payload.clone()),
    )
    .succeeded(json!({ "step": name }))
}

fn running(saga: &SagaInstance) -> SagaInstance {
    saga.transitioned(SagaStatus::Running)
        .expect("Started -> Running is legal")
}

// =============================================================================
// SagaStore::create / get tests
// =============================================================================

pub async fn test_create_and_get<S: SagaStore>(store: &S) {
    let saga = make_saga("test_create");
    store.create(&saga).await.expect("create should succeed");

    let stored = store.get(saga.id).await.expect("get should succeed");
    assert_eq!(stored.id, saga.id);
    assert_eq!(stored.workflow_name, "test_create");
    assert_eq!(stored.status, SagaStatus::Started);
    assert_eq!(stored.current_step_index, 0);
    assert_eq!(stored.payload, json!({"order_id": 42}));
    assert_eq!(stored.correlation_id, saga.correlation_id);
    assert_eq!(stored.initiated_by.as_deref(), Some("tests"));
    assert!(stored.error_message.is_none());
    assert!(!stored.cancel_requested);
    assert_eq!(stored.created_at, saga.created_at);
}

pub async fn test_create_duplicate<S: SagaStore>(store: &S) {
    let saga = make_saga("test_duplicate");
    store.create(&saga).await.expect("create should succeed");

    let err = store.create(&saga).await.unwrap_err();
    assert!(
        matches!(err, StorageError::AlreadyExists(id) if id == saga.id),
        "duplicate create should be AlreadyExists, got {err}"
    );
}

pub async fn test_get_nonexistent<S: SagaStore>(store: &S) {
    let id = Uuid::new_v4();
    let err = store.get(id).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound(missing) if missing == id));
}

// =============================================================================
// SagaStore::apply_transition tests
// =============================================================================

pub async fn test_transition_with_entry<S: SagaStore>(store: &S) {
    let saga = make_saga("test_transition_entry");
    store.create(&saga).await.expect("create should succeed");

    let mut next = running(&saga);
    next.current_step_index = 1;
    next.payload = json!({"order_id": 42, "reservation": "r-1"});
    let entry = make_entry(&saga, 0, "reserve");

    store
        .apply_transition(&next, Some(&entry))
        .await
        .expect("transition should succeed");

    let stored = store.get(saga.id).await.unwrap();
    assert_eq!(stored.status, SagaStatus::Running);
    assert_eq!(stored.current_step_index, 1);
    assert_eq!(stored.payload["reservation"], "r-1");

    let logs = store.list_logs(saga.id).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].id, entry.id);
    assert_eq!(logs[0].step_name, "reserve");
    assert_eq!(logs[0].action, StepAction::Execute);
    assert_eq!(logs[0].outcome, StepOutcome::Success);
    assert_eq!(logs[0].response_payload, Some(json!({"step": "reserve"})));
}

pub async fn test_transition_without_entry<S: SagaStore>(store: &S) {
    let saga = make_saga("test_transition_bare");
    store.create(&saga).await.expect("create should succeed");

    store
        .apply_transition(&running(&saga), None)
        .await
        .expect("transition should succeed");

    assert_eq!(store.get(saga.id).await.unwrap().status, SagaStatus::Running);
    assert!(store.list_logs(saga.id).await.unwrap().is_empty());
}

pub async fn test_transition_nonexistent<S: SagaStore>(store: &S) {
    let saga = make_saga("test_transition_missing");
    let err = store
        .apply_transition(&running(&saga), None)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)));
}

pub async fn test_terminal_rejects_transition<S: SagaStore>(store: &S) {
    let saga = make_saga("test_terminal");
    store.create(&saga).await.expect("create should succeed");

    let mut completed = running(&saga)
        .transitioned(SagaStatus::Completed)
        .unwrap();
    completed.current_step_index = 2;
    store.apply_transition(&running(&saga), None).await.unwrap();
    store.apply_transition(&completed, None).await.unwrap();

    // A stale writer tries to keep going.
    let mut stale = running(&saga);
    stale.current_step_index = 3;
    let entry = make_entry(&saga, 2, "late");
    let err = store
        .apply_transition(&stale, Some(&entry))
        .await
        .unwrap_err();
    assert!(
        matches!(err, StorageError::TerminalState { status: SagaStatus::Completed, .. }),
        "terminal saga should reject writes, got {err}"
    );

    let stored = store.get(saga.id).await.unwrap();
    assert_eq!(stored.status, SagaStatus::Completed);
    assert_eq!(stored.current_step_index, 2);
    assert!(
        store.list_logs(saga.id).await.unwrap().is_empty(),
        "rejected entry must not be appended"
    );
}

// =============================================================================
// SagaStore::request_cancellation tests
// =============================================================================

pub async fn test_cancellation_flag_is_sticky<S: SagaStore>(store: &S) {
    let saga = make_saga("test_cancel_sticky");
    store.create(&saga).await.expect("create should succeed");

    let flagged = store
        .request_cancellation(saga.id)
        .await
        .expect("request_cancellation should succeed");
    assert!(flagged.cancel_requested);
    assert_eq!(flagged.status, SagaStatus::Started);

    // Writer holding a copy from before the request.
    assert!(!saga.cancel_requested);
    store.apply_transition(&running(&saga), None).await.unwrap();

    let stored = store.get(saga.id).await.unwrap();
    assert_eq!(stored.status, SagaStatus::Running);
    assert!(stored.cancel_requested, "flag must survive later transitions");
}

pub async fn test_cancellation_on_terminal<S: SagaStore>(store: &S) {
    let saga = make_saga("test_cancel_terminal");
    store.create(&saga).await.expect("create should succeed");
    let cancelled = saga.transitioned(SagaStatus::Cancelled).unwrap();
    store.apply_transition(&cancelled, None).await.unwrap();

    let err = store.request_cancellation(saga.id).await.unwrap_err();
    assert!(matches!(
        err,
        StorageError::TerminalState {
            status: SagaStatus::Cancelled,
            ..
        }
    ));
}

pub async fn test_cancellation_nonexistent<S: SagaStore>(store: &S) {
    let err = store.request_cancellation(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)));
}

// =============================================================================
// SagaStore::list_logs tests
// =============================================================================

pub async fn test_logs_in_append_order<S: SagaStore>(store: &S) {
    let saga = make_saga("test_log_order");
    store.create(&saga).await.expect("create should succeed");

    let mut current = running(&saga);
    let names = ["reserve", "charge", "ship"];
    for (index, name) in names.iter().enumerate() {
        current.current_step_index = index + 1;
        store
            .apply_transition(&current, Some(&make_entry(&saga, index, name)))
            .await
            .unwrap();
    }

    let mut compensating = current.transitioned(SagaStatus::Compensating).unwrap();
    compensating.current_step_index = 2;
    let undo = StepLogEntry::begin(saga.id, 2, "ship", StepAction::Compensate, None).skipped();
    store
        .apply_transition(&compensating, Some(&undo))
        .await
        .unwrap();

    let logs = store.list_logs(saga.id).await.unwrap();
    let order: Vec<_> = logs
        .iter()
        .map(|entry| (entry.step_name.as_str(), entry.action))
        .collect();
    assert_eq!(
        order,
        vec![
            ("reserve", StepAction::Execute),
            ("charge", StepAction::Execute),
            ("ship", StepAction::Execute),
            ("ship", StepAction::Compensate),
        ]
    );
    assert_eq!(logs[3].outcome, StepOutcome::Skipped);
}

pub async fn test_logs_unknown_saga_empty<S: SagaStore>(store: &S) {
    let logs = store.list_logs(Uuid::new_v4()).await.unwrap();
    assert!(logs.is_empty());
}

// =============================================================================
// SagaStore::list_incomplete tests
// =============================================================================

pub async fn test_list_incomplete<S: SagaStore>(store: &S) {
    let started = make_saga("test_incomplete");
    let running_saga = make_saga("test_incomplete");
    let compensating = make_saga("test_incomplete");
    let completed = make_saga("test_incomplete");
    let failed = make_saga("test_incomplete");
    for saga in [&started, &running_saga, &compensating, &completed, &failed] {
        store.create(saga).await.unwrap();
    }

    store
        .apply_transition(&running(&running_saga), None)
        .await
        .unwrap();

    let comp = running(&compensating)
        .transitioned(SagaStatus::Compensating)
        .unwrap();
    store.apply_transition(&comp, None).await.unwrap();

    let done = running(&completed)
        .transitioned(SagaStatus::Completed)
        .unwrap();
    store.apply_transition(&done, None).await.unwrap();

    let dead = running(&failed)
        .transitioned(SagaStatus::Compensating)
        .and_then(|s| s.transitioned(SagaStatus::Failed))
        .unwrap();
    store.apply_transition(&dead, None).await.unwrap();

    let incomplete: Vec<Uuid> = store
        .list_incomplete()
        .await
        .unwrap()
        .into_iter()
        .filter(|saga| saga.workflow_name == "test_incomplete")
        .map(|saga| saga.id)
        .collect();

    assert_eq!(incomplete.len(), 3);
    assert!(incomplete.contains(&started.id));
    assert!(incomplete.contains(&running_saga.id));
    assert!(incomplete.contains(&compensating.id));
}

// =============================================================================
// SagaStore::list tests
// =============================================================================

pub async fn test_list_newest_first_paginated<S: SagaStore>(store: &S) {
    let base = Utc::now() - Duration::hours(1);
    let mut ids = Vec::new();
    for minute in 0..5 {
        let mut saga = make_saga("test_list_pages");
        saga.created_at = base + Duration::minutes(minute);
        saga.updated_at = saga.created_at;
        store.create(&saga).await.unwrap();
        ids.push(saga.id);
    }
    ids.reverse();

    let filter = SagaFilter {
        workflow_name: Some("test_list_pages".to_string()),
        ..Default::default()
    };

    let first = store.list(&filter, PageRequest::new(1, 2)).await.unwrap();
    assert_eq!(first.total, 5);
    assert!(first.has_next);
    let first_ids: Vec<_> = first.items.iter().map(|s| s.id).collect();
    assert_eq!(first_ids, ids[0..2].to_vec());

    let last = store.list(&filter, PageRequest::new(3, 2)).await.unwrap();
    assert_eq!(last.total, 5);
    assert!(!last.has_next);
    assert_eq!(last.items.len(), 1);
    assert_eq!(last.items[0].id, ids[4]);

    let beyond = store.list(&filter, PageRequest::new(4, 2)).await.unwrap();
    assert_eq!(beyond.total, 5);
    assert!(beyond.items.is_empty());
    assert!(!beyond.has_next);
}

pub async fn test_list_filters<S: SagaStore>(store: &S) {
    let a = make_saga("test_list_filter_a");
    let b = make_saga("test_list_filter_a");
    let c = make_saga("test_list_filter_b");
    for saga in [&a, &b, &c] {
        store.create(saga).await.unwrap();
    }
    store.apply_transition(&running(&b), None).await.unwrap();

    let by_workflow = store
        .list(
            &SagaFilter {
                workflow_name: Some("test_list_filter_a".to_string()),
                ..Default::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(by_workflow.total, 2);

    let by_status = store
        .list(
            &SagaFilter {
                workflow_name: Some("test_list_filter_a".to_string()),
                status: Some(SagaStatus::Running),
                ..Default::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(by_status.total, 1);
    assert_eq!(by_status.items[0].id, b.id);

    let by_correlation = store
        .list(
            &SagaFilter {
                correlation_id: c.correlation_id.clone(),
                ..Default::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(by_correlation.total, 1);
    assert_eq!(by_correlation.items[0].id, c.id);

    let nothing = store
        .list(
            &SagaFilter {
                workflow_name: Some("test_list_filter_none".to_string()),
                ..Default::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(nothing.total, 0);
    assert!(nothing.items.is_empty());
}

/// Run all SagaStore contract tests against `$store`.
#[macro_export]
macro_rules! run_saga_store_tests {
    ($store:expr) => {
        use $crate::storage::saga_store_tests::*;

        // create / get tests
        test_create_and_get($store).await;
        println!("  test_create_and_get: PASSED");

        test_create_duplicate($store).await;
        println!("  test_create_duplicate: PASSED");

        test_get_nonexistent($store).await;
        println!("  test_get_nonexistent: PASSED");

        // apply_transition tests
        test_transition_with_entry($store).await;
        println!("  test_transition_with_entry: PASSED");

        test_transition_without_entry($store).await;
        println!("  test_transition_without_entry: PASSED");

        test_transition_nonexistent($store).await;
        println!("  test_transition_nonexistent: PASSED");

        test_terminal_rejects_transition($store).await;
        println!("  test_terminal_rejects_transition: PASSED");

        // request_cancellation tests
        test_cancellation_flag_is_sticky($store).await;
        println!("  test_cancellation_flag_is_sticky: PASSED");

        test_cancellation_on_terminal($store).await;
        println!("  test_cancellation_on_terminal: PASSED");

        test_cancellation_nonexistent($store).await;
        println!("  test_cancellation_nonexistent: PASSED");

        // list_logs tests
        test_logs_in_append_order($store).await;
        println!("  test_logs_in_append_order: PASSED");

        test_logs_unknown_saga_empty($store).await;
        println!("  test_logs_unknown_saga_empty: PASSED");

        // list_incomplete tests
        test_list_incomplete($store).await;
        println!("  test_list_incomplete: PASSED");

        // list tests
        test_list_newest_first_paginated($store).await;
        println!("  test_list_newest_first_paginated: PASSED");

        test_list_filters($store).await;
        println!("  test_list_filters: PASSED");
    };
}
