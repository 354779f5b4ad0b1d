//! Database schema definitions using sea-query.
//!
//! These define the table and column identifiers for type-safe query building.

use sea_query::Iden;

/// Sagas table schema.
#[derive(Iden)]
pub enum Sagas {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "workflow_name"]
    WorkflowName,
    #[iden = "current_step_index"]
    CurrentStepIndex,
    #[iden = "status"]
    Status,
    #[iden = "payload"]
    Payload,
    #[iden = "correlation_id"]
    CorrelationId,
    #[iden = "initiated_by"]
    InitiatedBy,
    #[iden = "error_message"]
    ErrorMessage,
    #[iden = "cancel_requested"]
    CancelRequested,
    #[iden = "created_at"]
    CreatedAt,
    #[iden = "updated_at"]
    UpdatedAt,
}

/// Step log table schema.
#[derive(Iden)]
pub enum SagaStepLogs {
    Table,
    #[iden = "seq"]
    Seq,
    #[iden = "id"]
    Id,
    #[iden = "saga_id"]
    SagaId,
    #[iden = "step_index"]
    StepIndex,
    #[iden = "step_name"]
    StepName,
    #[iden = "action"]
    Action,
    #[iden = "outcome"]
    Outcome,
    #[iden = "request_payload"]
    RequestPayload,
    #[iden = "response_payload"]
    ResponsePayload,
    #[iden = "error_message"]
    ErrorMessage,
    #[iden = "started_at"]
    StartedAt,
    #[iden = "completed_at"]
    CompletedAt,
}

/// SQL for creating the sagas table.
pub const CREATE_SAGAS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS sagas (
    id TEXT PRIMARY KEY NOT NULL,
    workflow_name TEXT NOT NULL,
    current_step_index INTEGER NOT NULL,
    status TEXT NOT NULL,
    payload TEXT NOT NULL,
    correlation_id TEXT,
    initiated_by TEXT,
    error_message TEXT,
    cancel_requested INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
"#;

/// Index supporting the recovery scan and status filters.
pub const CREATE_SAGAS_STATUS_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_sagas_status ON sagas(status)";

/// Index supporting workflow-name filters.
pub const CREATE_SAGAS_WORKFLOW_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_sagas_workflow ON sagas(workflow_name)";

/// SQL for creating the step log table.
///
/// `seq` preserves append order across entries of one saga.
pub const CREATE_STEP_LOGS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS saga_step_logs (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    saga_id TEXT NOT NULL REFERENCES sagas(id) ON DELETE CASCADE,
    step_index INTEGER NOT NULL,
    step_name TEXT NOT NULL,
    action TEXT NOT NULL,
    outcome TEXT NOT NULL,
    request_payload TEXT,
    response_payload TEXT,
    error_message TEXT,
    started_at TEXT NOT NULL,
    completed_at TEXT NOT NULL
)
"#;

/// Index for per-saga log reads.
pub const CREATE_STEP_LOGS_SAGA_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_step_logs_saga ON saga_step_logs(saga_id, seq)";

/// Schema statements, in execution order.
pub const SCHEMA: [&str; 5] = [
    CREATE_SAGAS_TABLE,
    CREATE_SAGAS_STATUS_INDEX,
    CREATE_SAGAS_WORKFLOW_INDEX,
    CREATE_STEP_LOGS_TABLE,
    CREATE_STEP_LOGS_SAGA_INDEX,
];
