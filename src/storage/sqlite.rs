//! SQLite implementation of the saga store.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sea_query::{Expr, Order, Query, SelectStatement, SqliteQueryBuilder};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::debug;
use uuid::Uuid;

use crate::interfaces::saga_store::{
    PageRequest, Result, SagaFilter, SagaPage, SagaStore, StorageError,
};
use crate::model::{SagaInstance, SagaStatus, StepLogEntry};

use super::schema::{SagaStepLogs, Sagas, SCHEMA};

const TERMINAL: [&str; 3] = ["COMPLETED", "FAILED", "CANCELLED"];

/// SQLite implementation of `SagaStore`.
///
/// Transitions run inside one transaction: the guarded row update and the
/// log insert commit together or not at all.
pub struct SqliteSagaStore {
    pool: SqlitePool,
}

impl SqliteSagaStore {
    /// Create a new SQLite saga store.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the database schema.
    pub async fn init(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Load a saga inside an open transaction.
    async fn fetch_in(tx: &mut Transaction<'_, Sqlite>, id: Uuid) -> Result<SagaInstance> {
        let query = select_sagas()
            .and_where(Expr::col(Sagas::Id).eq(id.to_string()))
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or(StorageError::NotFound(id))?;
        row_to_saga(&row)
    }

    /// Explain why a guarded update touched no rows.
    async fn rejection(tx: &mut Transaction<'_, Sqlite>, id: Uuid) -> StorageError {
        match Self::fetch_in(tx, id).await {
            Ok(saga) => StorageError::TerminalState {
                id,
                status: saga.status,
            },
            Err(e) => e,
        }
    }
}

fn timestamp(dt: &DateTime<Utc>) -> String {
    // Fixed-width so lexical order matches chronological order.
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::InvalidTimestamp(format!("{value}: {e}")))
}

fn select_sagas() -> SelectStatement {
    Query::select()
        .columns([
            Sagas::Id,
            Sagas::WorkflowName,
            Sagas::CurrentStepIndex,
            Sagas::Status,
            Sagas::Payload,
            Sagas::CorrelationId,
            Sagas::InitiatedBy,
            Sagas::ErrorMessage,
            Sagas::CancelRequested,
            Sagas::CreatedAt,
            Sagas::UpdatedAt,
        ])
        .from(Sagas::Table)
        .to_owned()
}

fn apply_filter(query: &mut SelectStatement, filter: &SagaFilter) {
    if let Some(name) = &filter.workflow_name {
        query.and_where(Expr::col(Sagas::WorkflowName).eq(name.as_str()));
    }
    if let Some(status) = filter.status {
        query.and_where(Expr::col(Sagas::Status).eq(status.as_str()));
    }
    if let Some(correlation_id) = &filter.correlation_id {
        query.and_where(Expr::col(Sagas::CorrelationId).eq(correlation_id.as_str()));
    }
}

fn row_to_saga(row: &SqliteRow) -> Result<SagaInstance> {
    let id: String = row.try_get("id")?;
    let status: String = row.try_get("status")?;
    let index: i64 = row.try_get("current_step_index")?;
    let payload: String = row.try_get("payload")?;
    let cancel_requested: i64 = row.try_get("cancel_requested")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(SagaInstance {
        id: Uuid::parse_str(&id)?,
        workflow_name: row.try_get("workflow_name")?,
        current_step_index: usize::try_from(index)
            .map_err(|_| StorageError::Corrupt(format!("negative step index {index}")))?,
        status: status
            .parse::<SagaStatus>()
            .map_err(|e| StorageError::Corrupt(e.to_string()))?,
        payload: serde_json::from_str(&payload)?,
        correlation_id: row.try_get("correlation_id")?,
        initiated_by: row.try_get("initiated_by")?,
        error_message: row.try_get("error_message")?,
        cancel_requested: cancel_requested != 0,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn row_to_entry(row: &SqliteRow) -> Result<StepLogEntry> {
    let id: String = row.try_get("id")?;
    let saga_id: String = row.try_get("saga_id")?;
    let step_index: i64 = row.try_get("step_index")?;
    let action: String = row.try_get("action")?;
    let outcome: String = row.try_get("outcome")?;
    let request: Option<String> = row.try_get("request_payload")?;
    let response: Option<String> = row.try_get("response_payload")?;
    let started_at: String = row.try_get("started_at")?;
    let completed_at: String = row.try_get("completed_at")?;

    Ok(StepLogEntry {
        id: Uuid::parse_str(&id)?,
        saga_id: Uuid::parse_str(&saga_id)?,
        step_index: usize::try_from(step_index)
            .map_err(|_| StorageError::Corrupt(format!("negative step index {step_index}")))?,
        step_name: row.try_get("step_name")?,
        action: action.parse().map_err(StorageError::Corrupt)?,
        outcome: outcome.parse().map_err(StorageError::Corrupt)?,
        request_payload: request.as_deref().map(serde_json::from_str).transpose()?,
        response_payload: response.as_deref().map(serde_json::from_str).transpose()?,
        error_message: row.try_get("error_message")?,
        started_at: parse_timestamp(&started_at)?,
        completed_at: parse_timestamp(&completed_at)?,
    })
}

fn insert_entry_sql(entry: &StepLogEntry) -> Result<String> {
    let request = entry
        .request_payload
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let response = entry
        .response_payload
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    Ok(Query::insert()
        .into_table(SagaStepLogs::Table)
        .columns([
            SagaStepLogs::Id,
            SagaStepLogs::SagaId,
            SagaStepLogs::StepIndex,
            SagaStepLogs::StepName,
            SagaStepLogs::Action,
            SagaStepLogs::Outcome,
            SagaStepLogs::RequestPayload,
            SagaStepLogs::ResponsePayload,
            SagaStepLogs::ErrorMessage,
            SagaStepLogs::StartedAt,
            SagaStepLogs::CompletedAt,
        ])
        .values_panic([
            entry.id.to_string().into(),
            entry.saga_id.to_string().into(),
            (entry.step_index as i64).into(),
            entry.step_name.clone().into(),
            entry.action.as_str().into(),
            entry.outcome.as_str().into(),
            request.into(),
            response.into(),
            entry.error_message.clone().into(),
            timestamp(&entry.started_at).into(),
            timestamp(&entry.completed_at).into(),
        ])
        .to_string(SqliteQueryBuilder))
}

#[async_trait]
impl SagaStore for SqliteSagaStore {
    async fn create(&self, saga: &SagaInstance) -> Result<()> {
        let query = Query::insert()
            .into_table(Sagas::Table)
            .columns([
                Sagas::Id,
                Sagas::WorkflowName,
                Sagas::CurrentStepIndex,
                Sagas::Status,
                Sagas::Payload,
                Sagas::CorrelationId,
                Sagas::InitiatedBy,
                Sagas::ErrorMessage,
                Sagas::CancelRequested,
                Sagas::CreatedAt,
                Sagas::UpdatedAt,
            ])
            .values_panic([
                saga.id.to_string().into(),
                saga.workflow_name.clone().into(),
                (saga.current_step_index as i64).into(),
                saga.status.as_str().into(),
                serde_json::to_string(&saga.payload)?.into(),
                saga.correlation_id.clone().into(),
                saga.initiated_by.clone().into(),
                saga.error_message.clone().into(),
                i64::from(saga.cancel_requested).into(),
                timestamp(&saga.created_at).into(),
                timestamp(&saga.updated_at).into(),
            ])
            .to_string(SqliteQueryBuilder);

        match sqlx::query(&query).execute(&self.pool).await {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StorageError::AlreadyExists(saga.id))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn apply_transition(
        &self,
        saga: &SagaInstance,
        entry: Option<&StepLogEntry>,
    ) -> Result<()> {
        let entry_sql = entry.map(insert_entry_sql).transpose()?;

        let update = {
            let mut update = Query::update();
            update
                .table(Sagas::Table)
                .value(Sagas::CurrentStepIndex, saga.current_step_index as i64)
                .value(Sagas::Status, saga.status.as_str())
                .value(Sagas::Payload, serde_json::to_string(&saga.payload)?)
                .value(Sagas::ErrorMessage, saga.error_message.clone())
                .value(Sagas::UpdatedAt, timestamp(&saga.updated_at))
                .and_where(Expr::col(Sagas::Id).eq(saga.id.to_string()))
                .and_where(Expr::col(Sagas::Status).is_not_in(TERMINAL));
            if saga.cancel_requested {
                // The flag only ever moves from 0 to 1.
                update.value(Sagas::CancelRequested, 1i64);
            }
            update.to_string(SqliteQueryBuilder)
        };

        // Write first so the transaction takes the write lock up front.
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query(&update).execute(&mut *tx).await?;
        if updated.rows_affected() == 0 {
            let err = Self::rejection(&mut tx, saga.id).await;
            tx.rollback().await?;
            return Err(err);
        }
        if let Some(sql) = entry_sql {
            sqlx::query(&sql).execute(&mut *tx).await?;
        }
        tx.commit().await?;

        debug!(
            saga_id = %saga.id,
            status = %saga.status,
            step_index = saga.current_step_index,
            logged = entry.is_some(),
            "Transition committed"
        );
        Ok(())
    }

    async fn request_cancellation(&self, id: Uuid) -> Result<SagaInstance> {
        let update = Query::update()
            .table(Sagas::Table)
            .value(Sagas::CancelRequested, 1i64)
            .value(Sagas::UpdatedAt, timestamp(&Utc::now()))
            .and_where(Expr::col(Sagas::Id).eq(id.to_string()))
            .and_where(Expr::col(Sagas::Status).is_not_in(TERMINAL))
            .to_string(SqliteQueryBuilder);

        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query(&update).execute(&mut *tx).await?;
        if updated.rows_affected() == 0 {
            let err = Self::rejection(&mut tx, id).await;
            tx.rollback().await?;
            return Err(err);
        }
        let saga = Self::fetch_in(&mut tx, id).await?;
        tx.commit().await?;
        Ok(saga)
    }

    async fn get(&self, id: Uuid) -> Result<SagaInstance> {
        let query = select_sagas()
            .and_where(Expr::col(Sagas::Id).eq(id.to_string()))
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::NotFound(id))?;
        row_to_saga(&row)
    }

    async fn list_logs(&self, id: Uuid) -> Result<Vec<StepLogEntry>> {
        let query = Query::select()
            .columns([
                SagaStepLogs::Id,
                SagaStepLogs::SagaId,
                SagaStepLogs::StepIndex,
                SagaStepLogs::StepName,
                SagaStepLogs::Action,
                SagaStepLogs::Outcome,
                SagaStepLogs::RequestPayload,
                SagaStepLogs::ResponsePayload,
                SagaStepLogs::ErrorMessage,
                SagaStepLogs::StartedAt,
                SagaStepLogs::CompletedAt,
            ])
            .from(SagaStepLogs::Table)
            .and_where(Expr::col(SagaStepLogs::SagaId).eq(id.to_string()))
            .order_by(SagaStepLogs::Seq, Order::Asc)
            .to_string(SqliteQueryBuilder);

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_entry).collect()
    }

    async fn list_incomplete(&self) -> Result<Vec<SagaInstance>> {
        let query = select_sagas()
            .and_where(
                Expr::col(Sagas::Status)
                    .is_in(SagaStatus::INCOMPLETE.map(|status| status.as_str())),
            )
            .order_by(Sagas::CreatedAt, Order::Asc)
            .to_string(SqliteQueryBuilder);

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_saga).collect()
    }

    async fn list(&self, filter: &SagaFilter, page: PageRequest) -> Result<SagaPage> {
        let count = {
            let mut count = Query::select()
                .expr(Expr::col(Sagas::Id).count())
                .from(Sagas::Table)
                .to_owned();
            apply_filter(&mut count, filter);
            count.to_string(SqliteQueryBuilder)
        };
        let total: i64 = sqlx::query(&count).fetch_one(&self.pool).await?.try_get(0)?;

        let select = {
            let mut select = select_sagas();
            apply_filter(&mut select, filter);
            select
                .order_by(Sagas::CreatedAt, Order::Desc)
                .order_by(Sagas::Id, Order::Desc)
                .limit(u64::from(page.page_size))
                .offset(page.offset());
            select.to_string(SqliteQueryBuilder)
        };

        let rows = sqlx::query(&select).fetch_all(&self.pool).await?;
        let items = rows
            .iter()
            .map(row_to_saga)
            .collect::<Result<Vec<_>>>()?;

        Ok(SagaPage::new(items, total.max(0) as u64, page))
    }
}
