//! Postgres store implementations.
//!
//! Snapshots are stored as JSONB documents keyed by id, with the columns
//! that status queries filter on lifted out. Queries are runtime-bound so
//! the crate compiles without a live database.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use crate::error::PersistenceError;
use crate::models::{Execution, WorkflowDefinition};

use super::{ExecutionStore, WorkflowStore};

fn backend_err(e: impl std::fmt::Display) -> PersistenceError {
    PersistenceError::Backend(e.to_string())
}

/// Create the tables the stores rely on. Idempotent.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), PersistenceError> {
    sqlx::query(
        r"CREATE TABLE IF NOT EXISTS flowsync_workflows (
            id UUID PRIMARY KEY,
            tenant_id UUID NOT NULL,
            definition JSONB NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
    )
    .execute(pool)
    .await
    .map_err(backend_err)?;

    sqlx::query(
        r"CREATE TABLE IF NOT EXISTS flowsync_executions (
            id UUID PRIMARY KEY,
            workflow_id UUID NOT NULL,
            tenant_id UUID NOT NULL,
            status TEXT NOT NULL,
            snapshot JSONB NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
    )
    .execute(pool)
    .await
    .map_err(backend_err)?;

    sqlx::query(
        r"CREATE INDEX IF NOT EXISTS flowsync_executions_tenant_idx
          ON flowsync_executions (tenant_id, created_at DESC)",
    )
    .execute(pool)
    .await
    .map_err(backend_err)?;

    Ok(())
}

/// Postgres-backed execution snapshot store.
#[derive(Debug, Clone)]
pub struct PostgresExecutionStore {
    pool: PgPool,
}

impl PostgresExecutionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExecutionStore for PostgresExecutionStore {
    async fn persist(&self, snapshot: &Execution) -> Result<(), PersistenceError> {
        let document = serde_json::to_value(snapshot).map_err(backend_err)?;
        sqlx::query(
            r"INSERT INTO flowsync_executions
                  (id, workflow_id, tenant_id, status, snapshot, created_at, updated_at)
              VALUES ($1, $2, $3, $4, $5, $6, now())
              ON CONFLICT (id) DO UPDATE
                  SET status = EXCLUDED.status,
                      snapshot = EXCLUDED.snapshot,
                      updated_at = now()",
        )
        .bind(snapshot.id)
        .bind(snapshot.workflow_id)
        .bind(snapshot.tenant_id)
        .bind(snapshot.status.as_str())
        .bind(document)
        .bind(snapshot.created_at)
        .execute(&self.pool)
        .await
        .map_err(backend_err)?;

        debug!(execution_id = %snapshot.id, status = %snapshot.status, "execution snapshot persisted");
        Ok(())
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<Execution>, PersistenceError> {
        let row = sqlx::query("SELECT snapshot FROM flowsync_executions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_err)?;

        row.map(|r| {
            let document: serde_json::Value = r.try_get("snapshot").map_err(backend_err)?;
            serde_json::from_value(document).map_err(backend_err)
        })
        .transpose()
    }

    async fn list_for_tenant(&self, tenant_id: Uuid) -> Result<Vec<Execution>, PersistenceError> {
        let rows = sqlx::query(
            r"SELECT snapshot FROM flowsync_executions
              WHERE tenant_id = $1
              ORDER BY created_at DESC",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend_err)?;

        rows.into_iter()
            .map(|r| {
                let document: serde_json::Value = r.try_get("snapshot").map_err(backend_err)?;
                serde_json::from_value(document).map_err(backend_err)
            })
            .collect()
    }
}

/// Postgres-backed workflow definition store.
#[derive(Debug, Clone)]
pub struct PostgresWorkflowStore {
    pool: PgPool,
}

impl PostgresWorkflowStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkflowStore for PostgresWorkflowStore {
    async fn fetch(&self, id: Uuid) -> Result<Option<WorkflowDefinition>, PersistenceError> {
        let row = sqlx::query("SELECT definition FROM flowsync_workflows WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_err)?;

        row.map(|r| {
            let document: serde_json::Value = r.try_get("definition").map_err(backend_err)?;
            serde_json::from_value(document).map_err(backend_err)
        })
        .transpose()
    }

    async fn exists(&self, id: Uuid) -> Result<bool, PersistenceError> {
        let row = sqlx::query("SELECT 1 AS present FROM flowsync_workflows WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_err)?;
        Ok(row.is_some())
    }

    async fn upsert(&self, definition: &WorkflowDefinition) -> Result<(), PersistenceError> {
        let document = serde_json::to_value(definition).map_err(backend_err)?;
        sqlx::query(
            r"INSERT INTO flowsync_workflows (id, tenant_id, definition, updated_at)
              VALUES ($1, $2, $3, now())
              ON CONFLICT (id) DO UPDATE
                  SET definition = EXCLUDED.definition,
                      updated_at = now()",
        )
        .bind(definition.id)
        .bind(definition.tenant_id)
        .bind(document)
        .execute(&self.pool)
        .await
        .map_err(backend_err)?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), PersistenceError> {
        sqlx::query("DELETE FROM flowsync_workflows WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(backend_err)?;
        Ok(())
    }
}
