//! Queue backends for the webhook relay.
//!
//! A backend stores queued items with a ready-at time (redelivery after
//! backoff is an enqueue in the future) and retains terminal items in
//! bounded completed/failed buckets. The in-memory backend also models
//! backend unavailability so degraded-mode paths can be exercised.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{WebhookItemState, WebhookQueueItem};

/// Errors from a queue backend.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The backend cannot be reached at all; triggers the inline fallback.
    #[error("queue backend unavailable: {0}")]
    Unavailable(String),

    /// The backend answered but the operation failed.
    #[error("queue backend failure: {0}")]
    Backend(String),
}

/// Operational view of one tenant's queue.
#[derive(Debug, Clone, Serialize)]
pub struct QueueStatus {
    pub queued: usize,
    pub completed: Vec<WebhookQueueItem>,
    pub failed: Vec<WebhookQueueItem>,
}

/// Durable FIFO-per-tenant storage for webhook items.
#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// Store an item for delivery no earlier than `ready_at`.
    async fn enqueue(
        &self,
        item: WebhookQueueItem,
        ready_at: DateTime<Utc>,
    ) -> Result<(), QueueError>;

    /// Pop the oldest ready item, marking it in-flight.
    async fn dequeue_ready(&self) -> Result<Option<WebhookQueueItem>, QueueError>;

    /// Record a terminal outcome, trimming the bucket to its retention.
    async fn record_terminal(
        &self,
        item: WebhookQueueItem,
        retention: usize,
    ) -> Result<(), QueueError>;

    /// Queue + bucket view for one tenant.
    async fn status(&self, tenant_id: Uuid) -> Result<QueueStatus, QueueError>;
}

/// In-memory queue backend.
#[derive(Debug, Default)]
pub struct MemoryQueueBackend {
    queued: Mutex<VecDeque<(DateTime<Utc>, WebhookQueueItem)>>,
    completed: Mutex<VecDeque<WebhookQueueItem>>,
    failed: Mutex<VecDeque<WebhookQueueItem>>,
    unavailable: AtomicBool,
}

impl MemoryQueueBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate backend outage; enqueue/dequeue fail until restored.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), QueueError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(QueueError::Unavailable("backend marked down".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl QueueBackend for MemoryQueueBackend {
    async fn enqueue(
        &self,
        item: WebhookQueueItem,
        ready_at: DateTime<Utc>,
    ) -> Result<(), QueueError> {
        self.check_available()?;
        self.queued.lock().push_back((ready_at, item));
        Ok(())
    }

    async fn dequeue_ready(&self) -> Result<Option<WebhookQueueItem>, QueueError> {
        self.check_available()?;
        let now = Utc::now();
        let mut queued = self.queued.lock();
        // Insertion order preserves per-tenant FIFO for first deliveries;
        // backoff retries re-enter behind newer items by design.
        let position = queued.iter().position(|(ready_at, _)| *ready_at <= now);
        Ok(position.and_then(|i| queued.remove(i)).map(|(_, mut item)| {
            item.state = WebhookItemState::Processing;
            item
        }))
    }

    async fn record_terminal(
        &self,
        item: WebhookQueueItem,
        retention: usize,
    ) -> Result<(), QueueError> {
        let bucket = match item.state {
            WebhookItemState::Failed => &self.failed,
            // Inline-processed items are retained alongside completions.
            _ => &self.completed,
        };
        let mut bucket = bucket.lock();
        bucket.push_back(item);
        while bucket.len() > retention {
            bucket.pop_front();
        }
        Ok(())
    }

    async fn status(&self, tenant_id: Uuid) -> Result<QueueStatus, QueueError> {
        let queued = self
            .queued
            .lock()
            .iter()
            .filter(|(_, item)| item.tenant_id == tenant_id)
            .count();
        let completed = self
            .completed
            .lock()
            .iter()
            .filter(|item| item.tenant_id == tenant_id)
            .cloned()
            .collect();
        let failed = self
            .failed
            .lock()
            .iter()
            .filter(|item| item.tenant_id == tenant_id)
            .cloned()
            .collect();
        Ok(QueueStatus {
            queued,
            completed,
            failed,
        })
    }
}

/// Postgres queue backend over a plain table; redelivery uses a ready-at
/// column rather than a queue extension so any Postgres works.
#[derive(Debug, Clone)]
pub struct PostgresQueueBackend {
    pool: PgPool,
}

impl PostgresQueueBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the queue table. Idempotent.
    pub async fn ensure_schema(&self) -> Result<(), QueueError> {
        sqlx::query(
            r"CREATE TABLE IF NOT EXISTS flowsync_webhook_queue (
                id UUID PRIMARY KEY,
                tenant_id UUID NOT NULL,
                payload JSONB NOT NULL,
                received_at TIMESTAMPTZ NOT NULL,
                attempt_count INT NOT NULL DEFAULT 0,
                state TEXT NOT NULL,
                ready_at TIMESTAMPTZ NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(unavailable_err)?;

        sqlx::query(
            r"CREATE INDEX IF NOT EXISTS flowsync_webhook_queue_ready_idx
              ON flowsync_webhook_queue (state, ready_at, received_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(unavailable_err)?;

        Ok(())
    }

    fn item_from_row(row: &sqlx::postgres::PgRow) -> Result<WebhookQueueItem, QueueError> {
        let state: String = row.try_get("state").map_err(backend_err)?;
        Ok(WebhookQueueItem {
            id: row.try_get("id").map_err(backend_err)?,
            tenant_id: row.try_get("tenant_id").map_err(backend_err)?,
            payload: row.try_get("payload").map_err(backend_err)?,
            received_at: row.try_get("received_at").map_err(backend_err)?,
            attempt_count: row
                .try_get::<i32, _>("attempt_count")
                .map_err(backend_err)? as u32,
            state: state.parse().map_err(QueueError::Backend)?,
        })
    }
}

fn backend_err(e: impl std::fmt::Display) -> QueueError {
    QueueError::Backend(e.to_string())
}

fn unavailable_err(e: impl std::fmt::Display) -> QueueError {
    QueueError::Unavailable(e.to_string())
}

#[async_trait]
impl QueueBackend for PostgresQueueBackend {
    async fn enqueue(
        &self,
        item: WebhookQueueItem,
        ready_at: DateTime<Utc>,
    ) -> Result<(), QueueError> {
        sqlx::query(
            r"INSERT INTO flowsync_webhook_queue
                  (id, tenant_id, payload, received_at, attempt_count, state, ready_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7)
              ON CONFLICT (id) DO UPDATE
                  SET attempt_count = EXCLUDED.attempt_count,
                      state = EXCLUDED.state,
                      ready_at = EXCLUDED.ready_at",
        )
        .bind(item.id)
        .bind(item.tenant_id)
        .bind(&item.payload)
        .bind(item.received_at)
        .bind(item.attempt_count as i32)
        .bind(WebhookItemState::Queued.as_str())
        .bind(ready_at)
        .execute(&self.pool)
        .await
        .map_err(unavailable_err)?;
        Ok(())
    }

    async fn dequeue_ready(&self) -> Result<Option<WebhookQueueItem>, QueueError> {
        let row = sqlx::query(
            r"UPDATE flowsync_webhook_queue
              SET state = 'processing'
              WHERE id = (
                  SELECT id FROM flowsync_webhook_queue
                  WHERE state = 'queued' AND ready_at <= now()
                  ORDER BY received_at
                  LIMIT 1
                  FOR UPDATE SKIP LOCKED
              )
              RETURNING id, tenant_id, payload, received_at, attempt_count, state",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable_err)?;

        row.as_ref().map(Self::item_from_row).transpose()
    }

    async fn record_terminal(
        &self,
        item: WebhookQueueItem,
        retention: usize,
    ) -> Result<(), QueueError> {
        sqlx::query("UPDATE flowsync_webhook_queue SET state = $2 WHERE id = $1")
            .bind(item.id)
            .bind(item.state.as_str())
            .execute(&self.pool)
            .await
            .map_err(backend_err)?;

        // Trim the bucket beyond its retention, oldest first.
        sqlx::query(
            r"DELETE FROM flowsync_webhook_queue
              WHERE state = $1 AND id NOT IN (
                  SELECT id FROM flowsync_webhook_queue
                  WHERE state = $1
                  ORDER BY received_at DESC
                  LIMIT $2
              )",
        )
        .bind(item.state.as_str())
        .bind(retention as i64)
        .execute(&self.pool)
        .await
        .map_err(backend_err)?;

        Ok(())
    }

    async fn status(&self, tenant_id: Uuid) -> Result<QueueStatus, QueueError> {
        let rows = sqlx::query(
            r"SELECT id, tenant_id, payload, received_at, attempt_count, state
              FROM flowsync_webhook_queue
              WHERE tenant_id = $1
              ORDER BY received_at",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable_err)?;

        let mut status = QueueStatus {
            queued: 0,
            completed: Vec::new(),
            failed: Vec::new(),
        };
        for row in &rows {
            let item = Self::item_from_row(row)?;
            match item.state {
                WebhookItemState::Queued | WebhookItemState::Processing => status.queued += 1,
                WebhookItemState::Failed => status.failed.push(item),
                _ => status.completed.push(item),
            }
        }
        Ok(status)
    }
}
