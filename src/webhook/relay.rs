//! The relay itself: ingress, the worker loop, and inline processing.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{FlowsyncError, Result};
use crate::models::{WebhookItemState, WebhookQueueItem};

use super::queue::{QueueBackend, QueueError, QueueStatus};
use super::RelayQueueConfig;

/// Failure reported by a webhook processing handler.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Consumer plug point. Re-delivery of the same payload must not
/// double-apply side effects; the handler owns idempotency keys.
#[async_trait]
pub trait WebhookHandler: Send + Sync {
    async fn handle(&self, item: &WebhookQueueItem) -> std::result::Result<(), HandlerError>;
}

/// How an ingested payload was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestOutcome {
    Enqueued,
    InlineProcessed,
}

/// Queued webhook relay with retry/backoff and inline fallback.
pub struct WebhookRelay {
    backend: Arc<dyn QueueBackend>,
    handler: Arc<dyn WebhookHandler>,
    config: RelayQueueConfig,
}

impl WebhookRelay {
    pub fn new(
        backend: Arc<dyn QueueBackend>,
        handler: Arc<dyn WebhookHandler>,
        config: RelayQueueConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            backend,
            handler,
            config,
        })
    }

    /// Accept one inbound payload. Enqueues by default; processes inline
    /// when configured to, or as a fallback when the backend is down. The
    /// caller gets the item id and which path was taken.
    pub async fn ingest(&self, tenant_id: Uuid, payload: Value) -> Result<(Uuid, IngestOutcome)> {
        let item = WebhookQueueItem::new(tenant_id, payload);
        let item_id = item.id;

        if self.config.inline_processing {
            self.process_inline(item).await?;
            return Ok((item_id, IngestOutcome::InlineProcessed));
        }

        match self.backend.enqueue(item.clone(), Utc::now()).await {
            Ok(()) => {
                debug!(item_id = %item_id, tenant_id = %tenant_id, "webhook enqueued");
                Ok((item_id, IngestOutcome::Enqueued))
            }
            Err(QueueError::Unavailable(reason)) if self.config.inline_fallback => {
                warn!(
                    item_id = %item_id,
                    reason = %reason,
                    "queue backend down, processing webhook inline"
                );
                self.process_inline(item).await?;
                Ok((item_id, IngestOutcome::InlineProcessed))
            }
            Err(e) => Err(FlowsyncError::QueueBackendUnavailable(e.to_string())),
        }
    }

    /// Degraded-mode path: run the handler synchronously and record the
    /// item as inline-processed (never enqueued as well).
    async fn process_inline(&self, mut item: WebhookQueueItem) -> Result<()> {
        item.attempt_count += 1;
        self.run_handler(&item).await?;
        item.state = WebhookItemState::InlineProcessed;
        // Recording the terminal item is best-effort while the backend is
        // degraded; the side effects have already been applied.
        if let Err(e) = self
            .backend
            .record_terminal(item, self.config.completed_retention)
            .await
        {
            debug!(error = %e, "could not record inline-processed item");
        }
        Ok(())
    }

    /// Deliver one ready item, if any. Returns false when nothing is ready.
    pub async fn process_next(&self) -> Result<bool> {
        let Some(mut item) = self
            .backend
            .dequeue_ready()
            .await
            .map_err(|e| FlowsyncError::QueueBackendUnavailable(e.to_string()))?
        else {
            return Ok(false);
        };

        item.attempt_count += 1;
        let attempt = item.attempt_count;
        match self.run_handler(&item).await {
            Ok(()) => {
                item.state = WebhookItemState::Completed;
                info!(item_id = %item.id, attempt, "webhook processed");
                self.backend
                    .record_terminal(item, self.config.completed_retention)
                    .await
                    .map_err(|e| FlowsyncError::QueueBackendUnavailable(e.to_string()))?;
            }
            Err(failure) => {
                if attempt >= self.config.max_attempts {
                    warn!(
                        item_id = %item.id,
                        attempt,
                        error = %failure,
                        "webhook exhausted attempts, moving to failed bucket"
                    );
                    item.state = WebhookItemState::Failed;
                    self.backend
                        .record_terminal(item, self.config.failed_retention)
                        .await
                        .map_err(|e| FlowsyncError::QueueBackendUnavailable(e.to_string()))?;
                } else {
                    let backoff = self.config.backoff_for(attempt);
                    debug!(
                        item_id = %item.id,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %failure,
                        "webhook attempt failed, re-enqueueing"
                    );
                    item.state = WebhookItemState::Queued;
                    let ready_at = Utc::now()
                        + ChronoDuration::from_std(backoff)
                            .unwrap_or_else(|_| ChronoDuration::seconds(60));
                    self.backend
                        .enqueue(item, ready_at)
                        .await
                        .map_err(|e| FlowsyncError::QueueBackendUnavailable(e.to_string()))?;
                }
            }
        }
        Ok(true)
    }

    /// Poll loop for background delivery. Stops when `shutdown` flips.
    pub async fn run_worker(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        info!("webhook relay worker started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            match self.process_next().await {
                Ok(true) => {}
                Ok(false) => {
                    tokio::select! {
                        _ = tokio::time::sleep(std::time::Duration::from_millis(50)) => {}
                        _ = shutdown.changed() => {}
                    }
                }
                Err(e) => {
                    warn!(error = %e, "relay worker backend error, backing off");
                    tokio::select! {
                        _ = tokio::time::sleep(std::time::Duration::from_millis(500)) => {}
                        _ = shutdown.changed() => {}
                    }
                }
            }
        }
        info!("webhook relay worker stopped");
    }

    /// Run the handler under the hard per-item timeout. A timeout counts
    /// as a handler failure and goes through the same retry policy.
    async fn run_handler(&self, item: &WebhookQueueItem) -> Result<()> {
        match timeout(self.config.item_timeout(), self.handler.handle(item)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(FlowsyncError::HandlerFailure(e.to_string())),
            Err(_) => Err(FlowsyncError::HandlerTimeout(self.config.item_timeout_ms)),
        }
    }

    pub async fn status(&self, tenant_id: Uuid) -> Result<QueueStatus> {
        self.backend
            .status(tenant_id)
            .await
            .map_err(|e| FlowsyncError::QueueBackendUnavailable(e.to_string()))
    }

    pub fn config(&self) -> &RelayQueueConfig {
        &self.config
    }
}
