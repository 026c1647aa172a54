//! Webhook queue item model.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Lifecycle of a queued webhook payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookItemState {
    /// Waiting in the queue (initial delivery or a backoff retry).
    Queued,
    /// Handed to the processing handler.
    Processing,
    /// Handler succeeded; retained in the completed bucket.
    Completed,
    /// Exhausted max attempts; retained in the failed bucket.
    Failed,
    /// Processed synchronously because the queue backend was degraded.
    InlineProcessed,
}

impl WebhookItemState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::InlineProcessed => "inline_processed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::InlineProcessed)
    }
}

impl fmt::Display for WebhookItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WebhookItemState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "inline_processed" => Ok(Self::InlineProcessed),
            _ => Err(format!("invalid webhook item state: {s}")),
        }
    }
}

/// One inbound webhook payload moving through the relay queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookQueueItem {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub payload: Value,
    pub received_at: DateTime<Utc>,
    /// Delivery attempts made so far. Incremented by the queue runtime.
    pub attempt_count: u32,
    pub state: WebhookItemState,
}

impl WebhookQueueItem {
    pub fn new(tenant_id: Uuid, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            payload,
            received_at: Utc::now(),
            attempt_count: 0,
            state: WebhookItemState::Queued,
        }
    }
}
