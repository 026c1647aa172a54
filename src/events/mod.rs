//! # Execution Events
//!
//! Ephemeral lifecycle/progress events produced by the orchestrator and
//! fanned out to live subscribers. Events are not persisted beyond the
//! stream; a new subscriber first receives a snapshot of the execution
//! record, then live events.

pub mod publisher;

pub use publisher::EventPublisher;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::models::Execution;

/// Kinds of events emitted over an execution's stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionEventKind {
    /// The run transitioned into `running`
    Started,
    /// One source finished one day successfully
    Progress,
    Completed,
    Failed,
    Cancelled,
    /// Current-state snapshot sent to a newly connected subscriber
    Snapshot,
}

impl ExecutionEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Progress => "progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Snapshot => "snapshot",
        }
    }
}

/// One event on an execution's stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionEvent {
    pub execution_id: Uuid,
    pub tenant_id: Uuid,
    pub kind: ExecutionEventKind,
    pub payload: Value,
    pub occurred_at: DateTime<Utc>,
}

impl ExecutionEvent {
    pub fn new(
        execution_id: Uuid,
        tenant_id: Uuid,
        kind: ExecutionEventKind,
        payload: Value,
    ) -> Self {
        Self {
            execution_id,
            tenant_id,
            kind,
            payload,
            occurred_at: Utc::now(),
        }
    }

    /// Snapshot event carrying the full current execution record.
    pub fn snapshot_of(execution: &Execution) -> Self {
        let payload = serde_json::to_value(execution).unwrap_or(Value::Null);
        Self::new(
            execution.id,
            execution.tenant_id,
            ExecutionEventKind::Snapshot,
            payload,
        )
    }
}
