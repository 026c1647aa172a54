//! Execution record model.
//!
//! One run of a workflow over a resolved day list. The record is owned and
//! mutated by the orchestrator/tracker pair for its lifetime and frozen once
//! terminal; every mutation is append or increment only.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::sources::SourceKind;
use crate::state_machine::ExecutionState;

/// What fired the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    Manual,
    Scheduled,
}

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Scheduled => "scheduled",
        }
    }
}

/// Per-source progress counters. Monotonically non-decreasing within one
/// execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCounters {
    pub fetched: u64,
    pub processed: u64,
    /// Days this source will run; fixed at start.
    pub total: u64,
}

/// One recorded failure. Per-day source failures carry their source;
/// run-level failures (resolver errors, deleted workflow) carry none.
/// Append-only while running, frozen at terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionErrorEntry {
    pub day: NaiveDate,
    pub source: Option<SourceKind>,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

/// Durable execution record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub tenant_id: Uuid,
    pub status: ExecutionState,
    pub trigger: TriggerType,
    /// Resolved range bounds; absent when resolution itself failed.
    pub since: Option<NaiveDate>,
    pub until: Option<NaiveDate>,
    pub total_days: u64,
    pub days_processed: u64,
    pub ads: SourceCounters,
    pub pos: SourceCounters,
    pub current_date: Option<NaiveDate>,
    pub errors: Vec<ExecutionErrorEntry>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Execution {
    pub fn new(workflow_id: Uuid, tenant_id: Uuid, trigger: TriggerType) -> Self {
        Self {
            id: Uuid::new_v4(),
            workflow_id,
            tenant_id,
            status: ExecutionState::Pending,
            trigger,
            since: None,
            until: None,
            total_days: 0,
            days_processed: 0,
            ads: SourceCounters::default(),
            pos: SourceCounters::default(),
            current_date: None,
            errors: Vec::new(),
            started_at: None,
            completed_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn counters(&self, source: SourceKind) -> &SourceCounters {
        match source {
            SourceKind::Ads => &self.ads,
            SourceKind::Pos => &self.pos,
        }
    }

    pub fn counters_mut(&mut self, source: SourceKind) -> &mut SourceCounters {
        match source {
            SourceKind::Ads => &mut self.ads,
            SourceKind::Pos => &mut self.pos,
        }
    }

    /// Derived label surfaced to observers. A completed run with recorded
    /// per-day errors is reported as `completed_with_errors`; the stored
    /// status stays `completed` because partial failures do not fail a run.
    pub fn status_label(&self) -> &'static str {
        if self.status == ExecutionState::Completed && !self.errors.is_empty() {
            "completed_with_errors"
        } else {
            self.status.as_str()
        }
    }

    /// Record progress fields shared by event payloads and API responses.
    pub fn progress_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "total_days": self.total_days,
            "days_processed": self.days_processed,
            "current_date": self.current_date,
            "ads": self.ads,
            "pos": self.pos,
            "error_count": self.errors.len(),
        })
    }
}
