//! # Execution Tracker
//!
//! Exclusive owner of the execution record's mutable fields while a run is
//! active. Both per-source tasks funnel their updates through one tracker,
//! whose async mutex serializes every mutation (single-writer discipline).
//! Each mutation is followed by a snapshot write to the execution store; a
//! transient mid-run write failure retries once with the latest snapshot and
//! then proceeds, while the terminal write must be acknowledged before
//! `finish` returns.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{FlowsyncError, PersistenceError, Result};
use crate::models::{Execution, ExecutionErrorEntry};
use crate::persistence::ExecutionStore;
use crate::sources::SourceKind;
use crate::state_machine::{determine_target_state, ExecutionSignal, ExecutionState};

/// Single-writer owner of one execution record.
pub struct ExecutionTracker {
    execution: Mutex<Execution>,
    store: Arc<dyn ExecutionStore>,
    terminal_persist_attempts: u32,
}

impl ExecutionTracker {
    pub fn new(
        execution: Execution,
        store: Arc<dyn ExecutionStore>,
        terminal_persist_attempts: u32,
    ) -> Self {
        Self {
            execution: Mutex::new(execution),
            store,
            terminal_persist_attempts: terminal_persist_attempts.max(1),
        }
    }

    pub async fn execution_id(&self) -> Uuid {
        self.execution.lock().await.id
    }

    /// Current copy of the record, for event snapshots and status reads.
    pub async fn snapshot(&self) -> Execution {
        self.execution.lock().await.clone()
    }

    /// Persist the record as created, before the run loop starts.
    pub async fn persist_initial(&self) -> Result<()> {
        let execution = self.execution.lock().await;
        self.persist_tolerant(&execution).await;
        Ok(())
    }

    /// Transition `pending -> running` and stamp `started_at`.
    pub async fn begin_run(&self) -> Result<Execution> {
        let mut execution = self.execution.lock().await;
        let target = determine_target_state(execution.status, &ExecutionSignal::Start)?;
        execution.status = target;
        execution.started_at = Some(Utc::now());
        self.persist_tolerant(&execution).await;
        Ok(execution.clone())
    }

    /// Record a successful fetch+process for one source on one day.
    pub async fn record_success(
        &self,
        source: SourceKind,
        day: NaiveDate,
        fetched: u64,
        processed: u64,
    ) -> Result<Execution> {
        let mut execution = self.execution.lock().await;
        Self::ensure_running(&execution, "record_success")?;
        let counters = execution.counters_mut(source);
        counters.fetched += fetched;
        counters.processed += processed;
        debug!(
            execution_id = %execution.id,
            source = %source,
            day = %day,
            fetched,
            processed,
            "source day recorded"
        );
        self.persist_tolerant(&execution).await;
        Ok(execution.clone())
    }

    /// Append a per-day error. Errors never abort the run; run-level
    /// failures pass `None` for the source.
    pub async fn record_error(
        &self,
        source: Option<SourceKind>,
        day: NaiveDate,
        message: impl Into<String>,
    ) -> Result<Execution> {
        let mut execution = self.execution.lock().await;
        Self::ensure_running(&execution, "record_error")?;
        let message = message.into();
        warn!(
            execution_id = %execution.id,
            source = source.map(|s| s.as_str()),
            day = %day,
            error = %message,
            "source day failed"
        );
        execution.errors.push(ExecutionErrorEntry {
            day,
            source,
            message,
            occurred_at: Utc::now(),
        });
        self.persist_tolerant(&execution).await;
        Ok(execution.clone())
    }

    /// Mark one day fully handled (both sources done) and move the pointer.
    pub async fn advance_day(&self, day: NaiveDate) -> Result<Execution> {
        let mut execution = self.execution.lock().await;
        Self::ensure_running(&execution, "advance_day")?;
        execution.days_processed += 1;
        execution.current_date = Some(day);
        debug_assert!(execution.days_processed <= execution.total_days);
        self.persist_tolerant(&execution).await;
        Ok(execution.clone())
    }

    /// Fail an execution that never started running (resolver failure).
    /// Records the reason as the single error entry, then drives the
    /// record straight to `failed` with a confirmed terminal write.
    pub async fn fail_before_start(
        &self,
        day: NaiveDate,
        message: impl Into<String>,
    ) -> Result<Execution> {
        let message = message.into();
        {
            let mut execution = self.execution.lock().await;
            execution.errors.push(ExecutionErrorEntry {
                day,
                source: None,
                message: message.clone(),
                occurred_at: Utc::now(),
            });
        }
        self.finish(ExecutionSignal::fail_with_error(message)).await
    }

    /// Drive the record to a terminal state and durably confirm it.
    ///
    /// Unlike mid-run writes, the terminal snapshot must be acknowledged:
    /// after the bounded attempts are exhausted the in-memory record stays
    /// terminal but the caller receives a distinguished error, since
    /// observers may still read a stale status.
    pub async fn finish(&self, signal: ExecutionSignal) -> Result<Execution> {
        let mut execution = self.execution.lock().await;
        let target = determine_target_state(execution.status, &signal)?;
        execution.status = target;
        execution.completed_at = Some(Utc::now());
        if let Some(message) = signal.error_message() {
            // A run failed outside any particular source/day keeps its
            // reason on the record; the resolver failure path lands here.
            debug!(execution_id = %execution.id, error = %message, "execution failed");
        }

        let mut last_error: Option<PersistenceError> = None;
        for attempt in 1..=self.terminal_persist_attempts {
            match self.store.persist(&execution).await {
                Ok(()) => {
                    debug!(
                        execution_id = %execution.id,
                        status = %execution.status,
                        "terminal snapshot confirmed"
                    );
                    return Ok(execution.clone());
                }
                Err(e) => {
                    warn!(
                        execution_id = %execution.id,
                        attempt,
                        error = %e,
                        "terminal snapshot write failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(FlowsyncError::Persistence(
            PersistenceError::TerminalSnapshotUnconfirmed {
                attempts: self.terminal_persist_attempts,
                message: last_error
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
            },
        ))
    }

    fn ensure_running(execution: &Execution, operation: &str) -> Result<()> {
        if execution.status != ExecutionState::Running {
            return Err(FlowsyncError::StateTransition {
                from: execution.status.to_string(),
                signal: operation.to_string(),
            });
        }
        Ok(())
    }

    /// Mid-run snapshot write: retry once on failure, then move on. A stale
    /// intermediate snapshot is acceptable; stalling the run is not.
    async fn persist_tolerant(&self, execution: &Execution) {
        if let Err(first) = self.store.persist(execution).await {
            warn!(
                execution_id = %execution.id,
                error = %first,
                "snapshot write failed, retrying once"
            );
            if let Err(second) = self.store.persist(execution).await {
                warn!(
                    execution_id = %execution.id,
                    error = %second,
                    "snapshot retry failed, continuing with stale persisted state"
                );
            }
        }
    }
}
