//! Shared fixtures: scripted source fetchers and an in-memory engine
//! harness for end-to-end orchestration tests.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use serde_json::{json, Value};
use uuid::Uuid;

use flowsync_core::config::FlowsyncConfig;
use flowsync_core::events::EventPublisher;
use flowsync_core::models::{Execution, OwnershipScope, WorkflowDefinition};
use flowsync_core::orchestration::WorkflowOrchestrator;
use flowsync_core::persistence::{MemoryExecutionStore, MemoryWorkflowStore, WorkflowStore};
use flowsync_core::range::DateRangeSpec;
use flowsync_core::sources::{ProcessOutcome, SourceCallError, SourceFetcher, SourceKind};

/// Fetcher scripted per day: yields a fixed number of records, failing
/// fetch or process on the configured days.
pub struct ScriptedFetcher {
    kind: SourceKind,
    records_per_day: usize,
    fail_fetch_on: HashSet<NaiveDate>,
    fail_process_on: HashSet<NaiveDate>,
    fetched_days: Mutex<Vec<NaiveDate>>,
}

impl ScriptedFetcher {
    pub fn new(kind: SourceKind, records_per_day: usize) -> Self {
        Self {
            kind,
            records_per_day,
            fail_fetch_on: HashSet::new(),
            fail_process_on: HashSet::new(),
            fetched_days: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_fetch_on(mut self, days: &[NaiveDate]) -> Self {
        self.fail_fetch_on.extend(days.iter().copied());
        self
    }

    pub fn failing_process_on(mut self, days: &[NaiveDate]) -> Self {
        self.fail_process_on.extend(days.iter().copied());
        self
    }

    pub fn fetched_days(&self) -> Vec<NaiveDate> {
        self.fetched_days.lock().clone()
    }
}

#[async_trait]
impl SourceFetcher for ScriptedFetcher {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn fetch(&self, day: NaiveDate) -> Result<Vec<Value>, SourceCallError> {
        self.fetched_days.lock().push(day);
        if self.fail_fetch_on.contains(&day) {
            return Err(SourceCallError::new("upstream returned HTTP 500"));
        }
        Ok((0..self.records_per_day)
            .map(|i| json!({ "day": day, "record": i }))
            .collect())
    }

    async fn process(
        &self,
        day: NaiveDate,
        records: Vec<Value>,
    ) -> Result<ProcessOutcome, SourceCallError> {
        if self.fail_process_on.contains(&day) {
            return Err(SourceCallError::new("consumer rejected batch"));
        }
        Ok(ProcessOutcome {
            count: records.len() as u64,
        })
    }
}

/// In-memory engine: orchestrator plus direct handles to its stores.
pub struct Harness {
    pub orchestrator: Arc<WorkflowOrchestrator>,
    pub workflows: Arc<MemoryWorkflowStore>,
    pub executions: Arc<MemoryExecutionStore>,
    pub ads: Arc<ScriptedFetcher>,
    pub pos: Arc<ScriptedFetcher>,
}

impl Harness {
    pub fn new(ads: ScriptedFetcher, pos: ScriptedFetcher) -> Self {
        let workflows = Arc::new(MemoryWorkflowStore::new());
        let executions = Arc::new(MemoryExecutionStore::new());
        let ads = Arc::new(ads);
        let pos = Arc::new(pos);
        let config = FlowsyncConfig {
            // Keep the pacing gate exercised without slowing the suite.
            default_min_delay_ms: 1,
            ..FlowsyncConfig::default()
        };
        let orchestrator = Arc::new(WorkflowOrchestrator::new(
            workflows.clone(),
            executions.clone(),
            EventPublisher::new(config.event_channel_capacity),
            ads.clone(),
            pos.clone(),
            config,
        ));
        Self {
            orchestrator,
            workflows,
            executions,
            ads,
            pos,
        }
    }

    pub async fn store_workflow(&self, definition: &WorkflowDefinition) {
        self.workflows.upsert(definition).await.unwrap();
    }

    /// Poll the execution store until the snapshot reaches a terminal
    /// status. Panics after five seconds.
    pub async fn await_terminal(&self, execution_id: Uuid) -> Execution {
        use flowsync_core::persistence::ExecutionStore;
        for _ in 0..500 {
            if let Some(snapshot) = self.executions.fetch(execution_id).await.unwrap() {
                if snapshot.status.is_terminal() {
                    return snapshot;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("execution {execution_id} did not reach a terminal state");
    }
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// A both-sources-enabled definition over an absolute range.
pub fn absolute_workflow(since: NaiveDate, until: NaiveDate) -> WorkflowDefinition {
    WorkflowDefinition::new(
        Uuid::new_v4(),
        "daily-ingest",
        json!({ "enabled": true }),
        json!({ "enabled": true }),
        DateRangeSpec::Absolute { since, until },
        OwnershipScope::Team {
            team_id: Uuid::new_v4(),
        },
    )
}
