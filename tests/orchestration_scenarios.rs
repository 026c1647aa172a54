//! End-to-end orchestration runs against in-memory stores and scripted
//! fetchers.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Value};
use uuid::Uuid;

use flowsync_core::error::FlowsyncError;
use flowsync_core::models::{OwnershipScope, TriggerType, WorkflowDefinition};
use flowsync_core::persistence::{ExecutionStore, MemoryWorkflowStore, WorkflowStore};
use flowsync_core::range::DateRangeSpec;
use flowsync_core::sources::{ProcessOutcome, SourceCallError, SourceFetcher, SourceKind};
use flowsync_core::state_machine::ExecutionState;

use common::{absolute_workflow, day, Harness, ScriptedFetcher};

#[tokio::test]
async fn successful_run_over_three_days() {
    let harness = Harness::new(
        ScriptedFetcher::new(SourceKind::Ads, 4),
        ScriptedFetcher::new(SourceKind::Pos, 2),
    );
    let workflow = absolute_workflow(day(2024, 1, 1), day(2024, 1, 3));
    harness.store_workflow(&workflow).await;

    let execution_id = harness
        .orchestrator
        .start(workflow.id, TriggerType::Manual)
        .await
        .unwrap();
    let snapshot = harness.await_terminal(execution_id).await;

    assert_eq!(snapshot.status, ExecutionState::Completed);
    assert_eq!(snapshot.status_label(), "completed");
    assert_eq!(snapshot.total_days, 3);
    assert_eq!(snapshot.days_processed, 3);
    assert!(snapshot.errors.is_empty());
    assert_eq!(snapshot.since, Some(day(2024, 1, 1)));
    assert_eq!(snapshot.until, Some(day(2024, 1, 3)));
    assert_eq!(snapshot.ads.fetched, 12);
    assert_eq!(snapshot.ads.processed, 12);
    assert_eq!(snapshot.pos.fetched, 6);
    assert_eq!(snapshot.pos.processed, 6);
    assert!(snapshot.completed_at.is_some());

    // Every day was fetched once per source, in ascending order.
    let expected = vec![day(2024, 1, 1), day(2024, 1, 2), day(2024, 1, 3)];
    assert_eq!(harness.ads.fetched_days(), expected);
    assert_eq!(harness.pos.fetched_days(), expected);
}

#[tokio::test]
async fn pos_failure_on_one_day_completes_with_errors() {
    let harness = Harness::new(
        ScriptedFetcher::new(SourceKind::Ads, 1),
        ScriptedFetcher::new(SourceKind::Pos, 1).failing_fetch_on(&[day(2024, 1, 2)]),
    );
    let workflow = absolute_workflow(day(2024, 1, 1), day(2024, 1, 3));
    harness.store_workflow(&workflow).await;

    let execution_id = harness
        .orchestrator
        .start(workflow.id, TriggerType::Manual)
        .await
        .unwrap();
    let snapshot = harness.await_terminal(execution_id).await;

    // The bad day is recorded and skipped, never fatal.
    assert_eq!(snapshot.status, ExecutionState::Completed);
    assert_eq!(snapshot.status_label(), "completed_with_errors");
    assert_eq!(snapshot.days_processed, 3);
    assert_eq!(snapshot.errors.len(), 1);
    assert_eq!(snapshot.errors[0].day, day(2024, 1, 2));
    assert_eq!(snapshot.errors[0].source, Some(SourceKind::Pos));
    // The stored message names the failed phase.
    assert!(snapshot.errors[0].message.contains("fetch failed"));
    // POS counters only reflect the two good days.
    assert_eq!(snapshot.pos.fetched, 2);
    assert_eq!(snapshot.ads.fetched, 3);
}

#[tokio::test]
async fn process_failure_is_recorded_with_its_phase() {
    let harness = Harness::new(
        ScriptedFetcher::new(SourceKind::Ads, 1).failing_process_on(&[day(2024, 1, 1)]),
        ScriptedFetcher::new(SourceKind::Pos, 1),
    );
    let workflow = absolute_workflow(day(2024, 1, 1), day(2024, 1, 2));
    harness.store_workflow(&workflow).await;

    let execution_id = harness
        .orchestrator
        .start(workflow.id, TriggerType::Manual)
        .await
        .unwrap();
    let snapshot = harness.await_terminal(execution_id).await;

    assert_eq!(snapshot.status_label(), "completed_with_errors");
    assert_eq!(snapshot.errors.len(), 1);
    assert_eq!(snapshot.errors[0].source, Some(SourceKind::Ads));
    assert!(snapshot.errors[0].message.contains("processing failed"));
    // Counters only reflect the good day.
    assert_eq!(snapshot.ads.fetched, 1);
    assert_eq!(snapshot.ads.processed, 1);
}

#[tokio::test]
async fn unresolvable_range_fails_the_execution_immediately() {
    let harness = Harness::new(
        ScriptedFetcher::new(SourceKind::Ads, 1),
        ScriptedFetcher::new(SourceKind::Pos, 1),
    );
    // since > until cannot resolve.
    let workflow = absolute_workflow(day(2024, 1, 3), day(2024, 1, 1));
    harness.store_workflow(&workflow).await;

    let execution_id = harness
        .orchestrator
        .start(workflow.id, TriggerType::Manual)
        .await
        .unwrap();
    let snapshot = harness.await_terminal(execution_id).await;

    assert_eq!(snapshot.status, ExecutionState::Failed);
    assert_eq!(snapshot.errors.len(), 1);
    assert_eq!(snapshot.errors[0].source, None);
    assert_eq!(snapshot.days_processed, 0);
    assert!(harness.ads.fetched_days().is_empty());
}

#[tokio::test]
async fn malformed_settings_fail_fast_without_a_record() {
    let harness = Harness::new(
        ScriptedFetcher::new(SourceKind::Ads, 1),
        ScriptedFetcher::new(SourceKind::Pos, 1),
    );
    let mut workflow = absolute_workflow(day(2024, 1, 1), day(2024, 1, 1));
    workflow.ads_settings = json!({ "enabled": "definitely" });
    harness.store_workflow(&workflow).await;

    let result = harness
        .orchestrator
        .start(workflow.id, TriggerType::Manual)
        .await;
    assert!(matches!(result, Err(FlowsyncError::Validation(_))));

    let records = harness
        .executions
        .list_for_tenant(workflow.tenant_id)
        .await
        .unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn unknown_workflow_is_rejected() {
    let harness = Harness::new(
        ScriptedFetcher::new(SourceKind::Ads, 1),
        ScriptedFetcher::new(SourceKind::Pos, 1),
    );
    let result = harness
        .orchestrator
        .start(Uuid::new_v4(), TriggerType::Manual)
        .await;
    assert!(matches!(result, Err(FlowsyncError::WorkflowNotFound(_))));
}

#[tokio::test]
async fn disabled_source_is_never_called() {
    let harness = Harness::new(
        ScriptedFetcher::new(SourceKind::Ads, 1),
        ScriptedFetcher::new(SourceKind::Pos, 1),
    );
    let mut workflow = absolute_workflow(day(2024, 1, 1), day(2024, 1, 2));
    workflow.pos_settings = json!({ "enabled": false });
    harness.store_workflow(&workflow).await;

    let execution_id = harness
        .orchestrator
        .start(workflow.id, TriggerType::Manual)
        .await
        .unwrap();
    let snapshot = harness.await_terminal(execution_id).await;

    assert_eq!(snapshot.status, ExecutionState::Completed);
    assert!(harness.pos.fetched_days().is_empty());
    assert_eq!(snapshot.pos.total, 0);
    assert_eq!(snapshot.ads.total, 2);
}

#[tokio::test]
async fn cancellation_before_first_day_yields_cancelled() {
    let harness = Harness::new(
        ScriptedFetcher::new(SourceKind::Ads, 1),
        ScriptedFetcher::new(SourceKind::Pos, 1),
    );
    let workflow = absolute_workflow(day(2024, 1, 1), day(2024, 1, 31));
    harness.store_workflow(&workflow).await;

    let execution_id = harness
        .orchestrator
        .start(workflow.id, TriggerType::Manual)
        .await
        .unwrap();
    // The flag is registered before the run task spawns, so cancelling
    // here is observed at the first day boundary at the latest.
    assert!(harness.orchestrator.cancel(execution_id));

    let snapshot = harness.await_terminal(execution_id).await;
    assert_eq!(snapshot.status, ExecutionState::Cancelled);
    assert!(snapshot.days_processed < snapshot.total_days);

    // A second cancel finds nothing active.
    assert!(!harness.orchestrator.cancel(execution_id));
}

/// Fetcher that deletes the workflow definition from under the run on its
/// first fetch, so the next day-boundary probe observes the deletion.
struct DeletingFetcher {
    workflows: Arc<MemoryWorkflowStore>,
    workflow_id: Uuid,
}

#[async_trait]
impl SourceFetcher for DeletingFetcher {
    fn kind(&self) -> SourceKind {
        SourceKind::Ads
    }

    async fn fetch(&self, _day: NaiveDate) -> Result<Vec<Value>, SourceCallError> {
        self.workflows
            .delete(self.workflow_id)
            .await
            .map_err(|e| SourceCallError::new(e.to_string()))?;
        Ok(vec![json!({})])
    }

    async fn process(
        &self,
        _day: NaiveDate,
        records: Vec<Value>,
    ) -> Result<ProcessOutcome, SourceCallError> {
        Ok(ProcessOutcome {
            count: records.len() as u64,
        })
    }
}

#[tokio::test]
async fn deleted_workflow_fails_the_run_at_the_next_day_boundary() {
    use flowsync_core::config::FlowsyncConfig;
    use flowsync_core::events::EventPublisher;
    use flowsync_core::orchestration::WorkflowOrchestrator;
    use flowsync_core::persistence::MemoryExecutionStore;

    let workflows = Arc::new(MemoryWorkflowStore::new());
    let executions = Arc::new(MemoryExecutionStore::new());
    let workflow = WorkflowDefinition::new(
        Uuid::new_v4(),
        "self-destructing",
        json!({ "enabled": true }),
        json!({ "enabled": false }),
        DateRangeSpec::Absolute {
            since: day(2024, 1, 1),
            until: day(2024, 1, 3),
        },
        OwnershipScope::Team {
            team_id: Uuid::new_v4(),
        },
    );
    workflows.upsert(&workflow).await.unwrap();

    let config = FlowsyncConfig {
        default_min_delay_ms: 1,
        ..FlowsyncConfig::default()
    };
    let orchestrator = Arc::new(WorkflowOrchestrator::new(
        workflows.clone(),
        executions.clone(),
        EventPublisher::new(16),
        Arc::new(DeletingFetcher {
            workflows: workflows.clone(),
            workflow_id: workflow.id,
        }),
        Arc::new(ScriptedFetcher::new(SourceKind::Pos, 0)),
        config,
    ));

    let execution_id = orchestrator
        .start(workflow.id, TriggerType::Manual)
        .await
        .unwrap();

    let snapshot = loop {
        if let Some(s) = executions.fetch(execution_id).await.unwrap() {
            if s.status.is_terminal() {
                break s;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    };

    assert_eq!(snapshot.status, ExecutionState::Failed);
    assert!(snapshot
        .errors
        .iter()
        .any(|e| e.message.contains("deleted")));
    // Day one finished before the deletion was observed.
    assert_eq!(snapshot.days_processed, 1);
}

#[tokio::test]
async fn lifecycle_events_arrive_in_order_on_the_tenant_channel() {
    use flowsync_core::events::ExecutionEventKind;

    let harness = Harness::new(
        ScriptedFetcher::new(SourceKind::Ads, 1),
        ScriptedFetcher::new(SourceKind::Pos, 1),
    );
    let workflow = absolute_workflow(day(2024, 1, 1), day(2024, 1, 2));
    harness.store_workflow(&workflow).await;

    let mut rx = harness
        .orchestrator
        .publisher()
        .subscribe_scope(workflow.tenant_id, None);

    let execution_id = harness
        .orchestrator
        .start(workflow.id, TriggerType::Manual)
        .await
        .unwrap();
    harness.await_terminal(execution_id).await;
    // The terminal snapshot is persisted just before the terminal event is
    // published; give the publish a moment to land.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        assert_eq!(event.execution_id, execution_id);
        events.push(event);
    }

    let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
    assert_eq!(kinds.first(), Some(&ExecutionEventKind::Started));
    assert_eq!(kinds.last(), Some(&ExecutionEventKind::Completed));
    // Two days, two sources: four progress events, ads before POS each day.
    let progress_sources: Vec<_> = events
        .iter()
        .filter(|e| e.kind == ExecutionEventKind::Progress)
        .map(|e| e.payload["source"].as_str().map(str::to_owned))
        .collect();
    assert_eq!(
        progress_sources,
        vec![
            Some("ads".to_string()),
            Some("pos".to_string()),
            Some("ads".to_string()),
            Some("pos".to_string()),
        ]
    );
}
