//! The core run loop: resolve days, drive both sources under their
//! limiters, funnel updates through the tracker, and publish progress.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::DashMap;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::FlowsyncConfig;
use crate::error::{FlowsyncError, Result};
use crate::events::{EventPublisher, ExecutionEvent, ExecutionEventKind};
use crate::models::{Execution, TriggerType};
use crate::persistence::{ExecutionStore, WorkflowStore};
use crate::sources::{SourceFetcher, SourceKind};
use crate::state_machine::ExecutionSignal;
use crate::tracker::ExecutionTracker;

use super::types::{RunPlan, ScopeContext, SettingsPair, SourcePlan};

/// Drives executions of stored workflow definitions.
///
/// One orchestrator serves many executions; each run gets its own tracker,
/// limiters, and cancel flag, so concurrent executions share no mutable
/// state beyond the stores.
pub struct WorkflowOrchestrator {
    workflows: Arc<dyn WorkflowStore>,
    executions: Arc<dyn ExecutionStore>,
    publisher: EventPublisher,
    ads_fetcher: Arc<dyn SourceFetcher>,
    pos_fetcher: Arc<dyn SourceFetcher>,
    config: FlowsyncConfig,
    cancel_flags: DashMap<Uuid, Arc<AtomicBool>>,
}

impl WorkflowOrchestrator {
    pub fn new(
        workflows: Arc<dyn WorkflowStore>,
        executions: Arc<dyn ExecutionStore>,
        publisher: EventPublisher,
        ads_fetcher: Arc<dyn SourceFetcher>,
        pos_fetcher: Arc<dyn SourceFetcher>,
        config: FlowsyncConfig,
    ) -> Self {
        Self {
            workflows,
            executions,
            publisher,
            ads_fetcher,
            pos_fetcher,
            config,
            cancel_flags: DashMap::new(),
        }
    }

    /// Start an execution of the given workflow. Returns the execution id
    /// immediately; the run proceeds on a spawned task.
    ///
    /// Malformed source settings fail fast before any execution record
    /// exists. A range that fails to resolve creates an execution that is
    /// immediately `failed` with a single recorded error.
    pub async fn start(self: &Arc<Self>, workflow_id: Uuid, trigger: TriggerType) -> Result<Uuid> {
        let definition = self
            .workflows
            .fetch(workflow_id)
            .await?
            .ok_or(FlowsyncError::WorkflowNotFound(workflow_id))?;
        let scope = ScopeContext::for_workflow(&definition);

        // Fail-fast validation, before an execution record exists.
        let settings = SettingsPair::parse(&definition)?;

        let today = self.config.today()?;
        let mut execution = Execution::new(workflow_id, definition.tenant_id, trigger);
        let execution_id = execution.id;

        let plan = match RunPlan::build(&definition, settings, today, self.config.default_min_delay_ms) {
            Ok(plan) => plan,
            Err(e) => {
                // Resolver failure: the execution exists but never runs.
                let tracker = ExecutionTracker::new(
                    execution,
                    self.executions.clone(),
                    self.config.terminal_persist_attempts,
                );
                tracker.persist_initial().await?;
                let snapshot = match tracker.fail_before_start(today, e.to_string()).await {
                    Ok(snapshot) => snapshot,
                    // Terminal write unconfirmed: report from the in-memory
                    // record, which is already failed.
                    Err(_) => tracker.snapshot().await,
                };
                self.publish(
                    ExecutionEventKind::Failed,
                    &snapshot,
                    json!({ "reason": e.to_string(), "status_label": snapshot.status_label() }),
                    &scope,
                );
                info!(execution_id = %execution_id, error = %e, "execution failed at range resolution");
                return Ok(execution_id);
            }
        };

        let (since, until) = plan.bounds();
        execution.since = Some(since);
        execution.until = Some(until);
        execution.total_days = plan.days.len() as u64;
        for source in &plan.sources {
            execution.counters_mut(source.kind).total = source.days.len() as u64;
        }

        let tracker = Arc::new(ExecutionTracker::new(
            execution,
            self.executions.clone(),
            self.config.terminal_persist_attempts,
        ));
        tracker.persist_initial().await?;

        let cancel = Arc::new(AtomicBool::new(false));
        self.cancel_flags.insert(execution_id, cancel.clone());

        info!(
            execution_id = %execution_id,
            workflow_id = %workflow_id,
            trigger = trigger.as_str(),
            since = %since,
            until = %until,
            total_days = plan.days.len(),
            "execution starting"
        );

        let orchestrator = self.clone();
        tokio::spawn(async move {
            orchestrator
                .run(tracker, plan, scope, workflow_id, cancel)
                .await;
        });

        Ok(execution_id)
    }

    /// Request cooperative cancellation. Takes effect at the next day
    /// boundary; an in-flight fetch is allowed to complete first. Returns
    /// false when the execution is not active.
    pub fn cancel(&self, execution_id: Uuid) -> bool {
        match self.cancel_flags.get(&execution_id) {
            Some(flag) => {
                flag.store(true, Ordering::SeqCst);
                info!(execution_id = %execution_id, "cancellation requested");
                true
            }
            None => false,
        }
    }

    async fn run(
        self: Arc<Self>,
        tracker: Arc<ExecutionTracker>,
        plan: RunPlan,
        scope: ScopeContext,
        workflow_id: Uuid,
        cancel: Arc<AtomicBool>,
    ) {
        let execution_id = tracker.execution_id().await;
        let started = match tracker.begin_run().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(execution_id = %execution_id, error = %e, "failed to begin run");
                self.retire(execution_id);
                return;
            }
        };
        self.publish(
            ExecutionEventKind::Started,
            &started,
            started.progress_summary(),
            &scope,
        );

        for day in plan.days.clone() {
            // Cooperative cancellation, checked at day boundaries only.
            if cancel.load(Ordering::SeqCst) {
                self.finish(&tracker, ExecutionSignal::Cancel, &scope).await;
                return;
            }

            match self.workflows.exists(workflow_id).await {
                Ok(true) => {}
                Ok(false) => {
                    let _ = tracker
                        .record_error(None, day, "workflow definition deleted mid-run")
                        .await;
                    self.finish(
                        &tracker,
                        ExecutionSignal::fail_with_error("workflow definition deleted mid-run"),
                        &scope,
                    )
                    .await;
                    return;
                }
                // A transient store failure must not kill the run.
                Err(e) => warn!(execution_id = %execution_id, error = %e, "workflow existence probe failed"),
            }

            let ads_plan = plan.source(SourceKind::Ads).filter(|p| p.runs_on(day));
            let pos_plan = plan.source(SourceKind::Pos).filter(|p| p.runs_on(day));

            // The two sources' I/O may overlap; only counter updates and
            // event emission are serialized, ads before POS.
            let (ads_result, pos_result) = tokio::join!(
                self.run_source(ads_plan, day),
                self.run_source(pos_plan, day)
            );

            for (kind, result) in SourceKind::ORDERED.into_iter().zip([ads_result, pos_result]) {
                match result {
                    None => {}
                    Some(Ok((fetched, processed))) => {
                        if let Ok(snapshot) =
                            tracker.record_success(kind, day, fetched, processed).await
                        {
                            let mut payload = snapshot.progress_summary();
                            payload["day"] = json!(day);
                            payload["source"] = json!(kind);
                            self.publish(ExecutionEventKind::Progress, &snapshot, payload, &scope);
                        }
                    }
                    Some(Err(err)) => {
                        let _ = tracker.record_error(Some(kind), day, err.to_string()).await;
                    }
                }
            }

            if tracker.advance_day(day).await.is_err() {
                break;
            }
        }

        self.finish(&tracker, ExecutionSignal::Complete, &scope).await;
    }

    /// Run one source for one day under its limiter. Returns `None` when
    /// the source does not participate in this day.
    async fn run_source(
        &self,
        plan: Option<&SourcePlan>,
        day: NaiveDate,
    ) -> Option<std::result::Result<(u64, u64), FlowsyncError>> {
        let plan = plan?;
        let fetcher: &Arc<dyn SourceFetcher> = match plan.kind {
            SourceKind::Ads => &self.ads_fetcher,
            SourceKind::Pos => &self.pos_fetcher,
        };

        plan.limiter.acquire().await;
        let records = match fetcher.fetch(day).await {
            Ok(records) => records,
            Err(e) => {
                return Some(Err(FlowsyncError::SourceFetch {
                    source: plan.kind,
                    day,
                    message: e.to_string(),
                }))
            }
        };
        let fetched = records.len() as u64;
        match fetcher.process(day, records).await {
            Ok(outcome) => Some(Ok((fetched, outcome.count))),
            Err(e) => Some(Err(FlowsyncError::SourceProcess {
                source: plan.kind,
                day,
                message: e.to_string(),
            })),
        }
    }

    async fn finish(
        &self,
        tracker: &ExecutionTracker,
        signal: ExecutionSignal,
        scope: &ScopeContext,
    ) {
        let execution_id = tracker.execution_id().await;
        match tracker.finish(signal.clone()).await {
            Ok(snapshot) => {
                let kind = match snapshot.status {
                    crate::state_machine::ExecutionState::Completed => {
                        ExecutionEventKind::Completed
                    }
                    crate::state_machine::ExecutionState::Cancelled => {
                        ExecutionEventKind::Cancelled
                    }
                    _ => ExecutionEventKind::Failed,
                };
                let mut payload = snapshot.progress_summary();
                payload["status_label"] = json!(snapshot.status_label());
                info!(
                    execution_id = %execution_id,
                    status_label = snapshot.status_label(),
                    days_processed = snapshot.days_processed,
                    error_count = snapshot.errors.len(),
                    "execution finished"
                );
                self.publish(kind, &snapshot, payload, scope);
            }
            Err(e) => {
                // The terminal write never got acknowledged: observers may
                // read a stale status, so the outcome is reported failed
                // with an explicit inconsistency marker.
                error!(execution_id = %execution_id, error = %e, "terminal snapshot unconfirmed");
                let snapshot = tracker.snapshot().await;
                let mut payload = snapshot.progress_summary();
                payload["status_label"] = json!("failed");
                payload["state_may_be_inconsistent"] = json!(true);
                self.publish(ExecutionEventKind::Failed, &snapshot, payload, scope);
            }
        }
        self.retire(execution_id);
    }

    fn publish(
        &self,
        kind: ExecutionEventKind,
        snapshot: &Execution,
        payload: serde_json::Value,
        scope: &ScopeContext,
    ) {
        let event = ExecutionEvent::new(snapshot.id, snapshot.tenant_id, kind, payload);
        self.publisher.publish(&event, &scope.team_ids);
    }

    fn retire(&self, execution_id: Uuid) {
        self.cancel_flags.remove(&execution_id);
        self.publisher.retire_execution(execution_id);
    }

    pub fn publisher(&self) -> &EventPublisher {
        &self.publisher
    }

    pub fn execution_store(&self) -> &Arc<dyn ExecutionStore> {
        &self.executions
    }
}
