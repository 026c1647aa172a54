//! Shared application state for the web layer.

use std::sync::Arc;

use crate::events::EventPublisher;
use crate::orchestration::WorkflowOrchestrator;
use crate::persistence::ExecutionStore;
use crate::webhook::WebhookRelay;

/// Everything the handlers need, cheap to clone per request.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<WorkflowOrchestrator>,
    pub relay: Arc<WebhookRelay>,
}

impl AppState {
    pub fn new(orchestrator: Arc<WorkflowOrchestrator>, relay: Arc<WebhookRelay>) -> Self {
        Self { orchestrator, relay }
    }

    pub fn executions(&self) -> &Arc<dyn ExecutionStore> {
        self.orchestrator.execution_store()
    }

    pub fn publisher(&self) -> &EventPublisher {
        self.orchestrator.publisher()
    }
}
