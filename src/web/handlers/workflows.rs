//! Workflow trigger endpoint.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::models::TriggerType;
use crate::web::errors::ApiResult;
use crate::web::state::AppState;

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub execution_id: Uuid,
}

/// Manually trigger an execution: POST /v1/workflows/{id}/trigger
///
/// Returns 201 with the execution id as soon as the run is admitted; the
/// run itself proceeds in the background. The scheduler drives the same
/// orchestrator entry point with a `scheduled` trigger.
pub async fn trigger_workflow(
    State(state): State<AppState>,
    Path(workflow_id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<TriggerResponse>)> {
    let execution_id = state
        .orchestrator
        .start(workflow_id, TriggerType::Manual)
        .await?;
    info!(workflow_id = %workflow_id, execution_id = %execution_id, "manual trigger accepted");
    Ok((StatusCode::CREATED, Json(TriggerResponse { execution_id })))
}
