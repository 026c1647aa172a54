//! Execution status and cancellation endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::FlowsyncError;
use crate::web::errors::{ApiError, ApiResult};
use crate::web::state::AppState;

/// Execution status: GET /v1/executions/{id}
///
/// Returns the latest persisted snapshot plus the derived `status_label`
/// (which reports `completed_with_errors` for partially failed runs).
pub async fn get_execution(
    State(state): State<AppState>,
    Path(execution_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let execution = state
        .executions()
        .fetch(execution_id)
        .await
        .map_err(FlowsyncError::from)?
        .ok_or(FlowsyncError::ExecutionNotFound(execution_id))?;

    let mut body = serde_json::to_value(&execution)
        .map_err(|e| ApiError::Internal(format!("snapshot serialization: {e}")))?;
    body["status_label"] = json!(execution.status_label());
    Ok(Json(body))
}

/// Request cooperative cancellation: POST /v1/executions/{id}/cancel
///
/// 202 when the request was registered; 404 when the execution is not
/// currently active (already terminal or unknown).
pub async fn cancel_execution(
    State(state): State<AppState>,
    Path(execution_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if state.orchestrator.cancel(execution_id) {
        Ok(StatusCode::ACCEPTED)
    } else {
        Err(ApiError::not_found(format!(
            "no active execution {execution_id}"
        )))
    }
}
