//! Webhook ingress and queue status endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::web::errors::ApiResult;
use crate::web::state::AppState;
use crate::webhook::{IngestOutcome, QueueStatus};

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub item_id: Uuid,
    pub outcome: IngestOutcome,
}

/// Webhook ingress: POST /v1/webhooks/{tenant_id}
///
/// 202 when the payload was enqueued or processed inline as a fallback;
/// 503 when the queue backend is down and fallback is disabled.
pub async fn ingest_webhook(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    Json(payload): Json<Value>,
) -> ApiResult<(StatusCode, Json<IngestResponse>)> {
    let (item_id, outcome) = state.relay.ingest(tenant_id, payload).await?;
    debug!(tenant_id = %tenant_id, item_id = %item_id, ?outcome, "webhook accepted");
    Ok((StatusCode::ACCEPTED, Json(IngestResponse { item_id, outcome })))
}

/// Queue depth and terminal buckets: GET /v1/webhooks/{tenant_id}/status
pub async fn webhook_status(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> ApiResult<Json<QueueStatus>> {
    let status = state.relay.status(tenant_id).await?;
    Ok(Json(status))
}
