//! # Web API
//!
//! Axum surface over the orchestrator, event publisher, and webhook relay:
//! manual triggers, execution status, SSE event streams, webhook ingress,
//! and queue status.

pub mod errors;
pub mod handlers;
pub mod state;

use axum::routing::{get, post};
use axum::Router;

pub use errors::{ApiError, ApiResult};
pub use state::AppState;

/// Build the full API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route(
            "/v1/workflows/{id}/trigger",
            post(handlers::workflows::trigger_workflow),
        )
        .route(
            "/v1/executions/{id}",
            get(handlers::executions::get_execution),
        )
        .route(
            "/v1/executions/{id}/cancel",
            post(handlers::executions::cancel_execution),
        )
        .route(
            "/v1/executions/{id}/events",
            get(handlers::events::execution_events),
        )
        .route(
            "/v1/tenants/{tenant_id}/events",
            get(handlers::events::tenant_events),
        )
        .route(
            "/v1/webhooks/{tenant_id}",
            post(handlers::webhooks::ingest_webhook),
        )
        .route(
            "/v1/webhooks/{tenant_id}/status",
            get(handlers::webhooks::webhook_status),
        )
        .with_state(state)
}
