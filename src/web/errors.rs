//! # Web API Error Types
//!
//! Maps the engine's error taxonomy onto HTTP status codes. Leverages
//! thiserror for structured error handling and Axum's IntoResponse for the
//! HTTP conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::error::FlowsyncError;

/// Web API specific errors with HTTP status code mappings.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Service temporarily unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }
}

impl From<FlowsyncError> for ApiError {
    fn from(err: FlowsyncError) -> Self {
        match err {
            FlowsyncError::Validation(msg) => Self::BadRequest(msg),
            FlowsyncError::WorkflowNotFound(id) => Self::NotFound(format!("workflow {id}")),
            FlowsyncError::ExecutionNotFound(id) => Self::NotFound(format!("execution {id}")),
            FlowsyncError::QueueBackendUnavailable(msg) => Self::ServiceUnavailable(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, error_code, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.as_str()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.as_str()),
            ApiError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                msg.as_str(),
            ),
            // Internal detail stays in the logs, never in the response body.
            ApiError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error",
            ),
        };

        if let ApiError::Internal(detail) = &self {
            tracing::error!(error = %detail, "internal error serving request");
        }

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status_code, body).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
