//! # Error Taxonomy
//!
//! Structured error types for the execution engine and webhook relay.
//! Validation and configuration problems fail fast before a run starts;
//! per-day source failures are recorded on the execution and never abort it.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::sources::SourceKind;

/// Persistence failures from an execution or queue store.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PersistenceError {
    /// The backing store rejected or lost a write.
    #[error("persistence failure: {0}")]
    Backend(String),

    /// The terminal execution snapshot could not be confirmed durable.
    /// The in-memory state may disagree with what observers can read.
    #[error("terminal snapshot unconfirmed after {attempts} attempts: {message}")]
    TerminalSnapshotUnconfirmed { attempts: u32, message: String },
}

impl PersistenceError {
    /// True when the durable terminal write could not be acknowledged.
    pub fn is_terminal_unconfirmed(&self) -> bool {
        matches!(self, Self::TerminalSnapshotUnconfirmed { .. })
    }
}

/// Top-level error type for the flowsync engine.
#[derive(Debug, thiserror::Error)]
pub enum FlowsyncError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid state transition from {from} on {signal}")]
    StateTransition { from: String, signal: String },

    #[error("{source} fetch failed for {day}: {message}")]
    SourceFetch {
        source: SourceKind,
        day: NaiveDate,
        message: String,
    },

    #[error("{source} processing failed for {day}: {message}")]
    SourceProcess {
        source: SourceKind,
        day: NaiveDate,
        message: String,
    },

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("queue backend unavailable: {0}")]
    QueueBackendUnavailable(String),

    #[error("webhook handler timed out after {0}ms")]
    HandlerTimeout(u64),

    #[error("webhook handler failed: {0}")]
    HandlerFailure(String),

    #[error("workflow {0} not found")]
    WorkflowNotFound(Uuid),

    #[error("execution {0} not found")]
    ExecutionNotFound(Uuid),
}

impl FlowsyncError {
    /// Convenience constructor for validation failures.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Convenience constructor for configuration failures.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, FlowsyncError>;
