use serde::{Deserialize, Serialize};

/// Signals that can drive execution state transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ExecutionSignal {
    /// Begin iterating the resolved day list
    Start,
    /// All days exhausted
    Complete,
    /// Unrecoverable condition with an error message
    Fail(String),
    /// Cooperative cancellation observed at a boundary
    Cancel,
}

impl ExecutionSignal {
    /// String representation of the signal type for logging
    pub fn signal_type(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Complete => "complete",
            Self::Fail(_) => "fail",
            Self::Cancel => "cancel",
        }
    }

    /// Extract the error message if this is a failure signal
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Fail(msg) => Some(msg),
            _ => None,
        }
    }

    /// Check if this signal targets a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Fail(_) | Self::Cancel)
    }

    /// Create a failure signal with the given error message
    pub fn fail_with_error(error: impl Into<String>) -> Self {
        Self::Fail(error.into())
    }
}
