use serde::{Deserialize, Serialize};
use std::fmt;

/// Execution state definitions. Transitions are monotonic: once a terminal
/// state is reached no further transition is possible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    /// Initial state when the execution record is created
    Pending,
    /// The orchestrator is iterating the day list
    Running,
    /// All days exhausted; per-day errors do not prevent this state
    Completed,
    /// Unrecoverable condition (resolver failure, deleted workflow,
    /// unconfirmed terminal snapshot)
    Failed,
    /// A cancel request was observed at a day/source boundary
    Cancelled,
}

impl ExecutionState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Check if this is an active state (the run loop is iterating)
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExecutionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("invalid execution state: {s}")),
        }
    }
}

impl Default for ExecutionState {
    fn default() -> Self {
        Self::Pending
    }
}
