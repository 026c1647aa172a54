//! # Execution State Machine
//!
//! Pure transition table for the execution lifecycle:
//! `Pending -> Running -> { Completed | Failed | Cancelled }`.
//! Invalid transitions are rejected; terminal states accept nothing.

pub mod signals;
pub mod states;

pub use signals::ExecutionSignal;
pub use states::ExecutionState;

use crate::error::FlowsyncError;

/// Determine the target state for a signal, rejecting invalid transitions.
pub fn determine_target_state(
    current: ExecutionState,
    signal: &ExecutionSignal,
) -> Result<ExecutionState, FlowsyncError> {
    let target = match (current, signal) {
        (ExecutionState::Pending, ExecutionSignal::Start) => ExecutionState::Running,
        (ExecutionState::Running, ExecutionSignal::Complete) => ExecutionState::Completed,

        // A run can fail before it starts (resolver failure) or while running.
        (ExecutionState::Pending, ExecutionSignal::Fail(_)) => ExecutionState::Failed,
        (ExecutionState::Running, ExecutionSignal::Fail(_)) => ExecutionState::Failed,

        (ExecutionState::Pending, ExecutionSignal::Cancel) => ExecutionState::Cancelled,
        (ExecutionState::Running, ExecutionSignal::Cancel) => ExecutionState::Cancelled,

        (from, signal) => {
            return Err(FlowsyncError::StateTransition {
                from: from.to_string(),
                signal: signal.signal_type().to_string(),
            })
        }
    };

    Ok(target)
}
