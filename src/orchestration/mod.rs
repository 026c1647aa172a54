//! # Workflow Orchestration
//!
//! The orchestrator consumes the date range resolver's output, drives both
//! source fetchers under their rate limiters, funnels every record update
//! through a single-writer tracker, and publishes lifecycle events.

pub mod orchestrator;
pub mod types;

pub use orchestrator::WorkflowOrchestrator;
pub use types::{RunPlan, ScopeContext, SettingsPair, SourcePlan};
