//! Data model layer: workflow definitions, execution records, and webhook
//! queue items.

pub mod execution;
pub mod webhook;
pub mod workflow;

pub use execution::{Execution, ExecutionErrorEntry, SourceCounters, TriggerType};
pub use webhook::{WebhookItemState, WebhookQueueItem};
pub use workflow::{OwnershipScope, WorkflowDefinition};
