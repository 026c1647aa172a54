//! HTTP handler modules for the flowsync API surface.

pub mod events;
pub mod executions;
pub mod health;
pub mod webhooks;
pub mod workflows;
