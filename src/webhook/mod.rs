//! # Webhook Relay Queue
//!
//! Inbound webhook payloads are durably queued and processed with retry,
//! exponential backoff, and a hard per-item timeout. When the queue backend
//! is unreachable and the fallback flag is set, payloads are processed
//! inline instead (degraded mode). Terminal items land in retention-bounded
//! completed/failed buckets; delivery is at-least-once and handlers own
//! idempotency.

pub mod queue;
pub mod relay;

pub use queue::{MemoryQueueBackend, PostgresQueueBackend, QueueBackend, QueueError, QueueStatus};
pub use relay::{HandlerError, IngestOutcome, WebhookHandler, WebhookRelay};

use std::time::Duration;

use crate::error::{FlowsyncError, Result};

/// Relay queue policy. Bounds follow the ingress contract: at least one
/// attempt, backoff no finer than 100ms, timeout no shorter than a second,
/// and both retention buckets keep at least one item.
#[derive(Debug, Clone)]
pub struct RelayQueueConfig {
    /// Process every payload synchronously, bypassing the queue entirely.
    pub inline_processing: bool,
    /// Process synchronously when the queue backend is unreachable.
    pub inline_fallback: bool,
    pub max_attempts: u32,
    pub backoff_delay_ms: u64,
    pub item_timeout_ms: u64,
    pub completed_retention: usize,
    pub failed_retention: usize,
}

impl Default for RelayQueueConfig {
    fn default() -> Self {
        Self {
            inline_processing: false,
            inline_fallback: true,
            max_attempts: 5,
            backoff_delay_ms: 1_000,
            item_timeout_ms: 30_000,
            completed_retention: 100,
            failed_retention: 100,
        }
    }
}

impl RelayQueueConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("FLOWSYNC_RELAY_INLINE_PROCESSING") {
            config.inline_processing = parse_flag("FLOWSYNC_RELAY_INLINE_PROCESSING", &v)?;
        }
        if let Ok(v) = std::env::var("FLOWSYNC_RELAY_INLINE_FALLBACK") {
            config.inline_fallback = parse_flag("FLOWSYNC_RELAY_INLINE_FALLBACK", &v)?;
        }
        if let Ok(v) = std::env::var("FLOWSYNC_RELAY_MAX_ATTEMPTS") {
            config.max_attempts = parse_number("FLOWSYNC_RELAY_MAX_ATTEMPTS", &v)?;
        }
        if let Ok(v) = std::env::var("FLOWSYNC_RELAY_BACKOFF_MS") {
            config.backoff_delay_ms = parse_number("FLOWSYNC_RELAY_BACKOFF_MS", &v)?;
        }
        if let Ok(v) = std::env::var("FLOWSYNC_RELAY_ITEM_TIMEOUT_MS") {
            config.item_timeout_ms = parse_number("FLOWSYNC_RELAY_ITEM_TIMEOUT_MS", &v)?;
        }
        if let Ok(v) = std::env::var("FLOWSYNC_RELAY_COMPLETED_RETENTION") {
            config.completed_retention = parse_number("FLOWSYNC_RELAY_COMPLETED_RETENTION", &v)?;
        }
        if let Ok(v) = std::env::var("FLOWSYNC_RELAY_FAILED_RETENTION") {
            config.failed_retention = parse_number("FLOWSYNC_RELAY_FAILED_RETENTION", &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts < 1 {
            return Err(FlowsyncError::configuration("max_attempts must be >= 1"));
        }
        if self.backoff_delay_ms < 100 {
            return Err(FlowsyncError::configuration(
                "backoff_delay_ms must be >= 100",
            ));
        }
        if self.item_timeout_ms < 1_000 {
            return Err(FlowsyncError::configuration(
                "item_timeout_ms must be >= 1000",
            ));
        }
        if self.completed_retention < 1 || self.failed_retention < 1 {
            return Err(FlowsyncError::configuration(
                "retention counts must be >= 1",
            ));
        }
        Ok(())
    }

    /// Exponential-style backoff before redelivering a failed item:
    /// `backoff_delay_ms * 2^(attempt-1)`, with the exponent capped so the
    /// delay never overflows.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.backoff_delay_ms.saturating_mul(1u64 << exponent))
    }

    pub fn item_timeout(&self) -> Duration {
        Duration::from_millis(self.item_timeout_ms)
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(FlowsyncError::configuration(format!(
            "invalid {name}: {other}"
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| FlowsyncError::configuration(format!("invalid {name}: {e}")))
}
