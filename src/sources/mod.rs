//! # Source Capability Layer
//!
//! The engine ingests from exactly two external providers: the ads platform
//! and the point-of-sale platform. Concrete API clients live outside this
//! crate and plug in through [`SourceFetcher`]; the orchestrator only sees
//! the capability contract. Per-source settings are stored as JSON blobs on
//! the workflow definition and parsed into typed settings at orchestration
//! start, rejecting malformed shapes up front.

use std::fmt;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FlowsyncError, Result};
use crate::range::DateRangeSpec;

/// The two external data providers a workflow can ingest from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Ads,
    Pos,
}

impl SourceKind {
    /// Fixed processing order within a day: ads before POS.
    pub const ORDERED: [SourceKind; 2] = [SourceKind::Ads, SourceKind::Pos];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ads => "ads",
            Self::Pos => "pos",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::error::Error for SourceKind {}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "ads" => Ok(Self::Ads),
            "pos" => Ok(Self::Pos),
            _ => Err(format!("invalid source kind: {s}")),
        }
    }
}

/// Failure reported by a concrete fetcher. The orchestrator records it as a
/// per-day error on the execution and moves on.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct SourceCallError(pub String);

impl SourceCallError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Result of processing one day's fetched records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessOutcome {
    /// Number of records applied by the consumer.
    pub count: u64,
}

/// Capability contract for one external data provider.
///
/// Both calls are fallible and I/O-bound; implementations must be safe to
/// invoke concurrently with the other source's fetcher.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Fetch raw records for one calendar day.
    async fn fetch(&self, day: NaiveDate) -> std::result::Result<Vec<Value>, SourceCallError>;

    /// Process previously fetched records, returning how many were applied.
    async fn process(
        &self,
        day: NaiveDate,
        records: Vec<Value>,
    ) -> std::result::Result<ProcessOutcome, SourceCallError>;
}

/// Typed per-source settings, parsed from the definition's JSON blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceSettings {
    pub enabled: bool,
    /// Minimum delay between this source's outbound calls. Falls back to
    /// the tenant default when absent.
    #[serde(default)]
    pub min_delay_ms: Option<u64>,
    /// Per-source override of the workflow's shared date range.
    #[serde(default)]
    pub range_override: Option<DateRangeSpec>,
}

impl SourceSettings {
    /// Parse a stored JSON blob, rejecting malformed or partial shapes.
    pub fn parse(kind: SourceKind, raw: &Value) -> Result<Self> {
        serde_json::from_value(raw.clone()).map_err(|e| {
            FlowsyncError::validation(format!("malformed {kind} source settings: {e}"))
        })
    }
}
