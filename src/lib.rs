#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Flowsync Core
//!
//! Workflow execution engine for a multi-tenant analytics platform: drives
//! daily ads and point-of-sale data synchronization runs, tracks their
//! progress as durable execution records, streams lifecycle events to
//! subscribers, and relays inbound webhooks through a durable retry queue.
//!
//! ## Architecture
//!
//! A stored **workflow definition** describes which sources to pull, over
//! which date range, and who owns the result. Triggering one produces an
//! **execution**: a `Pending -> Running -> {Completed | Failed | Cancelled}`
//! state machine whose per-day, per-source progress is mutated by a single
//! tracker and persisted after every change. Per-day source failures are
//! recorded and skipped, never fatal; a fully failed day list is the only
//! thing that fails a run outright.
//!
//! ## Module Organization
//!
//! - [`models`] - Workflow definitions, execution records, webhook items
//! - [`range`] - Date range resolution (rolling / relative / absolute)
//! - [`state_machine`] - Execution lifecycle states and transition table
//! - [`tracker`] - Single-writer execution tracker with persist-after-mutation
//! - [`orchestration`] - The run loop: sources, limiters, cancellation
//! - [`sources`] - Source fetcher seam and per-source settings
//! - [`rate_limit`] - Minimum-delay pacing between source calls
//! - [`events`] - Lifecycle event fan-out to execution and tenant channels
//! - [`persistence`] - Execution and workflow stores (memory, Postgres)
//! - [`webhook`] - Queued webhook relay with retry, backoff, and fallback
//! - [`web`] - Axum API surface (triggers, status, SSE, webhook ingress)
//! - [`config`] - Engine configuration with environment overrides
//! - [`error`] - Structured error taxonomy
//! - [`logging`] - Structured tracing initialization

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod persistence;
pub mod range;
pub mod rate_limit;
pub mod sources;
pub mod state_machine;
pub mod tracker;
pub mod web;
pub mod webhook;

pub use config::FlowsyncConfig;
pub use error::{FlowsyncError, PersistenceError, Result};
pub use events::{EventPublisher, ExecutionEvent, ExecutionEventKind};
pub use models::{Execution, TriggerType, WorkflowDefinition};
pub use orchestration::WorkflowOrchestrator;
pub use range::DateRangeSpec;
pub use state_machine::{ExecutionSignal, ExecutionState};
pub use tracker::ExecutionTracker;
pub use webhook::{RelayQueueConfig, WebhookRelay};
