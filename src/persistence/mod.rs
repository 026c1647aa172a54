//! # Persistence Contracts
//!
//! Storage seams for workflow definitions and execution snapshots. The
//! tracker is the sole writer of execution snapshots; readers (status
//! queries, event subscribers) never write. The engine ships an in-memory
//! implementation for tests and degraded operation and a Postgres
//! implementation for production.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::PersistenceError;
use crate::models::{Execution, WorkflowDefinition};

/// Durable storage for execution snapshots.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Upsert the full snapshot. Called after every tracker mutation.
    async fn persist(&self, snapshot: &Execution) -> Result<(), PersistenceError>;

    /// Read the latest persisted snapshot.
    async fn fetch(&self, id: Uuid) -> Result<Option<Execution>, PersistenceError>;

    /// Latest snapshots for one tenant, newest first.
    async fn list_for_tenant(&self, tenant_id: Uuid) -> Result<Vec<Execution>, PersistenceError>;
}

/// Read access to stored workflow definitions.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn fetch(&self, id: Uuid) -> Result<Option<WorkflowDefinition>, PersistenceError>;

    /// Cheap existence probe used at day boundaries to detect mid-run
    /// deletion.
    async fn exists(&self, id: Uuid) -> Result<bool, PersistenceError>;

    async fn upsert(&self, definition: &WorkflowDefinition) -> Result<(), PersistenceError>;

    async fn delete(&self, id: Uuid) -> Result<(), PersistenceError>;
}

pub use memory::{MemoryExecutionStore, MemoryWorkflowStore};
pub use postgres::{PostgresExecutionStore, PostgresWorkflowStore};
