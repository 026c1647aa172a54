//! In-memory store implementations.
//!
//! Used by tests and by deployments that run without a database. The
//! execution store supports scripted write failures so tracker retry
//! behavior can be exercised deterministically.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::PersistenceError;
use crate::models::{Execution, WorkflowDefinition};

use super::{ExecutionStore, WorkflowStore};

/// In-memory execution snapshot store.
#[derive(Debug, Default)]
pub struct MemoryExecutionStore {
    executions: RwLock<HashMap<Uuid, Execution>>,
    /// Number of upcoming `persist` calls that should fail.
    fail_next_writes: AtomicU32,
    write_count: AtomicU32,
}

impl MemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` persist calls fail with a backend error.
    pub fn fail_next_writes(&self, n: u32) {
        self.fail_next_writes.store(n, Ordering::SeqCst);
    }

    /// Total persist calls observed, including failed ones.
    pub fn write_count(&self) -> u32 {
        self.write_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExecutionStore for MemoryExecutionStore {
    async fn persist(&self, snapshot: &Execution) -> Result<(), PersistenceError> {
        self.write_count.fetch_add(1, Ordering::SeqCst);
        let remaining = self.fail_next_writes.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next_writes.store(remaining - 1, Ordering::SeqCst);
            return Err(PersistenceError::Backend(
                "injected write failure".to_string(),
            ));
        }
        self.executions
            .write()
            .insert(snapshot.id, snapshot.clone());
        Ok(())
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<Execution>, PersistenceError> {
        Ok(self.executions.read().get(&id).cloned())
    }

    async fn list_for_tenant(&self, tenant_id: Uuid) -> Result<Vec<Execution>, PersistenceError> {
        let mut executions: Vec<Execution> = self
            .executions
            .read()
            .values()
            .filter(|e| e.tenant_id == tenant_id)
            .cloned()
            .collect();
        executions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(executions)
    }
}

/// In-memory workflow definition store.
#[derive(Debug, Default)]
pub struct MemoryWorkflowStore {
    workflows: RwLock<HashMap<Uuid, WorkflowDefinition>>,
}

impl MemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStore for MemoryWorkflowStore {
    async fn fetch(&self, id: Uuid) -> Result<Option<WorkflowDefinition>, PersistenceError> {
        Ok(self.workflows.read().get(&id).cloned())
    }

    async fn exists(&self, id: Uuid) -> Result<bool, PersistenceError> {
        Ok(self.workflows.read().contains_key(&id))
    }

    async fn upsert(&self, definition: &WorkflowDefinition) -> Result<(), PersistenceError> {
        self.workflows
            .write()
            .insert(definition.id, definition.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), PersistenceError> {
        self.workflows.write().remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TriggerType;
    use crate::range::DateRangeSpec;
    use crate::models::OwnershipScope;
    use serde_json::json;

    #[tokio::test]
    async fn execution_store_round_trip() {
        let store = MemoryExecutionStore::new();
        let exec = Execution::new(Uuid::new_v4(), Uuid::new_v4(), TriggerType::Manual);
        store.persist(&exec).await.unwrap();

        let fetched = store.fetch(exec.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, exec.id);
        assert!(store.fetch(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let store = MemoryExecutionStore::new();
        let exec = Execution::new(Uuid::new_v4(), Uuid::new_v4(), TriggerType::Manual);

        store.fail_next_writes(1);
        assert!(store.persist(&exec).await.is_err());
        assert!(store.persist(&exec).await.is_ok());
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn list_for_tenant_filters_and_sorts() {
        let store = MemoryExecutionStore::new();
        let tenant = Uuid::new_v4();
        let a = Execution::new(Uuid::new_v4(), tenant, TriggerType::Manual);
        let b = Execution::new(Uuid::new_v4(), tenant, TriggerType::Scheduled);
        let other = Execution::new(Uuid::new_v4(), Uuid::new_v4(), TriggerType::Manual);
        for exec in [&a, &b, &other] {
            store.persist(exec).await.unwrap();
        }

        let listed = store.list_for_tenant(tenant).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|e| e.tenant_id == tenant));
    }

    #[tokio::test]
    async fn workflow_store_exists_and_delete() {
        let store = MemoryWorkflowStore::new();
        let def = WorkflowDefinition::new(
            Uuid::new_v4(),
            "wf",
            json!({"enabled": true}),
            json!({"enabled": true}),
            DateRangeSpec::Rolling { offset_days: 0 },
            OwnershipScope::Team {
                team_id: Uuid::new_v4(),
            },
        );
        store.upsert(&def).await.unwrap();
        assert!(store.exists(def.id).await.unwrap());

        store.delete(def.id).await.unwrap();
        assert!(!store.exists(def.id).await.unwrap());
        assert!(store.fetch(def.id).await.unwrap().is_none());
    }
}
