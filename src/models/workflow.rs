//! Workflow definition model.
//!
//! A tenant-owned configuration referencing both external sources. The
//! per-source settings are stored as raw JSON blobs and parsed into typed
//! settings when an orchestration starts; the definition itself stays
//! schema-light so admin tooling can evolve the blobs independently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::range::DateRangeSpec;

/// Who can see and trigger a workflow: a single team, or a set of named
/// teams sharing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OwnershipScope {
    Team { team_id: Uuid },
    Shared { team_ids: Vec<Uuid> },
}

impl OwnershipScope {
    /// All teams the scope names, in declaration order.
    pub fn team_ids(&self) -> Vec<Uuid> {
        match self {
            Self::Team { team_id } => vec![*team_id],
            Self::Shared { team_ids } => team_ids.clone(),
        }
    }
}

/// Stored workflow configuration. Immutable except via explicit update;
/// referenced by zero or more executions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    /// Raw ads-source settings blob; parsed at orchestration start.
    pub ads_settings: Value,
    /// Raw POS-source settings blob; parsed at orchestration start.
    pub pos_settings: Value,
    /// Shared date range, unless a source overrides it.
    pub range: DateRangeSpec,
    /// Cron-like schedule string consumed by the scheduler collaborator.
    pub schedule: Option<String>,
    pub scope: OwnershipScope,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowDefinition {
    /// Build a new definition with generated identity and timestamps.
    pub fn new(
        tenant_id: Uuid,
        name: impl Into<String>,
        ads_settings: Value,
        pos_settings: Value,
        range: DateRangeSpec,
        scope: OwnershipScope,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            name: name.into(),
            ads_settings,
            pos_settings,
            range,
            schedule: None,
            scope,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scope_team_ids() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(OwnershipScope::Team { team_id: a }.team_ids(), vec![a]);
        assert_eq!(
            OwnershipScope::Shared {
                team_ids: vec![a, b]
            }
            .team_ids(),
            vec![a, b]
        );
    }

    #[test]
    fn definition_round_trips_through_json() {
        let def = WorkflowDefinition::new(
            Uuid::new_v4(),
            "daily-ingest",
            json!({ "enabled": true }),
            json!({ "enabled": false }),
            DateRangeSpec::Rolling { offset_days: 1 },
            OwnershipScope::Team {
                team_id: Uuid::new_v4(),
            },
        );
        let json = serde_json::to_string(&def).unwrap();
        let parsed: WorkflowDefinition = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, def.id);
        assert_eq!(parsed.range, def.range);
    }
}
