//! Run planning: parse the definition's source blobs, resolve day lists,
//! and build the per-source limiters before the run loop starts.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::{FlowsyncError, Result};
use crate::models::WorkflowDefinition;
use crate::rate_limit::SourceRateLimiter;
use crate::sources::{SourceKind, SourceSettings};

/// Explicit tenant/team context threaded through every orchestrator and
/// publisher call. The engine holds no ambient scope state.
#[derive(Debug, Clone)]
pub struct ScopeContext {
    pub tenant_id: Uuid,
    pub team_ids: Vec<Uuid>,
}

impl ScopeContext {
    pub fn for_workflow(definition: &WorkflowDefinition) -> Self {
        Self {
            tenant_id: definition.tenant_id,
            team_ids: definition.scope.team_ids(),
        }
    }
}

/// Both sources' parsed settings for one definition. Parsing is the
/// fail-fast stage: it runs once, before any execution record exists.
pub struct SettingsPair {
    pub ads: SourceSettings,
    pub pos: SourceSettings,
}

impl SettingsPair {
    /// Parse both settings blobs and reject a fully disabled definition.
    pub fn parse(definition: &WorkflowDefinition) -> Result<Self> {
        let ads = SourceSettings::parse(SourceKind::Ads, &definition.ads_settings)?;
        let pos = SourceSettings::parse(SourceKind::Pos, &definition.pos_settings)?;
        if !ads.enabled && !pos.enabled {
            return Err(FlowsyncError::validation(
                "workflow has no enabled sources",
            ));
        }
        Ok(Self { ads, pos })
    }
}

/// One enabled source's share of a run.
pub struct SourcePlan {
    pub kind: SourceKind,
    pub settings: SourceSettings,
    /// The days this source runs; a subset of the run's day list when the
    /// source overrides the shared range.
    pub days: BTreeSet<NaiveDate>,
    pub limiter: Arc<SourceRateLimiter>,
}

impl SourcePlan {
    pub fn runs_on(&self, day: NaiveDate) -> bool {
        self.days.contains(&day)
    }
}

/// Fully validated plan for one execution: parsed settings, resolved day
/// lists, and limiters. Building the plan performs every fail-fast check.
pub struct RunPlan {
    /// Union of the per-source day lists, ascending and gap-checked per
    /// source (each source's own list is contiguous by construction).
    pub days: Vec<NaiveDate>,
    pub sources: Vec<SourcePlan>,
}

impl RunPlan {
    /// Resolve day lists and build limiters for every enabled source.
    ///
    /// Takes the already-parsed settings so validation runs exactly once,
    /// in [`SettingsPair::parse`]. A resolver failure surfaces here; the
    /// orchestrator converts it into an immediately failed execution.
    pub fn build(
        definition: &WorkflowDefinition,
        settings: SettingsPair,
        today: NaiveDate,
        default_min_delay_ms: u64,
    ) -> Result<Self> {
        let mut sources = Vec::new();
        for (kind, settings) in [
            (SourceKind::Ads, settings.ads),
            (SourceKind::Pos, settings.pos),
        ] {
            if !settings.enabled {
                continue;
            }
            let range = settings
                .range_override
                .as_ref()
                .unwrap_or(&definition.range);
            let days: BTreeSet<NaiveDate> = range.resolve(today)?.into_iter().collect();
            let min_delay = settings.min_delay_ms.unwrap_or(default_min_delay_ms);
            sources.push(SourcePlan {
                kind,
                settings,
                days,
                limiter: Arc::new(SourceRateLimiter::new(min_delay)),
            });
        }

        let mut union: BTreeSet<NaiveDate> = BTreeSet::new();
        for source in &sources {
            union.extend(source.days.iter().copied());
        }
        if union.is_empty() {
            return Err(FlowsyncError::validation("resolved day list is empty"));
        }

        Ok(Self {
            days: union.into_iter().collect(),
            sources,
        })
    }

    pub fn bounds(&self) -> (NaiveDate, NaiveDate) {
        // days is non-empty by construction
        (self.days[0], *self.days.last().expect("non-empty day list"))
    }

    pub fn source(&self, kind: SourceKind) -> Option<&SourcePlan> {
        self.sources.iter().find(|s| s.kind == kind)
    }
}
