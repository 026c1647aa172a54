//! Live event streams over SSE.

use std::convert::Infallible;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::error::FlowsyncError;
use crate::events::ExecutionEvent;
use crate::persistence::ExecutionStore;
use crate::web::errors::ApiResult;
use crate::web::state::AppState;

fn sse_event(event: &ExecutionEvent) -> Option<Event> {
    let data = serde_json::to_string(event).ok()?;
    Some(Event::default().event(event.kind.as_str()).data(data))
}

/// One execution's events: GET /v1/executions/{id}/events
///
/// Emits a `snapshot` event of the latest persisted state first, then live
/// events. The live subscription is opened before the snapshot is read so
/// no transition falls between the two; a subscriber may therefore see an
/// event already reflected in the snapshot, but never a gap.
pub async fn execution_events(
    State(state): State<AppState>,
    Path(execution_id): Path<Uuid>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let live = state.publisher().subscribe_execution(execution_id);

    let execution = state
        .executions()
        .fetch(execution_id)
        .await
        .map_err(FlowsyncError::from)?
        .ok_or(FlowsyncError::ExecutionNotFound(execution_id))?;
    let snapshot = ExecutionEvent::snapshot_of(&execution);

    let stream = stream::iter(sse_event(&snapshot))
        .chain(
            BroadcastStream::new(live)
                .filter_map(|msg| async move { msg.ok().and_then(|ev| sse_event(&ev)) }),
        )
        .map(Ok::<Event, Infallible>);

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

#[derive(Debug, Deserialize)]
pub struct ScopeQuery {
    pub team_id: Option<Uuid>,
}

/// Snapshot events for every persisted execution of one tenant, newest
/// first, matching the store's listing order.
async fn tenant_snapshots(
    store: &dyn ExecutionStore,
    tenant_id: Uuid,
) -> Result<Vec<ExecutionEvent>, FlowsyncError> {
    let executions = store.list_for_tenant(tenant_id).await?;
    Ok(executions.iter().map(ExecutionEvent::snapshot_of).collect())
}

/// Tenant or tenant+team event stream:
/// GET /v1/tenants/{tenant_id}/events[?team_id=]
///
/// Like the per-execution stream, opens with `snapshot` events before any
/// live ones, and the live subscription is taken before the snapshots are
/// read. Snapshots cover the whole tenant even on a team-narrowed stream;
/// persisted records carry no team ids, so `team_id` filters live events
/// only.
pub async fn tenant_events(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    Query(query): Query<ScopeQuery>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let live = state.publisher().subscribe_scope(tenant_id, query.team_id);

    let snapshots = tenant_snapshots(state.executions().as_ref(), tenant_id).await?;

    let stream = stream::iter(snapshots.iter().filter_map(sse_event).collect::<Vec<_>>())
        .chain(
            BroadcastStream::new(live)
                .filter_map(|msg| async move { msg.ok().and_then(|ev| sse_event(&ev)) }),
        )
        .map(Ok::<Event, Infallible>);

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
