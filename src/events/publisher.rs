//! Event fan-out to per-execution and per-tenant/team channels.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::trace;
use uuid::Uuid;

use super::ExecutionEvent;

/// Scope key for tenant-wide or tenant+team subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ScopeKey {
    tenant_id: Uuid,
    team_id: Option<Uuid>,
}

/// Fan-out publisher for execution lifecycle events.
///
/// Channels are created lazily on first publish or subscribe. Delivery is
/// best-effort: publishing with no subscribers, or past a lagging receiver,
/// is not an error. Per-channel ordering matches emission order; ordering
/// across different subscribers is not guaranteed.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    capacity: usize,
    execution_channels: Arc<DashMap<Uuid, broadcast::Sender<ExecutionEvent>>>,
    scope_channels: Arc<DashMap<ScopeKey, broadcast::Sender<ExecutionEvent>>>,
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            execution_channels: Arc::new(DashMap::new()),
            scope_channels: Arc::new(DashMap::new()),
        }
    }

    fn execution_sender(&self, execution_id: Uuid) -> broadcast::Sender<ExecutionEvent> {
        self.execution_channels
            .entry(execution_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    fn scope_sender(&self, key: ScopeKey) -> broadcast::Sender<ExecutionEvent> {
        self.scope_channels
            .entry(key)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Publish an event to its execution channel, the owning tenant's
    /// channel, and each named team's channel.
    pub fn publish(&self, event: &ExecutionEvent, team_ids: &[Uuid]) {
        trace!(
            execution_id = %event.execution_id,
            kind = event.kind.as_str(),
            "publishing execution event"
        );

        // send() fails when there are no subscribers; that is fine here.
        let _ = self.execution_sender(event.execution_id).send(event.clone());
        let _ = self
            .scope_sender(ScopeKey {
                tenant_id: event.tenant_id,
                team_id: None,
            })
            .send(event.clone());
        for team_id in team_ids {
            let _ = self
                .scope_sender(ScopeKey {
                    tenant_id: event.tenant_id,
                    team_id: Some(*team_id),
                })
                .send(event.clone());
        }
    }

    /// Subscribe to one execution's live events.
    pub fn subscribe_execution(&self, execution_id: Uuid) -> broadcast::Receiver<ExecutionEvent> {
        self.execution_sender(execution_id).subscribe()
    }

    /// Subscribe to all executions of a tenant, optionally narrowed to one
    /// team.
    pub fn subscribe_scope(
        &self,
        tenant_id: Uuid,
        team_id: Option<Uuid>,
    ) -> broadcast::Receiver<ExecutionEvent> {
        self.scope_sender(ScopeKey { tenant_id, team_id }).subscribe()
    }

    /// Number of live subscribers on one execution channel.
    pub fn execution_subscriber_count(&self, execution_id: Uuid) -> usize {
        self.execution_channels
            .get(&execution_id)
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }

    /// Drop the channel for a finished execution.
    pub fn retire_execution(&self, execution_id: Uuid) {
        self.execution_channels.remove(&execution_id);
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ExecutionEventKind;
    use serde_json::json;

    fn event(execution_id: Uuid, tenant_id: Uuid, kind: ExecutionEventKind) -> ExecutionEvent {
        ExecutionEvent::new(execution_id, tenant_id, kind, json!({}))
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_ok() {
        let publisher = EventPublisher::new(8);
        let e = event(Uuid::new_v4(), Uuid::new_v4(), ExecutionEventKind::Started);
        publisher.publish(&e, &[]);
    }

    #[tokio::test]
    async fn execution_subscriber_receives_in_emission_order() {
        let publisher = EventPublisher::new(8);
        let execution_id = Uuid::new_v4();
        let tenant_id = Uuid::new_v4();
        let mut rx = publisher.subscribe_execution(execution_id);

        publisher.publish(&event(execution_id, tenant_id, ExecutionEventKind::Started), &[]);
        publisher.publish(&event(execution_id, tenant_id, ExecutionEventKind::Progress), &[]);
        publisher.publish(&event(execution_id, tenant_id, ExecutionEventKind::Completed), &[]);

        assert_eq!(rx.recv().await.unwrap().kind, ExecutionEventKind::Started);
        assert_eq!(rx.recv().await.unwrap().kind, ExecutionEventKind::Progress);
        assert_eq!(rx.recv().await.unwrap().kind, ExecutionEventKind::Completed);
    }

    #[tokio::test]
    async fn tenant_channel_sees_all_executions_of_the_tenant() {
        let publisher = EventPublisher::new(8);
        let tenant_id = Uuid::new_v4();
        let mut rx = publisher.subscribe_scope(tenant_id, None);

        let first = event(Uuid::new_v4(), tenant_id, ExecutionEventKind::Started);
        let second = event(Uuid::new_v4(), tenant_id, ExecutionEventKind::Started);
        publisher.publish(&first, &[]);
        publisher.publish(&second, &[]);

        assert_eq!(rx.recv().await.unwrap().execution_id, first.execution_id);
        assert_eq!(rx.recv().await.unwrap().execution_id, second.execution_id);
    }

    #[tokio::test]
    async fn team_channel_only_sees_named_teams() {
        let publisher = EventPublisher::new(8);
        let tenant_id = Uuid::new_v4();
        let team_a = Uuid::new_v4();
        let team_b = Uuid::new_v4();
        let mut rx_a = publisher.subscribe_scope(tenant_id, Some(team_a));

        publisher.publish(
            &event(Uuid::new_v4(), tenant_id, ExecutionEventKind::Started),
            &[team_b],
        );
        let visible = event(Uuid::new_v4(), tenant_id, ExecutionEventKind::Started);
        publisher.publish(&visible, &[team_a]);

        assert_eq!(rx_a.recv().await.unwrap().execution_id, visible.execution_id);
    }

    #[tokio::test]
    async fn late_subscriber_misses_earlier_events() {
        let publisher = EventPublisher::new(8);
        let execution_id = Uuid::new_v4();
        let tenant_id = Uuid::new_v4();

        publisher.publish(&event(execution_id, tenant_id, ExecutionEventKind::Started), &[]);
        let mut rx = publisher.subscribe_execution(execution_id);
        publisher.publish(&event(execution_id, tenant_id, ExecutionEventKind::Progress), &[]);

        assert_eq!(rx.recv().await.unwrap().kind, ExecutionEventKind::Progress);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn subscriber_counting_and_retirement() {
        let publisher = EventPublisher::new(8);
        let execution_id = Uuid::new_v4();
        assert_eq!(publisher.execution_subscriber_count(execution_id), 0);

        let _rx = publisher.subscribe_execution(execution_id);
        assert_eq!(publisher.execution_subscriber_count(execution_id), 1);

        publisher.retire_execution(execution_id);
        assert_eq!(publisher.execution_subscriber_count(execution_id), 0);
    }
}
