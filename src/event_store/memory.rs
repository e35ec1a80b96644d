//! In-memory event and snapshot stores
//!
//! Used by tests and by database-less runs. Ordering matches the Postgres
//! stores: ascending `created_at`, ties in insertion order.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::repository::{EventStore, NewMaskEvent, StoredEvent};
use super::snapshot::{Snapshot, SnapshotStore};
use super::EventStoreError;

#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    events: RwLock<HashMap<Uuid, Vec<StoredEvent>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, event: NewMaskEvent) -> Result<StoredEvent, EventStoreError> {
        let stored = event.into_stored();
        let mut events = self.events.write().await;
        let history = events.entry(stored.aggregate_id).or_default();

        // Insert after every event with created_at <= new one, keeping insertion order on ties
        let position = history.partition_point(|e| e.created_at <= stored.created_at);
        history.insert(position, stored.clone());

        Ok(stored)
    }

    async fn events_for(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, EventStoreError> {
        let events = self.events.read().await;
        Ok(events.get(&aggregate_id).cloned().unwrap_or_default())
    }

    async fn events_up_to(
        &self,
        aggregate_id: Uuid,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let events = self.events.read().await;
        Ok(events
            .get(&aggregate_id)
            .map(|history| {
                history
                    .iter()
                    .take_while(|e| e.created_at <= as_of)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    snapshots: RwLock<HashMap<Uuid, Snapshot>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn capture(&self, snapshot: Snapshot) -> Result<Snapshot, EventStoreError> {
        let mut snapshots = self.snapshots.write().await;
        if snapshots.contains_key(&snapshot.aggregate_id) {
            return Err(EventStoreError::SnapshotExists(snapshot.aggregate_id));
        }
        snapshots.insert(snapshot.aggregate_id, snapshot.clone());
        Ok(snapshot)
    }

    async fn initial_for(&self, aggregate_id: Uuid) -> Result<Option<Snapshot>, EventStoreError> {
        Ok(self.snapshots.read().await.get(&aggregate_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EventType;
    use chrono::Duration;
    use serde_json::json;

    fn color_event(aggregate_id: Uuid, color: &str, at: DateTime<Utc>) -> NewMaskEvent {
        NewMaskEvent::new(aggregate_id, Uuid::new_v4(), "color_updated", json!({"color": color}))
            .unwrap()
            .at(at)
    }

    #[tokio::test]
    async fn test_events_ordered_by_created_at_then_insertion() {
        let store = InMemoryEventStore::new();
        let id = Uuid::new_v4();
        let t0 = Utc::now();

        store.append(color_event(id, "late", t0 + Duration::seconds(10))).await.unwrap();
        store.append(color_event(id, "tie-1", t0)).await.unwrap();
        store.append(color_event(id, "tie-2", t0)).await.unwrap();

        let colors: Vec<_> = store
            .events_for(id)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.data["color"].clone())
            .collect();
        assert_eq!(colors, vec![json!("tie-1"), json!("tie-2"), json!("late")]);
    }

    #[tokio::test]
    async fn test_events_up_to_is_a_prefix() {
        let store = InMemoryEventStore::new();
        let id = Uuid::new_v4();
        let t0 = Utc::now();

        store.append(color_event(id, "A", t0)).await.unwrap();
        store.append(color_event(id, "B", t0 + Duration::seconds(5))).await.unwrap();

        let events = store.events_up_to(id, t0 + Duration::seconds(1)).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data["color"], json!("A"));

        let events = store.events_up_to(id, t0 + Duration::seconds(5)).await.unwrap();
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn test_latest_of_type() {
        let store = InMemoryEventStore::new();
        let id = Uuid::new_v4();
        let t0 = Utc::now();

        store.append(color_event(id, "A", t0)).await.unwrap();
        store.append(color_event(id, "B", t0 + Duration::seconds(1))).await.unwrap();

        let latest = store
            .latest_of_type(id, EventType::ColorUpdated)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.data["color"], json!("B"));

        let none = store
            .latest_of_type(id, EventType::BreakdownUpdated)
            .await
            .unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_snapshot_captured_once() {
        let store = InMemorySnapshotStore::new();
        let id = Uuid::new_v4();

        store.capture(Snapshot::capture(id, Default::default(), None)).await.unwrap();
        let second = store.capture(Snapshot::capture(id, Default::default(), None)).await;

        assert!(matches!(second, Err(EventStoreError::SnapshotExists(_))));
        assert!(store.initial_for(id).await.unwrap().is_some());
        assert!(store.initial_for(Uuid::new_v4()).await.unwrap().is_none());
    }
}
