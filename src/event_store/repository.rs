//! Event Store Repository
//!
//! Append-only log of mask events keyed by aggregate id.
//! Events are ordered per aggregate by `created_at`, ties broken by
//! insertion order.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{EventType, MaskEvent};

use super::EventStoreError;

/// Stored event from the database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub id: Uuid,
    pub aggregate_id: Uuid,
    pub actor_id: Uuid,
    pub event_type: String,
    pub data: Value,
    pub created_at: DateTime<Utc>,
}

impl StoredEvent {
    /// Decode into a typed event.
    ///
    /// Returns `Ok(None)` for event types this build does not know, so
    /// older readers skip newer events instead of failing.
    pub fn decode(&self) -> Result<Option<MaskEvent>, crate::domain::DomainError> {
        let Ok(event_type) = self.event_type.parse::<EventType>() else {
            return Ok(None);
        };
        MaskEvent::from_typed(event_type, &self.data).map(Some)
    }
}

/// Event waiting to be appended
///
/// Only constructible through validation, so a `NewMaskEvent` always has a
/// known type and a well-formed payload.
#[derive(Debug, Clone)]
pub struct NewMaskEvent {
    pub id: Uuid,
    pub aggregate_id: Uuid,
    pub actor_id: Uuid,
    pub event: MaskEvent,
    pub data: Value,
    pub created_at: DateTime<Utc>,
}

impl NewMaskEvent {
    /// Validate a raw event for appending
    pub fn new(
        aggregate_id: Uuid,
        actor_id: Uuid,
        event_type: &str,
        data: Value,
    ) -> Result<Self, EventStoreError> {
        let event = MaskEvent::parse(event_type, &data)?;
        Ok(Self {
            id: Uuid::new_v4(),
            aggregate_id,
            actor_id,
            event,
            data,
            created_at: Utc::now(),
        })
    }

    /// Override the creation time (imports and replays of historical data)
    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn event_type(&self) -> EventType {
        self.event.event_type()
    }

    pub(crate) fn into_stored(self) -> StoredEvent {
        StoredEvent {
            id: self.id,
            aggregate_id: self.aggregate_id,
            actor_id: self.actor_id,
            event_type: self.event.event_type().as_str().to_string(),
            data: self.data,
            created_at: self.created_at,
        }
    }
}

/// Event Store for persisting and retrieving mask events
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Durably append a validated event
    async fn append(&self, event: NewMaskEvent) -> Result<StoredEvent, EventStoreError>;

    /// All events for an aggregate in ascending order
    async fn events_for(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Prefix of the history with `created_at <= as_of`
    async fn events_up_to(
        &self,
        aggregate_id: Uuid,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Most recent event of one type
    async fn latest_of_type(
        &self,
        aggregate_id: Uuid,
        event_type: EventType,
    ) -> Result<Option<StoredEvent>, EventStoreError> {
        let events = self.events_for(aggregate_id).await?;
        Ok(events
            .into_iter()
            .rev()
            .find(|e| e.event_type == event_type.as_str()))
    }
}

type EventRow = (Uuid, Uuid, Uuid, String, Value, DateTime<Utc>);

fn from_row((id, aggregate_id, actor_id, event_type, data, created_at): EventRow) -> StoredEvent {
    StoredEvent {
        id,
        aggregate_id,
        actor_id,
        event_type,
        data,
        created_at,
    }
}

/// PostgreSQL-backed event store
#[derive(Debug, Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    /// Create a new PgEventStore with a database pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn append(&self, event: NewMaskEvent) -> Result<StoredEvent, EventStoreError> {
        let stored = event.into_stored();

        sqlx::query(
            r#"
            INSERT INTO mask_events (id, aggregate_id, actor_id, event_type, data, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(stored.id)
        .bind(stored.aggregate_id)
        .bind(stored.actor_id)
        .bind(&stored.event_type)
        .bind(&stored.data)
        .bind(stored.created_at)
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            event_id = %stored.id,
            aggregate_id = %stored.aggregate_id,
            event_type = %stored.event_type,
            "Event appended"
        );

        Ok(stored)
    }

    async fn events_for(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, EventStoreError> {
        let events = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT id, aggregate_id, actor_id, event_type, data, created_at
            FROM mask_events
            WHERE aggregate_id = $1
            ORDER BY created_at ASC, sequence ASC
            "#,
        )
        .bind(aggregate_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(from_row)
        .collect();

        Ok(events)
    }

    async fn events_up_to(
        &self,
        aggregate_id: Uuid,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let events = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT id, aggregate_id, actor_id, event_type, data, created_at
            FROM mask_events
            WHERE aggregate_id = $1 AND created_at <= $2
            ORDER BY created_at ASC, sequence ASC
            "#,
        )
        .bind(aggregate_id)
        .bind(as_of)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(from_row)
        .collect();

        Ok(events)
    }

    async fn latest_of_type(
        &self,
        aggregate_id: Uuid,
        event_type: EventType,
    ) -> Result<Option<StoredEvent>, EventStoreError> {
        let event = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT id, aggregate_id, actor_id, event_type, data, created_at
            FROM mask_events
            WHERE aggregate_id = $1 AND event_type = $2
            ORDER BY created_at DESC, sequence DESC
            LIMIT 1
            "#,
        )
        .bind(aggregate_id)
        .bind(event_type.as_str())
        .fetch_optional(&self.pool)
        .await?
        .map(from_row);

        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_mask_event_validates() {
        let event = NewMaskEvent::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "colors_updated",
            json!({"action": "add", "colors": ["Blue"]}),
        )
        .unwrap();
        assert_eq!(event.event_type(), EventType::ColorsUpdated);

        let err = NewMaskEvent::new(Uuid::new_v4(), Uuid::new_v4(), "colour_updated", json!({}))
            .unwrap_err();
        assert!(matches!(err, EventStoreError::Validation(_)));
    }

    #[test]
    fn test_stored_event_decode_skips_unknown_types() {
        let stored = StoredEvent {
            id: Uuid::new_v4(),
            aggregate_id: Uuid::new_v4(),
            actor_id: Uuid::new_v4(),
            event_type: "fit_test_recorded".to_string(),
            data: json!({}),
            created_at: Utc::now(),
        };

        assert_eq!(stored.decode(), Ok(None));
    }

    #[test]
    fn test_into_stored_keeps_payload() {
        let data = json!({"color": "Red"});
        let event = NewMaskEvent::new(Uuid::new_v4(), Uuid::new_v4(), "color_updated", data.clone())
            .unwrap();
        let created_at = event.created_at;
        let stored = event.into_stored();

        assert_eq!(stored.event_type, "color_updated");
        assert_eq!(stored.data, data);
        assert_eq!(stored.created_at, created_at);
    }
}
