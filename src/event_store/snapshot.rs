//! Snapshot Store
//!
//! Initial attribute snapshots captured once, when a mask is created.
//! A snapshot is immutable; the projector seeds every replay from the
//! earliest one.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::Attributes;

use super::EventStoreError;

/// Attributes that identify or timestamp a record and never seed a replay
const NON_SEED_FIELDS: [&str; 5] = ["id", "aggregate_id", "mask_id", "created_at", "updated_at"];

/// Captured initial state of a mask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: Uuid,
    pub aggregate_id: Uuid,
    pub attributes: Attributes,
    /// Bulk import the mask came from, if any
    pub bulk_import_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Snapshot {
    /// Create a snapshot for a new aggregate
    pub fn capture(aggregate_id: Uuid, attributes: Attributes, bulk_import_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            aggregate_id,
            attributes,
            bulk_import_id,
            created_at: Utc::now(),
        }
    }

    /// Override the capture time (historical imports)
    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Attribute map used as the starting point of a projection.
    ///
    /// Identity and timestamp fields are dropped, as are unset values.
    pub fn seed(&self) -> Attributes {
        self.attributes
            .iter()
            .filter(|(key, value)| !NON_SEED_FIELDS.contains(&key.as_str()) && !value.is_null())
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

/// Storage for initial snapshots
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Persist a snapshot; a second capture for the same aggregate is rejected
    async fn capture(&self, snapshot: Snapshot) -> Result<Snapshot, EventStoreError>;

    /// Earliest snapshot of an aggregate, if any
    async fn initial_for(&self, aggregate_id: Uuid) -> Result<Option<Snapshot>, EventStoreError>;
}

/// PostgreSQL-backed snapshot store
#[derive(Debug, Clone)]
pub struct PgSnapshotStore {
    pool: PgPool,
}

impl PgSnapshotStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SnapshotStore for PgSnapshotStore {
    async fn capture(&self, snapshot: Snapshot) -> Result<Snapshot, EventStoreError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM mask_snapshots WHERE aggregate_id = $1)",
        )
        .bind(snapshot.aggregate_id)
        .fetch_one(&self.pool)
        .await?;

        if exists {
            return Err(EventStoreError::SnapshotExists(snapshot.aggregate_id));
        }

        sqlx::query(
            r#"
            INSERT INTO mask_snapshots (id, aggregate_id, attributes, bulk_import_id, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(snapshot.id)
        .bind(snapshot.aggregate_id)
        .bind(Value::Object(snapshot.attributes.clone()))
        .bind(snapshot.bulk_import_id)
        .bind(snapshot.created_at)
        .execute(&self.pool)
        .await?;

        tracing::info!(
            aggregate_id = %snapshot.aggregate_id,
            snapshot_id = %snapshot.id,
            "Initial snapshot captured"
        );

        Ok(snapshot)
    }

    async fn initial_for(&self, aggregate_id: Uuid) -> Result<Option<Snapshot>, EventStoreError> {
        let row: Option<(Uuid, Uuid, Value, Option<Uuid>, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT id, aggregate_id, attributes, bulk_import_id, created_at
            FROM mask_snapshots
            WHERE aggregate_id = $1
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .bind(aggregate_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(
            |(id, aggregate_id, attributes, bulk_import_id, created_at)| -> Result<Snapshot, EventStoreError> {
                Ok(Snapshot {
                    id,
                    aggregate_id,
                    attributes: serde_json::from_value(attributes)?,
                    bulk_import_id,
                    created_at,
                })
            },
        )
        .transpose()
    }
}
