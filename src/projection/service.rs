//! Projection Service
//!
//! Rebuilds mask state from the initial snapshot and the event history.
//! `reproject` writes the result onto the materialized record; every run
//! folds the full ordered history, never an increment.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::aggregate::MaskProjection;
use crate::catalog::{CatalogError, MaskRepository, MaterializedMask};
use crate::event_store::{EventStore, EventStoreError, SnapshotStore};

use super::projector::project_stored;

/// Projection Service for rebuilding and materializing masks
#[derive(Clone)]
pub struct ProjectionService {
    events: Arc<dyn EventStore>,
    snapshots: Arc<dyn SnapshotStore>,
    masks: Arc<dyn MaskRepository>,
}

impl ProjectionService {
    pub fn new(
        events: Arc<dyn EventStore>,
        snapshots: Arc<dyn SnapshotStore>,
        masks: Arc<dyn MaskRepository>,
    ) -> Self {
        Self {
            events,
            snapshots,
            masks,
        }
    }

    /// Projection as of a point in time (nothing is written)
    pub async fn project_as_of(
        &self,
        aggregate_id: Uuid,
        as_of: DateTime<Utc>,
    ) -> Result<MaskProjection, ProjectionError> {
        let snapshot = self
            .snapshots
            .initial_for(aggregate_id)
            .await?
            .ok_or(ProjectionError::MissingSnapshot(aggregate_id))?;

        let events = self.events.events_up_to(aggregate_id, as_of).await?;

        Ok(project_stored(aggregate_id, as_of, &snapshot.seed(), &events))
    }

    /// Projection over the full history
    pub async fn project_current(&self, aggregate_id: Uuid) -> Result<MaskProjection, ProjectionError> {
        let snapshot = self
            .snapshots
            .initial_for(aggregate_id)
            .await?
            .ok_or(ProjectionError::MissingSnapshot(aggregate_id))?;

        let events = self.events.events_for(aggregate_id).await?;
        let as_of = events
            .last()
            .map(|e| e.created_at)
            .unwrap_or(snapshot.created_at);

        Ok(project_stored(aggregate_id, as_of, &snapshot.seed(), &events))
    }

    /// Rebuild a mask from its full history and write it onto the materialized record
    pub async fn reproject(&self, aggregate_id: Uuid) -> Result<MaterializedMask, ProjectionError> {
        let projection = self.project_current(aggregate_id).await?;
        let mask = self
            .masks
            .materialize(aggregate_id, projection.serialize())
            .await?;

        tracing::debug!(
            aggregate_id = %aggregate_id,
            as_of = %projection.as_of(),
            "Mask reprojected"
        );

        Ok(mask)
    }
}

/// Projection errors
#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    #[error("No initial snapshot for mask {0}")]
    MissingSnapshot(Uuid),

    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
}
