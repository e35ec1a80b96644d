//! Event Append Handler
//!
//! Validates and durably appends one event, then queues a reprojection.
//! The append never waits for the reprojection; a failed reprojection
//! leaves the mask stale, the event stays.

use std::sync::Arc;

use crate::domain::DomainError;
use crate::error::AppResult;
use crate::event_store::{EventStore, NewMaskEvent, SnapshotStore, StoredEvent};
use crate::projection::Reprojector;

use super::AppendEventCommand;

/// Handler for event appends
pub struct AppendEventHandler {
    events: Arc<dyn EventStore>,
    snapshots: Arc<dyn SnapshotStore>,
    reprojector: Reprojector,
}

impl AppendEventHandler {
    pub fn new(
        events: Arc<dyn EventStore>,
        snapshots: Arc<dyn SnapshotStore>,
        reprojector: Reprojector,
    ) -> Self {
        Self {
            events,
            snapshots,
            reprojector,
        }
    }

    /// Execute the append command
    pub async fn execute(&self, command: AppendEventCommand) -> AppResult<StoredEvent> {
        // Validation happens before anything touches storage
        let event = NewMaskEvent::new(
            command.aggregate_id,
            command.actor_id,
            &command.event_type,
            command.data,
        )?;

        if self.snapshots.initial_for(command.aggregate_id).await?.is_none() {
            return Err(DomainError::MaskNotFound(command.aggregate_id).into());
        }

        let stored = self.events.append(event).await?;

        tracing::info!(
            event_id = %stored.id,
            aggregate_id = %stored.aggregate_id,
            event_type = %stored.event_type,
            "Mask event appended"
        );

        self.reprojector.schedule(stored.aggregate_id);

        Ok(stored)
    }
}
