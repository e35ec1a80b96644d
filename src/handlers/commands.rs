//! Command definitions
//!
//! Commands represent intentions to change the system state.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::catalog::MaterializedMask;
use crate::event_store::Snapshot;

/// Command to create a new mask from its initial attributes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMaskCommand {
    pub actor_id: Uuid,
    /// Must be a JSON object
    pub attributes: Value,
    #[serde(default)]
    pub bulk_import_id: Option<Uuid>,
}

impl CreateMaskCommand {
    pub fn new(actor_id: Uuid, attributes: Value) -> Self {
        Self {
            actor_id,
            attributes,
            bulk_import_id: None,
        }
    }

    pub fn with_bulk_import(mut self, bulk_import_id: Uuid) -> Self {
        self.bulk_import_id = Some(bulk_import_id);
        self
    }
}

/// Result of mask creation
#[derive(Debug, Clone, Serialize)]
pub struct CreateMaskResult {
    pub mask_id: Uuid,
    pub snapshot: Snapshot,
    pub mask: MaterializedMask,
}

/// Command to append one event to a mask's history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppendEventCommand {
    pub aggregate_id: Uuid,
    pub actor_id: Uuid,
    pub event_type: String,
    #[serde(default)]
    pub data: Value,
}

impl AppendEventCommand {
    pub fn new(aggregate_id: Uuid, actor_id: Uuid, event_type: impl Into<String>, data: Value) -> Self {
        Self {
            aggregate_id,
            actor_id,
            event_type: event_type.into(),
            data,
        }
    }
}
