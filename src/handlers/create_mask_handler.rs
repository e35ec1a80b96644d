//! Mask Creation Handler
//!
//! Captures the initial snapshot and writes the first materialization.

use std::sync::Arc;

use uuid::Uuid;

use crate::catalog::MaskRepository;
use crate::domain::DomainError;
use crate::error::AppResult;
use crate::event_store::{Snapshot, SnapshotStore};

use super::{CreateMaskCommand, CreateMaskResult};

/// Handler for mask creation
pub struct CreateMaskHandler {
    snapshots: Arc<dyn SnapshotStore>,
    masks: Arc<dyn MaskRepository>,
}

impl CreateMaskHandler {
    pub fn new(snapshots: Arc<dyn SnapshotStore>, masks: Arc<dyn MaskRepository>) -> Self {
        Self { snapshots, masks }
    }

    /// Execute the create mask command
    pub async fn execute(&self, command: CreateMaskCommand) -> AppResult<CreateMaskResult> {
        let attributes = match command.attributes {
            serde_json::Value::Object(map) => map,
            serde_json::Value::Null => Default::default(),
            other => {
                return Err(DomainError::InvalidAttributes(format!(
                    "attributes must be an object, got {}",
                    other
                ))
                .into())
            }
        };

        let mask_id = Uuid::new_v4();
        let snapshot = self
            .snapshots
            .capture(Snapshot::capture(mask_id, attributes, command.bulk_import_id))
            .await?;

        // The snapshot is the whole history so far
        let mask = self.masks.materialize(mask_id, snapshot.seed()).await?;

        tracing::info!(
            mask_id = %mask_id,
            actor_id = %command.actor_id,
            bulk_import_id = ?command.bulk_import_id,
            "Mask created"
        );

        Ok(CreateMaskResult {
            mask_id,
            snapshot,
            mask,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_mask_command() {
        let bulk = Uuid::new_v4();
        let cmd = CreateMaskCommand::new(Uuid::new_v4(), json!({"style": "Bifold"})).with_bulk_import(bulk);

        assert_eq!(cmd.bulk_import_id, Some(bulk));
        assert_eq!(cmd.attributes["style"], json!("Bifold"));
    }
}
