//! Handler tests
//!
//! Run against the in-memory stores; no database needed.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;
    use uuid::Uuid;

    use crate::catalog::{InMemoryMaskRepository, MaskRepository};
    use crate::domain::DomainError;
    use crate::error::AppError;
    use crate::event_store::{
        EventStore, EventStoreError, InMemoryEventStore, InMemorySnapshotStore,
    };
    use crate::handlers::{AppendEventCommand, AppendEventHandler, CreateMaskCommand, CreateMaskHandler};
    use crate::projection::{ProjectionService, Reprojector};

    struct Harness {
        events: Arc<InMemoryEventStore>,
        masks: Arc<InMemoryMaskRepository>,
        create: CreateMaskHandler,
        append: AppendEventHandler,
    }

    fn harness() -> Harness {
        let events = Arc::new(InMemoryEventStore::new());
        let snapshots = Arc::new(InMemorySnapshotStore::new());
        let masks = Arc::new(InMemoryMaskRepository::new());
        let reprojector = Reprojector::new(
            ProjectionService::new(events.clone(), snapshots.clone(), masks.clone()),
            Duration::ZERO,
        );

        Harness {
            create: CreateMaskHandler::new(snapshots.clone(), masks.clone()),
            append: AppendEventHandler::new(events.clone(), snapshots, reprojector),
            events,
            masks,
        }
    }

    // =========================================================================
    // Mask creation
    // =========================================================================

    #[tokio::test]
    async fn test_create_materializes_seed() {
        let h = harness();

        let result = h
            .create
            .execute(CreateMaskCommand::new(
                Uuid::new_v4(),
                json!({"style": "Bifold", "id": 7, "notes": null}),
            ))
            .await
            .unwrap();

        assert_eq!(result.snapshot.aggregate_id, result.mask_id);
        assert_eq!(
            serde_json::Value::Object(result.mask.attributes.clone()),
            json!({"style": "Bifold"})
        );
        assert!(h.masks.find(result.mask_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_create_rejects_non_object_attributes() {
        let h = harness();

        let result = h
            .create
            .execute(CreateMaskCommand::new(Uuid::new_v4(), json!(["not", "an", "object"])))
            .await;

        assert!(matches!(
            result,
            Err(AppError::Domain(DomainError::InvalidAttributes(_)))
        ));
    }

    // =========================================================================
    // Event append
    // =========================================================================

    #[tokio::test]
    async fn test_append_rejects_unknown_type_without_persisting() {
        let h = harness();
        let mask = h
            .create
            .execute(CreateMaskCommand::new(Uuid::new_v4(), json!({})))
            .await
            .unwrap();

        let result = h
            .append
            .execute(AppendEventCommand::new(
                mask.mask_id,
                Uuid::new_v4(),
                "fit_test_recorded",
                json!({}),
            ))
            .await;

        assert!(matches!(
            result,
            Err(AppError::EventStore(EventStoreError::Validation(
                DomainError::UnknownEventType(_)
            )))
        ));
        assert!(h.events.events_for(mask.mask_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_rejects_non_list_colors() {
        let h = harness();
        let mask = h
            .create
            .execute(CreateMaskCommand::new(Uuid::new_v4(), json!({})))
            .await
            .unwrap();

        let result = h
            .append
            .execute(AppendEventCommand::new(
                mask.mask_id,
                Uuid::new_v4(),
                "colors_updated",
                json!({"action": "add", "colors": "Blue"}),
            ))
            .await;

        assert!(matches!(
            result,
            Err(AppError::EventStore(EventStoreError::Validation(
                DomainError::InvalidEventData { .. }
            )))
        ));
    }

    #[tokio::test]
    async fn test_append_to_unknown_mask_is_not_found() {
        let h = harness();

        let result = h
            .append
            .execute(AppendEventCommand::new(
                Uuid::new_v4(),
                Uuid::new_v4(),
                "color_updated",
                json!({"color": "Blue"}),
            ))
            .await;

        assert!(matches!(result, Err(AppError::Domain(DomainError::MaskNotFound(_)))));
    }

    #[tokio::test]
    async fn test_append_eventually_reprojects() {
        let h = harness();
        let mask = h
            .create
            .execute(CreateMaskCommand::new(Uuid::new_v4(), json!({"colors": []})))
            .await
            .unwrap();

        h.append
            .execute(AppendEventCommand::new(
                mask.mask_id,
                Uuid::new_v4(),
                "colors_updated",
                json!({"action": "add", "colors": ["X", "Y"]}),
            ))
            .await
            .unwrap();

        let mut colors = None;
        for _ in 0..50 {
            let current = h.masks.find(mask.mask_id).await.unwrap().unwrap();
            if current.attributes["colors"] == json!(["X", "Y"]) {
                colors = Some(current.attributes["colors"].clone());
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(colors, Some(json!(["X", "Y"])));
    }
}
