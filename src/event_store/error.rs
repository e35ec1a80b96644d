//! Event Store Errors
//!
//! Error types for event and snapshot store operations.

use uuid::Uuid;

use crate::domain::DomainError;

/// Errors that can occur in the event store
#[derive(Debug, thiserror::Error)]
pub enum EventStoreError {
    /// Event failed validation; nothing was persisted
    #[error(transparent)]
    Validation(#[from] DomainError),

    /// Snapshot already captured for this aggregate
    #[error("Snapshot already exists for aggregate {0}")]
    SnapshotExists(Uuid),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_errors_convert_to_validation() {
        let err = EventStoreError::from(DomainError::UnknownEventType("nope".to_string()));
        assert!(matches!(err, EventStoreError::Validation(DomainError::UnknownEventType(_))));
        assert_eq!(err.to_string(), "Unknown event type: nope");
    }
}
