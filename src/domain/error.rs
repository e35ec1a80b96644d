//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use thiserror::Error;
use uuid::Uuid;

/// Domain-specific errors
///
/// Validation failures are raised synchronously at the append boundary;
/// nothing is persisted when one of them is returned.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Event type is not part of the fixed vocabulary
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    /// Event payload does not match the shape its type requires
    #[error("Invalid data for {event_type}: {reason}")]
    InvalidEventData {
        event_type: &'static str,
        reason: String,
    },

    /// Mask aggregate has no initial snapshot
    #[error("Mask not found: {0}")]
    MaskNotFound(Uuid),

    /// Snapshot attributes must be a JSON object
    #[error("Invalid attributes: {0}")]
    InvalidAttributes(String),
}

impl DomainError {
    /// Create an invalid event data error
    pub fn invalid_data(event_type: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidEventData {
            event_type,
            reason: reason.into(),
        }
    }
}
