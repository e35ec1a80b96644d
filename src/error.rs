//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::catalog::CatalogError;
use crate::event_store::EventStoreError;
use crate::matching::{CacheError, MatchError};
use crate::projection::ProjectionError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Mask not found: {0}")]
    MaskNotFound(Uuid),

    // Domain errors
    #[error(transparent)]
    Domain(#[from] crate::domain::DomainError),

    // Layer errors
    #[error(transparent)]
    EventStore(#[from] EventStoreError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl From<MatchError> for AppError {
    fn from(err: MatchError) -> Self {
        match err {
            MatchError::Cache(e) => AppError::Cache(e),
            MatchError::Catalog(e) => AppError::Catalog(e),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

fn domain_status(domain_err: &crate::domain::DomainError) -> (StatusCode, &'static str, Option<String>) {
    use crate::domain::DomainError;
    match domain_err {
        DomainError::UnknownEventType(event_type) => {
            (StatusCode::UNPROCESSABLE_ENTITY, "unknown_event_type", Some(event_type.clone()))
        }
        DomainError::InvalidEventData { reason, .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "invalid_event_data", Some(reason.clone()))
        }
        DomainError::InvalidAttributes(msg) => {
            (StatusCode::UNPROCESSABLE_ENTITY, "invalid_attributes", Some(msg.clone()))
        }
        DomainError::MaskNotFound(id) => {
            (StatusCode::NOT_FOUND, "mask_not_found", Some(id.to_string()))
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = match &self {
            // 400 Bad Request
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", Some(msg.clone()))
            }

            // 404 Not Found
            AppError::MaskNotFound(id) => {
                (StatusCode::NOT_FOUND, "mask_not_found", Some(id.to_string()))
            }
            AppError::Projection(ProjectionError::MissingSnapshot(id)) => {
                (StatusCode::NOT_FOUND, "mask_not_found", Some(id.to_string()))
            }

            // 409 Conflict
            AppError::EventStore(EventStoreError::SnapshotExists(id)) => {
                (StatusCode::CONFLICT, "mask_exists", Some(id.to_string()))
            }

            // 422 Validation failures
            AppError::Domain(domain_err) => domain_status(domain_err),
            AppError::EventStore(EventStoreError::Validation(domain_err)) => domain_status(domain_err),

            // 500 Internal Server Error
            AppError::EventStore(e) => {
                tracing::error!("Event store error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "event_store_error", None)
            }
            AppError::Projection(e) => {
                tracing::error!("Projection error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "projection_error", None)
            }
            AppError::Catalog(e) => {
                tracing::error!("Catalog error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "catalog_error", None)
            }
            AppError::Cache(e) => {
                tracing::error!("Breakdown cache error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "cache_error", None)
            }
        };

        let body = ErrorResponse {
            error: self.to_string(),
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DomainError;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_validation_errors_are_unprocessable() {
        assert_eq!(
            status_of(AppError::Domain(DomainError::UnknownEventType("x".into()))),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(AppError::EventStore(EventStoreError::Validation(
                DomainError::invalid_data("colors_updated", "colors must be a list")
            ))),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_missing_masks_are_not_found() {
        let id = Uuid::new_v4();
        assert_eq!(status_of(AppError::MaskNotFound(id)), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(AppError::Domain(DomainError::MaskNotFound(id))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(AppError::Projection(ProjectionError::MissingSnapshot(id))),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_storage_errors_are_internal() {
        assert_eq!(
            status_of(AppError::Catalog(CatalogError::Database(sqlx::Error::PoolTimedOut))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(MatchError::Cache(CacheError::Database(sqlx::Error::PoolTimedOut)).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
