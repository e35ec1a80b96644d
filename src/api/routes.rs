//! API Routes
//!
//! HTTP endpoint definitions.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::aggregate::MaskProjection;
use crate::catalog::MaterializedMask;
use crate::error::{AppError, AppResult};
use crate::event_store::StoredEvent;
use crate::handlers::{AppendEventCommand, CreateMaskCommand};
use crate::matching::MatchReport;

use super::AppState;

/// Most names accepted by one match request
const MAX_MATCH_NAMES: usize = 5000;

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Deserialize)]
pub struct CreateMaskRequest {
    pub actor_id: Uuid,
    #[serde(default)]
    pub attributes: Value,
    #[serde(default)]
    pub bulk_import_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct CreateMaskResponse {
    pub mask_id: Uuid,
    pub snapshot_id: Uuid,
    pub mask: MaterializedMask,
}

#[derive(Debug, Deserialize)]
pub struct AppendEventRequest {
    pub actor_id: Uuid,
    pub event_type: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Deserialize)]
pub struct ProjectionQuery {
    #[serde(default)]
    pub as_of: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct MatchRequest {
    pub names: Vec<String>,
}

// =========================================================================
// Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/masks", post(create_mask))
        .route("/masks/:mask_id", get(get_mask))
        .route("/masks/:mask_id/events", post(append_event).get(get_events))
        .route("/masks/:mask_id/projection", get(get_projection))
        .route("/masks/:mask_id/reproject", post(reproject))
        .route("/matches", post(run_matches))
}

// =========================================================================
// POST /masks
// =========================================================================

/// Create a mask from its initial attributes
async fn create_mask(
    State(state): State<AppState>,
    Json(request): Json<CreateMaskRequest>,
) -> AppResult<(StatusCode, Json<CreateMaskResponse>)> {
    let command = CreateMaskCommand::new(request.actor_id, request.attributes);
    let command = if let Some(bulk_import_id) = request.bulk_import_id {
        command.with_bulk_import(bulk_import_id)
    } else {
        command
    };

    let result = state.create_handler().execute(command).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateMaskResponse {
            mask_id: result.mask_id,
            snapshot_id: result.snapshot.id,
            mask: result.mask,
        }),
    ))
}

// =========================================================================
// GET /masks/:mask_id
// =========================================================================

/// Materialized record of a mask
async fn get_mask(
    State(state): State<AppState>,
    Path(mask_id): Path<Uuid>,
) -> AppResult<Json<MaterializedMask>> {
    let mask = state
        .masks
        .find(mask_id)
        .await?
        .ok_or(AppError::MaskNotFound(mask_id))?;

    Ok(Json(mask))
}

// =========================================================================
// POST /masks/:mask_id/events
// =========================================================================

/// Append one event; reprojection runs in the background
async fn append_event(
    State(state): State<AppState>,
    Path(mask_id): Path<Uuid>,
    Json(request): Json<AppendEventRequest>,
) -> AppResult<(StatusCode, Json<StoredEvent>)> {
    let command = AppendEventCommand::new(mask_id, request.actor_id, request.event_type, request.data);

    let stored = state.append_handler().execute(command).await?;

    Ok((StatusCode::CREATED, Json(stored)))
}

// =========================================================================
// GET /masks/:mask_id/events
// =========================================================================

/// Full event history of a mask, oldest first
async fn get_events(
    State(state): State<AppState>,
    Path(mask_id): Path<Uuid>,
) -> AppResult<Json<Vec<StoredEvent>>> {
    if state.snapshots.initial_for(mask_id).await?.is_none() {
        return Err(AppError::MaskNotFound(mask_id));
    }

    Ok(Json(state.events.events_for(mask_id).await?))
}

// =========================================================================
// GET /masks/:mask_id/projection
// =========================================================================

/// Projection as of a point in time, or over the full history
async fn get_projection(
    State(state): State<AppState>,
    Path(mask_id): Path<Uuid>,
    Query(query): Query<ProjectionQuery>,
) -> AppResult<Json<MaskProjection>> {
    let projection = match query.as_of {
        Some(as_of) => state.projection().project_as_of(mask_id, as_of).await?,
        None => state.projection().project_current(mask_id).await?,
    };

    Ok(Json(projection))
}

// =========================================================================
// POST /masks/:mask_id/reproject
// =========================================================================

/// Rebuild the materialized record now
async fn reproject(
    State(state): State<AppState>,
    Path(mask_id): Path<Uuid>,
) -> AppResult<Json<MaterializedMask>> {
    // Unknown ids must not end up in the stale set
    if state.snapshots.initial_for(mask_id).await?.is_none() {
        return Err(AppError::MaskNotFound(mask_id));
    }

    let mask = state.reprojector.reproject_now(mask_id).await?;
    Ok(Json(mask))
}

// =========================================================================
// POST /matches
// =========================================================================

/// Rank catalog masks for a list of external names
async fn run_matches(
    State(state): State<AppState>,
    Json(request): Json<MatchRequest>,
) -> AppResult<Json<MatchReport>> {
    if request.names.len() > MAX_MATCH_NAMES {
        return Err(AppError::InvalidRequest(format!(
            "at most {} names per request",
            MAX_MATCH_NAMES
        )));
    }

    let report = state.matcher.run(&request.names).await?;

    tracing::info!(
        names = request.names.len(),
        recommended = report.recommendations.len(),
        errors = report.errors.len(),
        "Match run completed"
    );

    Ok(Json(report))
}
