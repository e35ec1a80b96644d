//! API module
//!
//! HTTP API endpoints and the shared state behind them.

pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use sqlx::PgPool;
use tower_http::trace::TraceLayer;

use crate::catalog::{InMemoryMaskRepository, MaskRepository, PgMaskRepository};
use crate::event_store::{
    EventStore, InMemoryEventStore, InMemorySnapshotStore, PgEventStore, PgSnapshotStore,
    SnapshotStore,
};
use crate::handlers::{AppendEventHandler, CreateMaskHandler};
use crate::matching::{
    BreakdownCache, InMemoryBreakdownCache, MatchOrchestrator, MatchSettings, PgBreakdownCache,
    PredictionOracle,
};
use crate::projection::{ProjectionService, Reprojector};

pub use routes::create_router;

/// Stores, services and handlers shared by every request
#[derive(Clone)]
pub struct AppState {
    pub events: Arc<dyn EventStore>,
    pub snapshots: Arc<dyn SnapshotStore>,
    pub masks: Arc<dyn MaskRepository>,
    pub reprojector: Reprojector,
    pub matcher: MatchOrchestrator,
}

impl AppState {
    pub fn new(
        events: Arc<dyn EventStore>,
        snapshots: Arc<dyn SnapshotStore>,
        masks: Arc<dyn MaskRepository>,
        cache: Arc<dyn BreakdownCache>,
        oracle: Arc<dyn PredictionOracle>,
        reproject_debounce: Duration,
        match_settings: MatchSettings,
    ) -> Self {
        let reprojector = Reprojector::new(
            ProjectionService::new(events.clone(), snapshots.clone(), masks.clone()),
            reproject_debounce,
        );
        let matcher = MatchOrchestrator::new(oracle, cache, masks.clone(), events.clone(), match_settings);

        Self {
            events,
            snapshots,
            masks,
            reprojector,
            matcher,
        }
    }

    /// State backed by PostgreSQL
    pub fn postgres(
        pool: PgPool,
        oracle: Arc<dyn PredictionOracle>,
        reproject_debounce: Duration,
        match_settings: MatchSettings,
    ) -> Self {
        Self::new(
            Arc::new(PgEventStore::new(pool.clone())),
            Arc::new(PgSnapshotStore::new(pool.clone())),
            Arc::new(PgMaskRepository::new(pool.clone())),
            Arc::new(PgBreakdownCache::new(pool)),
            oracle,
            reproject_debounce,
            match_settings,
        )
    }

    /// State kept entirely in memory
    pub fn in_memory(
        oracle: Arc<dyn PredictionOracle>,
        reproject_debounce: Duration,
        match_settings: MatchSettings,
    ) -> Self {
        Self::new(
            Arc::new(InMemoryEventStore::new()),
            Arc::new(InMemorySnapshotStore::new()),
            Arc::new(InMemoryMaskRepository::new()),
            Arc::new(InMemoryBreakdownCache::new()),
            oracle,
            reproject_debounce,
            match_settings,
        )
    }

    pub fn projection(&self) -> &ProjectionService {
        self.reprojector.service()
    }

    pub fn create_handler(&self) -> CreateMaskHandler {
        CreateMaskHandler::new(self.snapshots.clone(), self.masks.clone())
    }

    pub fn append_handler(&self) -> AppendEventHandler {
        AppendEventHandler::new(self.events.clone(), self.snapshots.clone(), self.reprojector.clone())
    }
}

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", axum::routing::get(health_check))
        .nest("/api/v1", create_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
