//! mask_catalog - Mask Catalog Backend API
//!
//! Event-sourced mask records with a materialized catalog, and fuzzy
//! matching of externally sourced product names against that catalog.

use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mask_catalog::api::{self, AppState};
use mask_catalog::jobs::{JobScheduler, JobSchedulerConfig};
use mask_catalog::matching::{HttpPredictionOracle, MatchSettings, PredictionOracle, UnavailableOracle};
use mask_catalog::{db, Config};

/// Initialize tracing/logging
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mask_catalog=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Prediction oracle from configuration
fn build_oracle(config: &Config) -> anyhow::Result<Arc<dyn PredictionOracle>> {
    match &config.oracle_url {
        Some(url) => {
            tracing::info!(oracle_url = %url, "Using HTTP prediction oracle");
            Ok(Arc::new(HttpPredictionOracle::new(url.clone(), config.oracle_timeout)?))
        }
        None => {
            tracing::warn!("ORACLE_URL not set; names without a cached breakdown will not be matched");
            Ok(Arc::new(UnavailableOracle))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    init_tracing();

    // Load configuration
    let config = Config::from_env()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!(environment = %config.environment, "Starting mask_catalog server");
    tracing::info!("Connecting to database...");

    // Create database pool
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;

    db::verify_connection(&pool).await?;

    // Verify database schema
    if !db::check_schema(&pool).await? {
        tracing::error!("Database schema is not complete. Please run migrations.");
        return Err(anyhow::anyhow!("Database schema incomplete"));
    }

    tracing::info!("Database connected successfully");

    let state = AppState::postgres(
        pool.clone(),
        build_oracle(&config)?,
        config.reproject_debounce,
        MatchSettings {
            batch_size: config.oracle_batch_size,
            max_concurrency: config.oracle_max_concurrency,
        },
    );

    // Background maintenance
    let jobs = JobScheduler::with_config(
        state.reprojector.clone(),
        JobSchedulerConfig {
            stale_retry_interval: config.stale_retry_interval,
        },
    )
    .start();

    tracing::info!("Listening on http://{}", addr);

    // Build router and start server
    let app = api::build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Cleanup
    tracing::info!("Server shutting down...");
    jobs.abort();
    pool.close().await;
    tracing::info!("Database connections closed. Goodbye!");

    Ok(())
}

/// Shutdown signal handler for graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}
