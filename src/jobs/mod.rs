//! Scheduled Jobs
//!
//! Background jobs for periodic maintenance tasks.
//! Masks whose reprojection failed stay stale until one of these runs
//! rebuilds them.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use uuid::Uuid;

use crate::projection::Reprojector;

/// Retry every stale mask once
pub async fn retry_stale_masks(reprojector: &Reprojector) -> Vec<Uuid> {
    let report = reprojector.retry_stale().await;

    if !report.still_stale.is_empty() {
        tracing::warn!(
            still_stale = report.still_stale.len(),
            "Masks remain stale after retry"
        );
    }

    report.recovered
}

// =========================================================================
// Job Scheduler
// =========================================================================

/// Job scheduler configuration
#[derive(Debug, Clone)]
pub struct JobSchedulerConfig {
    /// Interval between stale mask retries
    pub stale_retry_interval: Duration,
}

impl Default for JobSchedulerConfig {
    fn default() -> Self {
        Self {
            stale_retry_interval: Duration::from_secs(60),
        }
    }
}

/// Job Scheduler - runs periodic maintenance tasks
pub struct JobScheduler {
    reprojector: Reprojector,
    config: JobSchedulerConfig,
}

impl JobScheduler {
    /// Create a new job scheduler
    pub fn new(reprojector: Reprojector) -> Self {
        Self {
            reprojector,
            config: JobSchedulerConfig::default(),
        }
    }

    /// Create with custom configuration
    pub fn with_config(reprojector: Reprojector, config: JobSchedulerConfig) -> Self {
        Self { reprojector, config }
    }

    /// Start the job scheduler in the background
    /// Returns a handle that can be used to abort the scheduler
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Run the scheduler loop
    async fn run(&self) {
        tracing::info!(
            stale_retry_interval = ?self.config.stale_retry_interval,
            "Job scheduler started"
        );

        let mut stale_interval = interval(self.config.stale_retry_interval);
        stale_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            stale_interval.tick().await;
            retry_stale_masks(&self.reprojector).await;
        }
    }

    /// Run all maintenance jobs once (for manual trigger or testing)
    pub async fn run_all_once(&self) -> MaintenanceReport {
        let mut report = MaintenanceReport {
            masks_recovered: retry_stale_masks(&self.reprojector).await,
            ..Default::default()
        };
        report.masks_still_stale = self.reprojector.stale_ids().await;
        report.completed_at = Utc::now();
        report
    }
}

/// Report from running maintenance jobs
#[derive(Debug, Clone, Default)]
pub struct MaintenanceReport {
    pub masks_recovered: Vec<Uuid>,
    pub masks_still_stale: Vec<Uuid>,
    pub completed_at: DateTime<Utc>,
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryMaskRepository;
    use crate::event_store::{InMemoryEventStore, InMemorySnapshotStore, Snapshot, SnapshotStore};
    use crate::projection::ProjectionService;
    use std::sync::Arc;

    #[test]
    fn test_job_scheduler_config_default() {
        let config = JobSchedulerConfig::default();
        assert_eq!(config.stale_retry_interval, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_run_all_once_recovers_stale_masks() {
        let snapshots = Arc::new(InMemorySnapshotStore::new());
        let reprojector = Reprojector::new(
            ProjectionService::new(
                Arc::new(InMemoryEventStore::new()),
                snapshots.clone(),
                Arc::new(InMemoryMaskRepository::new()),
            ),
            Duration::ZERO,
        );
        let recoverable = Uuid::new_v4();
        let missing = Uuid::new_v4();

        // Neither mask has a snapshot yet, both fail
        assert!(reprojector.reproject_now(recoverable).await.is_err());
        assert!(reprojector.reproject_now(missing).await.is_err());

        snapshots
            .capture(Snapshot::capture(recoverable, Default::default(), None))
            .await
            .unwrap();

        let report = JobScheduler::new(reprojector).run_all_once().await;

        assert_eq!(report.masks_recovered, vec![recoverable]);
        assert_eq!(report.masks_still_stale, vec![missing]);
    }
}
