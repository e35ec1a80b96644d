//! Queued reprojection
//!
//! Appends schedule a reprojection instead of running one inline. Triggers
//! for the same mask are coalesced (latest wins after the debounce window)
//! and runs for one mask are serialized, so an older run can never land
//! after a newer one. Failed runs leave the mask stale until a retry
//! succeeds.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::catalog::MaterializedMask;

use super::{ProjectionError, ProjectionService};

/// Outcome of a scheduled trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// This trigger ran the reprojection and it succeeded
    Reprojected,
    /// A later trigger for the same mask took over
    Superseded,
    /// The reprojection failed; the mask is marked stale
    Failed,
}

/// Result of retrying stale masks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryReport {
    pub recovered: Vec<Uuid>,
    pub still_stale: Vec<Uuid>,
}

struct Inner {
    service: ProjectionService,
    debounce: Duration,
    /// Latest trigger generation per mask
    pending: Mutex<HashMap<Uuid, u64>>,
    /// One lock per mask so runs never overlap
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
    stale: Mutex<HashSet<Uuid>>,
}

/// Debounced, per-mask serialized reprojection
#[derive(Clone)]
pub struct Reprojector {
    inner: Arc<Inner>,
}

impl Reprojector {
    pub fn new(service: ProjectionService, debounce: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                service,
                debounce,
                pending: Mutex::new(HashMap::new()),
                locks: Mutex::new(HashMap::new()),
                stale: Mutex::new(HashSet::new()),
            }),
        }
    }

    pub fn service(&self) -> &ProjectionService {
        &self.inner.service
    }

    /// Queue a reprojection of one mask.
    ///
    /// Must be called from inside a Tokio runtime. The returned handle can
    /// be awaited but never has to be.
    pub fn schedule(&self, aggregate_id: Uuid) -> JoinHandle<ScheduleOutcome> {
        let this = self.clone();
        tokio::spawn(async move { this.run_scheduled(aggregate_id).await })
    }

    async fn run_scheduled(&self, aggregate_id: Uuid) -> ScheduleOutcome {
        let generation = {
            let mut pending = self.inner.pending.lock().await;
            let generation = pending.entry(aggregate_id).or_insert(0);
            *generation += 1;
            *generation
        };

        if !self.inner.debounce.is_zero() {
            tokio::time::sleep(self.inner.debounce).await;
        }

        {
            let mut pending = self.inner.pending.lock().await;
            if pending.get(&aggregate_id) != Some(&generation) {
                tracing::trace!(aggregate_id = %aggregate_id, "Reprojection superseded");
                return ScheduleOutcome::Superseded;
            }
            pending.remove(&aggregate_id);
        }

        match self.reproject_now(aggregate_id).await {
            Ok(_) => ScheduleOutcome::Reprojected,
            Err(_) => ScheduleOutcome::Failed,
        }
    }

    /// Reproject immediately, serialized with any other run for the same mask
    pub async fn reproject_now(&self, aggregate_id: Uuid) -> Result<MaterializedMask, ProjectionError> {
        let lock = {
            let mut locks = self.inner.locks.lock().await;
            locks.entry(aggregate_id).or_default().clone()
        };

        let result = {
            let _guard = lock.lock().await;

            match self.inner.service.reproject(aggregate_id).await {
                Ok(mask) => {
                    self.inner.stale.lock().await.remove(&aggregate_id);
                    Ok(mask)
                }
                Err(e) => {
                    tracing::error!(
                        aggregate_id = %aggregate_id,
                        error = %e,
                        "Reprojection failed, mask left stale"
                    );
                    self.inner.stale.lock().await.insert(aggregate_id);
                    Err(e)
                }
            }
        };

        self.release_lock(aggregate_id, lock).await;
        result
    }

    /// Forget the per-mask lock once no other run holds or waits on it
    async fn release_lock(&self, aggregate_id: Uuid, lock: Arc<Mutex<()>>) {
        let mut locks = self.inner.locks.lock().await;
        // One reference in the map, one here
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&aggregate_id);
        }
    }

    /// Masks whose last reprojection failed
    pub async fn stale_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.inner.stale.lock().await.iter().copied().collect();
        ids.sort();
        ids
    }

    /// Retry every stale mask once
    pub async fn retry_stale(&self) -> RetryReport {
        let mut report = RetryReport::default();

        for aggregate_id in self.stale_ids().await {
            match self.reproject_now(aggregate_id).await {
                Ok(_) => report.recovered.push(aggregate_id),
                Err(_) => report.still_stale.push(aggregate_id),
            }
        }

        if !report.recovered.is_empty() {
            tracing::info!(recovered = report.recovered.len(), "Stale masks reprojected");
        }

        report
    }
}
