//! Match orchestrator
//!
//! Ranks catalog masks against externally sourced names. Names without a
//! cached breakdown are sent to the prediction oracle in bounded batches;
//! catalog masks resolve their breakdown from their own history first.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use uuid::Uuid;

use crate::catalog::{CatalogError, MaskRepository, MaterializedMask};
use crate::domain::{fields, EventType};
use crate::event_store::{EventStore, EventStoreError};

use super::cache::{BreakdownCache, CacheError, CachedBreakdown};
use super::components::{breakdown_from_value, Breakdown, Category, ComponentBucket};
use super::oracle::{OracleError, PredictionOracle};
use super::scorer::{component_weights, score, Score};

/// Candidates kept per name
pub const MAX_RECOMMENDATIONS: usize = 5;
/// Score at or above which a recommendation may be accepted automatically
pub const AUTO_MATCH_THRESHOLD: f64 = 0.5;

const ORACLE_SOURCE: &str = "oracle";

/// Batching limits for oracle calls
#[derive(Debug, Clone, Copy)]
pub struct MatchSettings {
    pub batch_size: usize,
    pub max_concurrency: usize,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            batch_size: 25,
            max_concurrency: 4,
        }
    }
}

/// Where a catalog mask's breakdown came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakdownSource {
    CurrentState,
    Event,
    Oracle,
    Unavailable,
}

/// An externally sourced name and its predicted components
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileMask {
    pub name: String,
    pub breakdown: Breakdown,
    pub components: ComponentBucket,
    pub confidence: Option<f64>,
}

/// A catalog mask as seen by the matcher
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogMask {
    pub record_id: Uuid,
    pub record_name: String,
    pub breakdown: Breakdown,
    pub components: ComponentBucket,
    pub breakdown_source: BreakdownSource,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub record_id: Uuid,
    pub record_name: String,
    pub score: f64,
    pub component_scores: BTreeMap<Category, Option<f64>>,
}

/// Result of one matching run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchReport {
    pub from_file_masks: Vec<FileMask>,
    pub catalog_masks: Vec<CatalogMask>,
    pub recommendations: BTreeMap<String, Vec<Recommendation>>,
    pub component_weights: BTreeMap<Category, f64>,
    pub auto_match_threshold: f64,
    /// Names the oracle could not break down
    pub errors: BTreeMap<String, String>,
}

/// Errors that abort a whole run
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

/// Failure resolving one catalog mask; never aborts the run
#[derive(Debug, thiserror::Error)]
enum ResolutionError {
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),
}

#[derive(Clone)]
pub struct MatchOrchestrator {
    oracle: Arc<dyn PredictionOracle>,
    cache: Arc<dyn BreakdownCache>,
    masks: Arc<dyn MaskRepository>,
    events: Arc<dyn EventStore>,
    settings: MatchSettings,
}

impl MatchOrchestrator {
    pub fn new(
        oracle: Arc<dyn PredictionOracle>,
        cache: Arc<dyn BreakdownCache>,
        masks: Arc<dyn MaskRepository>,
        events: Arc<dyn EventStore>,
        settings: MatchSettings,
    ) -> Self {
        Self {
            oracle,
            cache,
            masks,
            events,
            settings,
        }
    }

    /// Rank catalog masks for every name
    pub async fn run(&self, names: &[String]) -> Result<MatchReport, MatchError> {
        let names = distinct_names(names);

        let mut entries = self.cache.load(&names).await?;
        let mut errors = self.cache.load_errors(&names).await?;

        let missing: Vec<String> = names
            .iter()
            .filter(|name| !entries.contains_key(*name))
            .cloned()
            .collect();

        let (predicted, failed) = self.predict_missing(&missing).await;

        let changed_errors: BTreeMap<String, String> = failed
            .into_iter()
            .filter(|(name, message)| errors.get(name) != Some(message))
            .collect();

        if !predicted.is_empty() {
            let recovered: Vec<String> = predicted.keys().cloned().collect();
            self.cache.merge_entries(predicted.clone()).await?;
            self.cache.clear_errors(&recovered).await?;
            for name in &recovered {
                errors.remove(name);
            }
        }
        if !changed_errors.is_empty() {
            self.cache.merge_errors(changed_errors.clone()).await?;
        }

        tracing::info!(
            names = names.len(),
            cached = entries.len(),
            predicted = predicted.len(),
            new_errors = changed_errors.len(),
            "Name breakdowns resolved"
        );

        entries.extend(predicted);
        errors.extend(changed_errors);

        let catalog_masks = self.catalog_masks().await?;

        let from_file_masks: Vec<FileMask> = names
            .iter()
            .filter_map(|name| {
                entries.get(name).map(|entry| FileMask {
                    name: name.clone(),
                    breakdown: entry.breakdown.clone(),
                    components: entry.components.clone(),
                    confidence: entry.confidence,
                })
            })
            .collect();

        let recommendations = from_file_masks
            .iter()
            .filter(|file_mask| !file_mask.components.is_blank())
            .map(|file_mask| (file_mask.name.clone(), recommend(&file_mask.components, &catalog_masks)))
            .collect();

        Ok(MatchReport {
            from_file_masks,
            catalog_masks,
            recommendations,
            component_weights: component_weights(),
            auto_match_threshold: AUTO_MATCH_THRESHOLD,
            errors,
        })
    }

    /// Predict breakdowns in concurrent batches.
    ///
    /// Returns usable predictions and a per-name error for everything else.
    async fn predict_missing(
        &self,
        missing: &[String],
    ) -> (BTreeMap<String, CachedBreakdown>, BTreeMap<String, String>) {
        let mut predicted = BTreeMap::new();
        let mut failed = BTreeMap::new();

        if missing.is_empty() {
            return (predicted, failed);
        }

        let batch_size = self.settings.batch_size.max(1);
        let batches: Vec<Vec<String>> = missing.chunks(batch_size).map(<[String]>::to_vec).collect();
        let results: Vec<_> = stream::iter(batches)
            .map(|batch| {
                let oracle = Arc::clone(&self.oracle);
                async move {
                    let result = oracle.predict_batch(&batch).await;
                    (batch, result)
                }
            })
            .buffer_unordered(self.settings.max_concurrency.max(1))
            .collect()
            .await;

        for (batch, result) in results {
            match result {
                Ok(predictions) => {
                    for (name, prediction) in batch.into_iter().zip(predictions) {
                        match prediction {
                            Some(p) if p.is_usable() => {
                                predicted.insert(
                                    name,
                                    CachedBreakdown::new(p.breakdown, p.confidence, ORACLE_SOURCE),
                                );
                            }
                            Some(_) => {
                                failed.insert(name, "Prediction fell back".to_string());
                            }
                            None => {
                                failed.insert(name, "No prediction returned".to_string());
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(batch = batch.len(), error = %e, "Oracle batch failed");
                    for name in batch {
                        failed.insert(name, format!("Prediction unavailable: {}", e));
                    }
                }
            }
        }

        (predicted, failed)
    }

    /// Every non-duplicate catalog mask with its resolved components
    async fn catalog_masks(&self) -> Result<Vec<CatalogMask>, MatchError> {
        let masks: Vec<MaterializedMask> = self
            .masks
            .list()
            .await?
            .into_iter()
            .filter(|mask| !mask.is_duplicate())
            .collect();

        let resolved: Vec<CatalogMask> = stream::iter(masks)
            .map(|mask| async move {
                let (breakdown, breakdown_source) = match self.resolve_breakdown(&mask).await {
                    Ok(resolved) => resolved,
                    Err(e) => {
                        tracing::warn!(
                            record_id = %mask.id,
                            error = %e,
                            "Breakdown resolution failed, treating as unavailable"
                        );
                        (Breakdown::new(), BreakdownSource::Unavailable)
                    }
                };

                let components = ComponentBucket::from_breakdown(&breakdown)
                    .enrich_with_mask_attributes(&mask.attributes);

                CatalogMask {
                    record_id: mask.id,
                    record_name: mask.name().to_string(),
                    breakdown,
                    components,
                    breakdown_source,
                }
            })
            .buffered(self.settings.max_concurrency.max(1))
            .collect()
            .await;

        Ok(resolved)
    }

    /// Current state, then the latest breakdown event, then the oracle
    async fn resolve_breakdown(
        &self,
        mask: &MaterializedMask,
    ) -> Result<(Breakdown, BreakdownSource), ResolutionError> {
        if let Some(value) = mask.current_breakdown() {
            let breakdown = breakdown_from_value(value);
            if !breakdown.is_empty() {
                return Ok((breakdown, BreakdownSource::CurrentState));
            }
        }

        if let Some(event) = self
            .events
            .latest_of_type(mask.id, EventType::BreakdownUpdated)
            .await?
        {
            let breakdown = event
                .data
                .get(fields::BREAKDOWN)
                .map(breakdown_from_value)
                .unwrap_or_default();
            if !breakdown.is_empty() {
                return Ok((breakdown, BreakdownSource::Event));
            }
        }

        let name = mask.name();
        if !name.trim().is_empty() {
            if let Some(prediction) = self.oracle.predict(name).await? {
                if prediction.is_usable() {
                    return Ok((prediction.breakdown, BreakdownSource::Oracle));
                }
            }
        }

        Ok((Breakdown::new(), BreakdownSource::Unavailable))
    }
}

/// Trimmed, non-blank names in first-seen order
fn distinct_names(names: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .filter(|name| seen.insert(name.to_string()))
        .map(str::to_string)
        .collect()
}

/// Top candidates for one bucket, best first
fn recommend(bucket: &ComponentBucket, catalog: &[CatalogMask]) -> Vec<Recommendation> {
    let mut candidates: Vec<Recommendation> = catalog
        .iter()
        .filter_map(|mask| candidate(mask, score(bucket, &mask.components)))
        .collect();

    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    candidates.truncate(MAX_RECOMMENDATIONS);
    candidates
}

/// Rounded recommendation, or nothing when it rounds to zero
fn candidate(mask: &CatalogMask, result: Score) -> Option<Recommendation> {
    let rounded = round4(result.score);
    (rounded > 0.0).then(|| Recommendation {
        record_id: mask.record_id,
        record_name: mask.record_name.clone(),
        score: rounded,
        component_scores: result
            .component_scores
            .into_iter()
            .map(|(category, value)| (category, value.map(round4)))
            .collect(),
    })
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
