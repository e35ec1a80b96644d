//! Matching module
//!
//! Fuzzy matching of externally sourced product names against the catalog:
//! tokenizing, component extraction, scoring and the orchestration around
//! the prediction oracle and its cache.

pub mod cache;
pub mod components;
pub mod oracle;
pub mod orchestrator;
pub mod scorer;
pub mod tokenizer;

pub use cache::{BreakdownCache, CacheError, CachedBreakdown, InMemoryBreakdownCache, PgBreakdownCache};
pub use components::{breakdown_from_value, Breakdown, BreakdownEntry, Category, ComponentBucket};
pub use oracle::{HttpPredictionOracle, OracleError, Prediction, PredictionOracle, UnavailableOracle};
pub use orchestrator::{
    BreakdownSource, CatalogMask, FileMask, MatchError, MatchOrchestrator, MatchReport, MatchSettings,
    Recommendation, AUTO_MATCH_THRESHOLD,
};
pub use scorer::{component_weights, score, Score, COMPONENT_WEIGHTS};
pub use tokenizer::tokenize;
