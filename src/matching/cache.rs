//! Breakdown cache
//!
//! Name-keyed store of predicted breakdowns plus a parallel map of
//! per-name prediction errors. Writes merge per name; concurrent batches
//! never overwrite each other's entries.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use tokio::sync::RwLock;

use super::components::{Breakdown, ComponentBucket};

/// Cache errors
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Cached prediction for one name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedBreakdown {
    pub breakdown: Breakdown,
    pub components: ComponentBucket,
    pub confidence: Option<f64>,
    pub source: String,
    pub predicted_at: DateTime<Utc>,
}

impl CachedBreakdown {
    pub fn new(breakdown: Breakdown, confidence: Option<f64>, source: impl Into<String>) -> Self {
        Self {
            components: ComponentBucket::from_breakdown(&breakdown),
            breakdown,
            confidence,
            source: source.into(),
            predicted_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait BreakdownCache: Send + Sync {
    /// Cached entries for the given names; missing names are absent
    async fn load(&self, names: &[String]) -> Result<BTreeMap<String, CachedBreakdown>, CacheError>;

    /// Upsert each entry under its own name
    async fn merge_entries(&self, entries: BTreeMap<String, CachedBreakdown>) -> Result<(), CacheError>;

    async fn load_errors(&self, names: &[String]) -> Result<BTreeMap<String, String>, CacheError>;

    /// Upsert each error message under its own name
    async fn merge_errors(&self, errors: BTreeMap<String, String>) -> Result<(), CacheError>;

    async fn clear_errors(&self, names: &[String]) -> Result<(), CacheError>;
}

/// In-memory breakdown cache
#[derive(Debug, Default)]
pub struct InMemoryBreakdownCache {
    entries: RwLock<BTreeMap<String, CachedBreakdown>>,
    errors: RwLock<BTreeMap<String, String>>,
}

impl InMemoryBreakdownCache {
    pub fn new() -> Self {
        Self::default()
    }
}

fn select<T: Clone>(map: &BTreeMap<String, T>, names: &[String]) -> BTreeMap<String, T> {
    names
        .iter()
        .filter_map(|name| map.get(name).map(|value| (name.clone(), value.clone())))
        .collect()
}

#[async_trait]
impl BreakdownCache for InMemoryBreakdownCache {
    async fn load(&self, names: &[String]) -> Result<BTreeMap<String, CachedBreakdown>, CacheError> {
        Ok(select(&*self.entries.read().await, names))
    }

    async fn merge_entries(&self, entries: BTreeMap<String, CachedBreakdown>) -> Result<(), CacheError> {
        self.entries.write().await.extend(entries);
        Ok(())
    }

    async fn load_errors(&self, names: &[String]) -> Result<BTreeMap<String, String>, CacheError> {
        Ok(select(&*self.errors.read().await, names))
    }

    async fn merge_errors(&self, errors: BTreeMap<String, String>) -> Result<(), CacheError> {
        self.errors.write().await.extend(errors);
        Ok(())
    }

    async fn clear_errors(&self, names: &[String]) -> Result<(), CacheError> {
        let mut errors = self.errors.write().await;
        for name in names {
            errors.remove(name);
        }
        Ok(())
    }
}

/// PostgreSQL-backed breakdown cache
#[derive(Debug, Clone)]
pub struct PgBreakdownCache {
    pool: PgPool,
}

impl PgBreakdownCache {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BreakdownCache for PgBreakdownCache {
    async fn load(&self, names: &[String]) -> Result<BTreeMap<String, CachedBreakdown>, CacheError> {
        let rows: Vec<(String, Value)> = sqlx::query_as(
            "SELECT name, entry FROM breakdown_cache WHERE name = ANY($1)",
        )
        .bind(names)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(name, entry)| -> Result<_, CacheError> { Ok((name, serde_json::from_value(entry)?)) })
            .collect()
    }

    async fn merge_entries(&self, entries: BTreeMap<String, CachedBreakdown>) -> Result<(), CacheError> {
        let mut tx = self.pool.begin().await?;

        for (name, entry) in entries {
            sqlx::query(
                r#"
                INSERT INTO breakdown_cache (name, entry, updated_at)
                VALUES ($1, $2, NOW())
                ON CONFLICT (name)
                DO UPDATE SET entry = EXCLUDED.entry, updated_at = NOW()
                "#,
            )
            .bind(&name)
            .bind(serde_json::to_value(&entry)?)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn load_errors(&self, names: &[String]) -> Result<BTreeMap<String, String>, CacheError> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT name, message FROM breakdown_errors WHERE name = ANY($1)",
        )
        .bind(names)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }

    async fn merge_errors(&self, errors: BTreeMap<String, String>) -> Result<(), CacheError> {
        let mut tx = self.pool.begin().await?;

        for (name, message) in errors {
            sqlx::query(
                r#"
                INSERT INTO breakdown_errors (name, message, updated_at)
                VALUES ($1, $2, NOW())
                ON CONFLICT (name)
                DO UPDATE SET message = EXCLUDED.message, updated_at = NOW()
                "#,
            )
            .bind(&name)
            .bind(&message)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn clear_errors(&self, names: &[String]) -> Result<(), CacheError> {
        sqlx::query("DELETE FROM breakdown_errors WHERE name = ANY($1)")
            .bind(names)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::components::{BreakdownEntry, Category};

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_cached_breakdown_derives_components() {
        let entry = CachedBreakdown::new(
            vec![BreakdownEntry::new("3M", "brand"), BreakdownEntry::new("Aura", "model")],
            Some(0.9),
            "oracle",
        );
        assert_eq!(entry.components.tokens(Category::Model), ["Aura"]);
    }

    #[tokio::test]
    async fn test_merges_are_per_name() {
        let cache = InMemoryBreakdownCache::new();
        let first = CachedBreakdown::new(vec![BreakdownEntry::new("3M", "brand")], None, "oracle");
        let second = CachedBreakdown::new(vec![BreakdownEntry::new("Moldex", "brand")], None, "oracle");

        cache
            .merge_entries(BTreeMap::from([("a".to_string(), first.clone())]))
            .await
            .unwrap();
        cache
            .merge_entries(BTreeMap::from([("b".to_string(), second.clone())]))
            .await
            .unwrap();

        let loaded = cache.load(&names(&["a", "b", "c"])).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded["a"], first);
        assert_eq!(loaded["b"], second);
    }

    #[tokio::test]
    async fn test_clear_errors() {
        let cache = InMemoryBreakdownCache::new();
        cache
            .merge_errors(BTreeMap::from([
                ("a".to_string(), "no prediction".to_string()),
                ("b".to_string(), "no prediction".to_string()),
            ]))
            .await
            .unwrap();

        cache.clear_errors(&names(&["a"])).await.unwrap();

        let errors = cache.load_errors(&names(&["a", "b"])).await.unwrap();
        assert_eq!(errors.keys().collect::<Vec<_>>(), vec!["b"]);
    }
}
