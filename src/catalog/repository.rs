//! Materialized mask repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{fields, Attributes};

/// Current state of a mask as written by the last reprojection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterializedMask {
    pub id: Uuid,
    pub attributes: Attributes,
    pub updated_at: DateTime<Utc>,
}

impl MaterializedMask {
    /// Name used when presenting the mask as a match candidate
    pub fn name(&self) -> &str {
        self.attributes
            .get(fields::MODEL_CODE)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Id of the canonical mask this one duplicates, if marked
    pub fn duplicate_of(&self) -> Option<&Value> {
        self.attributes
            .get(fields::DUPLICATE_OF)
            .filter(|value| !value.is_null())
    }

    pub fn is_duplicate(&self) -> bool {
        self.duplicate_of().is_some()
    }

    /// Breakdown written under `current_state`, when non-empty
    pub fn current_breakdown(&self) -> Option<&Value> {
        self.attributes
            .get(fields::CURRENT_STATE)
            .and_then(|state| state.get(fields::BREAKDOWN))
            .filter(|breakdown| breakdown.as_array().is_some_and(|list| !list.is_empty()))
    }
}

/// Catalog errors
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Storage for materialized masks
#[async_trait]
pub trait MaskRepository: Send + Sync {
    /// Overwrite the materialized attributes of a mask
    async fn materialize(
        &self,
        id: Uuid,
        attributes: Attributes,
    ) -> Result<MaterializedMask, CatalogError>;

    async fn find(&self, id: Uuid) -> Result<Option<MaterializedMask>, CatalogError>;

    /// Every materialized mask, oldest first
    async fn list(&self) -> Result<Vec<MaterializedMask>, CatalogError>;
}

/// PostgreSQL-backed mask repository
#[derive(Debug, Clone)]
pub struct PgMaskRepository {
    pool: PgPool,
}

impl PgMaskRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

type MaskRow = (Uuid, Value, DateTime<Utc>);

fn from_row((id, attributes, updated_at): MaskRow) -> Result<MaterializedMask, CatalogError> {
    Ok(MaterializedMask {
        id,
        attributes: serde_json::from_value(attributes)?,
        updated_at,
    })
}

#[async_trait]
impl MaskRepository for PgMaskRepository {
    async fn materialize(
        &self,
        id: Uuid,
        attributes: Attributes,
    ) -> Result<MaterializedMask, CatalogError> {
        let row: MaskRow = sqlx::query_as(
            r#"
            INSERT INTO masks (id, attributes, created_at, updated_at)
            VALUES ($1, $2, NOW(), NOW())
            ON CONFLICT (id)
            DO UPDATE SET attributes = $2, updated_at = NOW()
            RETURNING id, attributes, updated_at
            "#,
        )
        .bind(id)
        .bind(Value::Object(attributes))
        .fetch_one(&self.pool)
        .await?;

        from_row(row)
    }

    async fn find(&self, id: Uuid) -> Result<Option<MaterializedMask>, CatalogError> {
        let row: Option<MaskRow> = sqlx::query_as(
            "SELECT id, attributes, updated_at FROM masks WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(from_row).transpose()
    }

    async fn list(&self) -> Result<Vec<MaterializedMask>, CatalogError> {
        let rows: Vec<MaskRow> = sqlx::query_as(
            "SELECT id, attributes, updated_at FROM masks ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mask(attributes: Value) -> MaterializedMask {
        MaterializedMask {
            id: Uuid::new_v4(),
            attributes: attributes.as_object().cloned().unwrap(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_name_falls_back_to_empty() {
        assert_eq!(mask(json!({"unique_internal_model_code": "3M Aura"})).name(), "3M Aura");
        assert_eq!(mask(json!({})).name(), "");
    }

    #[test]
    fn test_null_duplicate_pointer_is_not_a_duplicate() {
        assert!(!mask(json!({"duplicate_of": null})).is_duplicate());
        assert!(mask(json!({"duplicate_of": "abc"})).is_duplicate());
    }

    #[test]
    fn test_empty_current_breakdown_is_ignored() {
        assert!(mask(json!({"current_state": {"breakdown": []}})).current_breakdown().is_none());
        assert!(mask(json!({"current_state": {"breakdown": [{"3M": "brand"}]}}))
            .current_breakdown()
            .is_some());
    }
}
