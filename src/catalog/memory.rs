//! In-memory mask repository

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::Attributes;

use super::repository::{CatalogError, MaskRepository, MaterializedMask};

/// Keeps masks in creation order so `list` matches the Postgres ordering
#[derive(Debug, Default)]
pub struct InMemoryMaskRepository {
    masks: RwLock<Vec<MaterializedMask>>,
}

impl InMemoryMaskRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MaskRepository for InMemoryMaskRepository {
    async fn materialize(
        &self,
        id: Uuid,
        attributes: Attributes,
    ) -> Result<MaterializedMask, CatalogError> {
        let mask = MaterializedMask {
            id,
            attributes,
            updated_at: Utc::now(),
        };

        let mut masks = self.masks.write().await;
        match masks.iter_mut().find(|m| m.id == id) {
            Some(existing) => *existing = mask.clone(),
            None => masks.push(mask.clone()),
        }

        Ok(mask)
    }

    async fn find(&self, id: Uuid) -> Result<Option<MaterializedMask>, CatalogError> {
        Ok(self.masks.read().await.iter().find(|m| m.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<MaterializedMask>, CatalogError> {
        Ok(self.masks.read().await.clone())
    }
}
