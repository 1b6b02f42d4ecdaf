use super::TtlCache;
use crate::error::{ServiceError, ServiceResult};
use crate::model::ResourceType;
use crate::store::{AuthorizationStore, StoreResult, found};
use std::sync::Arc;
use std::time::Duration;

pub struct ResourceTypeRegistry {
    store: Arc<dyn AuthorizationStore>,
    cache: TtlCache<ResourceType>,
}

impl ResourceTypeRegistry {
    pub fn new(store: Arc<dyn AuthorizationStore>, ttl: Duration) -> Self {
        Self {
            store,
            cache: TtlCache::new(ttl),
        }
    }

    /// Cached lookup; `None` when the type is unknown.
    pub async fn get(&self, id: &str) -> StoreResult<Option<ResourceType>> {
        self.cache
            .get_or_load(id, || async { found(self.store.get_resource_type(id).await) })
            .await
    }

    pub async fn list(&self) -> StoreResult<Vec<ResourceType>> {
        self.store.list_resource_types().await
    }

    /// Create or replace a resource type.
    pub async fn put(&self, resource_type: ResourceType) -> ServiceResult<ResourceType> {
        resource_type.validate().map_err(ServiceError::InvalidInput)?;
        let id = resource_type.id.clone();
        let stored = self.store.upsert_resource_type(resource_type).await?;
        self.cache.invalidate(&id);
        tracing::info!(resource_type = %id, "resource type stored");
        Ok(stored)
    }

    /// Delete a resource type together with every policy on it.
    pub async fn delete(&self, id: &str) -> ServiceResult<()> {
        self.store.delete_resource_type(id).await?;
        self.cache.invalidate(id);
        tracing::info!(resource_type = %id, "resource type deleted");
        Ok(())
    }
}
