use super::TtlCache;
use crate::error::{ServiceError, ServiceResult};
use crate::model::{NewObligation, Obligation, ObligationType};
use crate::store::{AuthorizationStore, StoreResult, found};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Obligation types and their stored instances.
pub struct ObligationRegistry {
    store: Arc<dyn AuthorizationStore>,
    types: TtlCache<ObligationType>,
    instances: TtlCache<Obligation>,
}

/// Check `value` against the type's JSON Schema, collecting every violation.
pub fn validate_value(obligation_type: &ObligationType, value: &Value) -> Result<(), String> {
    let validator = jsonschema::validator_for(&obligation_type.schema).map_err(|err| {
        format!(
            "obligation type {} has an invalid schema: {err}",
            obligation_type.id
        )
    })?;
    let errors: Vec<String> = validator
        .iter_errors(value)
        .map(|err| format!("{}: {}", err.instance_path, err))
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(format!(
            "value rejected by obligation type {}: {}",
            obligation_type.id,
            errors.join("; ")
        ))
    }
}

impl ObligationRegistry {
    pub fn new(store: Arc<dyn AuthorizationStore>, ttl: Duration) -> Self {
        Self {
            store,
            types: TtlCache::new(ttl),
            instances: TtlCache::new(ttl),
        }
    }

    pub async fn get_type(&self, id: &str) -> StoreResult<Option<ObligationType>> {
        self.types
            .get_or_load(id, || async { found(self.store.get_obligation_type(id).await) })
            .await
    }

    pub async fn get(&self, id: &str) -> StoreResult<Option<Obligation>> {
        self.instances
            .get_or_load(id, || async { found(self.store.get_obligation(id).await) })
            .await
    }

    pub async fn list_types(&self) -> StoreResult<Vec<ObligationType>> {
        self.store.list_obligation_types().await
    }

    pub async fn list(&self, type_id: Option<&str>) -> StoreResult<Vec<Obligation>> {
        self.store.list_obligations(type_id).await
    }

    pub async fn put_type(&self, obligation_type: ObligationType) -> ServiceResult<ObligationType> {
        if obligation_type.id.trim().is_empty() {
            return Err(ServiceError::invalid("obligation type id must not be empty"));
        }
        if let Err(err) = jsonschema::validator_for(&obligation_type.schema) {
            return Err(ServiceError::invalid(format!(
                "obligation type {} has an invalid schema: {err}",
                obligation_type.id
            )));
        }
        if let Some(default) = &obligation_type.default_value {
            validate_value(&obligation_type, default).map_err(ServiceError::InvalidInput)?;
        }
        obligation_type.applicable.validate()?;
        let id = obligation_type.id.clone();
        let stored = self.store.upsert_obligation_type(obligation_type).await?;
        self.types.invalidate(&id);
        tracing::info!(obligation_type = %id, "obligation type stored");
        Ok(stored)
    }

    pub async fn delete_type(&self, id: &str) -> ServiceResult<()> {
        let instances = self.store.list_obligations(Some(id)).await?;
        self.store.delete_obligation_type(id).await?;
        self.types.invalidate(id);
        for instance in instances {
            self.instances.invalidate(&instance.id);
        }
        Ok(())
    }

    pub async fn create(&self, new: NewObligation) -> ServiceResult<Obligation> {
        let Some(obligation_type) = self.get_type(&new.type_id).await? else {
            return Err(ServiceError::invalid(format!(
                "unknown obligation type {}",
                new.type_id
            )));
        };
        validate_value(&obligation_type, &new.value).map_err(ServiceError::InvalidInput)?;
        let obligation = Obligation {
            id: new
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            type_id: new.type_id,
            name: new.name,
            description: new.description,
            value: new.value,
        };
        let created = self.store.create_obligation(obligation).await?;
        self.instances.invalidate(&created.id);
        Ok(created)
    }

    pub async fn delete(&self, id: &str) -> ServiceResult<()> {
        self.store.delete_obligation(id).await?;
        self.instances.invalidate(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;
    use serde_json::json;
    use warden_authz::ResourceTypeScope;

    fn watermark() -> ObligationType {
        ObligationType {
            id: "watermark".to_string(),
            name: "Watermark".to_string(),
            description: String::new(),
            schema: json!({
                "type": "object",
                "properties": {"text": {"type": "string"}},
                "required": ["text"]
            }),
            default_value: Some(json!({"text": "CONFIDENTIAL"})),
            ui_schema: None,
            applicable: ResourceTypeScope::of_types(["doc"]),
        }
    }

    fn registry() -> ObligationRegistry {
        ObligationRegistry::new(Arc::new(InMemoryStore::new()), Duration::from_secs(60))
    }

    #[tokio::test]
    async fn default_value_must_match_schema() {
        let registry = registry();
        let mut bad = watermark();
        bad.default_value = Some(json!({"text": 7}));
        assert!(matches!(
            registry.put_type(bad).await,
            Err(ServiceError::InvalidInput(_))
        ));
        registry.put_type(watermark()).await.expect("valid type");
    }

    #[tokio::test]
    async fn instances_are_validated_against_their_type() {
        let registry = registry();
        registry.put_type(watermark()).await.expect("type");

        let rejected = registry
            .create(NewObligation {
                id: Some("wm-bad".to_string()),
                type_id: "watermark".to_string(),
                name: "bad".to_string(),
                description: String::new(),
                value: json!({}),
            })
            .await;
        assert!(matches!(rejected, Err(ServiceError::InvalidInput(_))));

        let created = registry
            .create(NewObligation {
                id: Some("wm-1".to_string()),
                type_id: "watermark".to_string(),
                name: "internal".to_string(),
                description: String::new(),
                value: json!({"text": "INTERNAL"}),
            })
            .await
            .expect("create");
        assert_eq!(registry.get(&created.id).await.expect("get"), Some(created));
    }

    #[tokio::test]
    async fn unknown_type_is_invalid_input() {
        let registry = registry();
        let err = registry
            .create(NewObligation {
                id: None,
                type_id: "stamp".to_string(),
                name: "x".to_string(),
                description: String::new(),
                value: json!(null),
            })
            .await
            .expect_err("unknown type");
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }
}
