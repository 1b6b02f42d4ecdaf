//! Turns obligation references on allowed operations into concrete values.
//!
//! References that no longer resolve (deleted type or instance, a type that
//! is not applicable to the resource, an instance of another type) are dropped
//! with a warning. A dangling reference never fails a decision.
use crate::model::{ObligationRef, ObligationSource, ResolvedObligation};
use crate::registry::ObligationRegistry;
use crate::store::StoreResult;
use serde_json::Value;
use std::sync::Arc;

#[derive(Clone)]
pub struct ObligationResolver {
    registry: Arc<ObligationRegistry>,
}

impl ObligationResolver {
    pub fn new(registry: Arc<ObligationRegistry>) -> Self {
        Self { registry }
    }

    pub async fn resolve(
        &self,
        resource_type: &str,
        operation: &str,
        refs: &[ObligationRef],
    ) -> StoreResult<Vec<ResolvedObligation>> {
        let mut resolved = Vec::with_capacity(refs.len());
        for reference in refs {
            if let Some(obligation) = self.resolve_one(resource_type, operation, reference).await? {
                resolved.push(obligation);
            }
        }
        Ok(resolved)
    }

    async fn resolve_one(
        &self,
        resource_type: &str,
        operation: &str,
        reference: &ObligationRef,
    ) -> StoreResult<Option<ResolvedObligation>> {
        let source = match reference.source() {
            Ok(source) => source,
            Err(err) => {
                tracing::warn!(
                    obligation_type = %reference.type_id,
                    error = %err,
                    "skipping malformed obligation reference"
                );
                return Ok(None);
            }
        };
        let Some(obligation_type) = self.registry.get_type(&reference.type_id).await? else {
            tracing::warn!(
                obligation_type = %reference.type_id,
                "skipping obligation of unknown type"
            );
            return Ok(None);
        };
        if !obligation_type.applicable.permits(resource_type, operation) {
            tracing::warn!(
                obligation_type = %reference.type_id,
                resource_type,
                operation,
                "skipping obligation not applicable to operation"
            );
            return Ok(None);
        }

        match source {
            ObligationSource::Instance(id) => {
                let Some(instance) = self.registry.get(id).await? else {
                    tracing::warn!(obligation_id = %id, "skipping missing obligation instance");
                    return Ok(None);
                };
                if instance.type_id != reference.type_id {
                    tracing::warn!(
                        obligation_id = %id,
                        expected = %reference.type_id,
                        actual = %instance.type_id,
                        "skipping obligation instance of another type"
                    );
                    return Ok(None);
                }
                Ok(Some(ResolvedObligation {
                    type_id: instance.type_id,
                    id: Some(instance.id),
                    value: instance.value,
                }))
            }
            ObligationSource::Inline(value) => {
                let value = match (value, &obligation_type.default_value) {
                    (Value::Null, Some(default)) => default.clone(),
                    (value, _) => value.clone(),
                };
                Ok(Some(ResolvedObligation {
                    type_id: reference.type_id.clone(),
                    id: None,
                    value,
                }))
            }
        }
    }
}
