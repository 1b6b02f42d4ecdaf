//! Policy authoring.
//!
//! # Purpose
//! Validates and stores policies: direct creation (single or batch), bulk init
//! of every policy on one resource, partial updates, and deletion.
//!
//! # Key invariants
//! - A stored policy only names operations its resource type declares, and
//!   type-scoped operations only on type-level policies.
//! - No operation is both allowed and denied by the same policy.
//! - Obligations hang off allow items only; each reference resolves at
//!   authoring time and names a given obligation type at most once per item.
//! - A policy held by a role stays inside that role's resource-type scope.
//! - Multi-policy writes are all-or-nothing.
use crate::clock::Clock;
use crate::directory::Directory;
use crate::engine::scope::first_unscoped_allow;
use crate::error::{ServiceError, ServiceResult};
use crate::model::{
    AccessorInfo, NewPolicy, ObligationSource, Policy, PolicyItem, PolicyOperation, PolicyPatch,
    ResourceInfo, ResourceType,
};
use crate::registry::{ObligationRegistry, ResourceTypeRegistry, RoleRegistry, validate_value};
use crate::store::AuthorizationStore;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use warden_authz::{AccessorType, validate_end_time};

pub struct PolicyService {
    store: Arc<dyn AuthorizationStore>,
    resource_types: Arc<ResourceTypeRegistry>,
    roles: Arc<RoleRegistry>,
    obligations: Arc<ObligationRegistry>,
    directory: Arc<dyn Directory>,
    clock: Arc<dyn Clock>,
}

impl PolicyService {
    pub fn new(
        store: Arc<dyn AuthorizationStore>,
        resource_types: Arc<ResourceTypeRegistry>,
        roles: Arc<RoleRegistry>,
        obligations: Arc<ObligationRegistry>,
        directory: Arc<dyn Directory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            resource_types,
            roles,
            obligations,
            directory,
            clock,
        }
    }

    /// Create policies atomically. A collision with an existing policy for the
    /// same accessor and resource fails the whole batch with a conflict.
    pub async fn create(&self, batch: Vec<NewPolicy>) -> ServiceResult<Vec<Policy>> {
        if batch.is_empty() {
            return Err(ServiceError::invalid("no policies to create"));
        }
        let policies = self.prepare(batch).await?;
        self.store.insert_policies(policies.clone()).await?;
        tracing::info!(count = policies.len(), "policies created");
        Ok(policies)
    }

    /// Replace every policy on one resource with `batch`. An empty batch
    /// clears the resource.
    pub async fn init_resource(
        &self,
        resource_type: &str,
        resource_id: &str,
        batch: Vec<NewPolicy>,
    ) -> ServiceResult<Vec<Policy>> {
        if let Some(stray) = batch.iter().find(|new| {
            new.resource.resource_type != resource_type || new.resource.id != resource_id
        }) {
            return Err(ServiceError::invalid(format!(
                "policy for {}/{} submitted to init of {resource_type}/{resource_id}",
                stray.resource.resource_type, stray.resource.id
            )));
        }
        let policies = self.prepare(batch).await?;
        self.store
            .replace_resource_policies(resource_type, resource_id, policies.clone())
            .await?;
        tracing::info!(
            resource_type,
            resource_id,
            count = policies.len(),
            "resource policies initialized"
        );
        Ok(policies)
    }

    pub async fn update(&self, id: &str, patch: PolicyPatch) -> ServiceResult<Policy> {
        let now = self.clock.now_micros();
        if let Some(end_time) = patch.end_time {
            validate_end_time(end_time, now)?;
        }
        let mut policy = self.store.get_policy(id).await?;
        policy.apply(patch, now);
        self.validate(&policy.accessor, &policy.resource, &policy.operation)
            .await?;
        let updated = self.store.update_policy(policy).await?;
        tracing::info!(policy_id = %id, "policy updated");
        Ok(updated)
    }

    pub async fn get(&self, id: &str) -> ServiceResult<Policy> {
        Ok(self.store.get_policy(id).await?)
    }

    pub async fn delete(&self, ids: &[String]) -> ServiceResult<u64> {
        if ids.is_empty() {
            return Err(ServiceError::invalid("no policy ids to delete"));
        }
        let deleted = self.store.delete_policies(ids).await?;
        tracing::info!(requested = ids.len(), deleted, "policies deleted");
        Ok(deleted)
    }

    pub async fn list_by_accessor(&self, accessor_id: &str) -> ServiceResult<Vec<Policy>> {
        Ok(self.store.list_accessor_policies(accessor_id).await?)
    }

    pub async fn list_by_resource(
        &self,
        resource_type: &str,
        resource_id: &str,
    ) -> ServiceResult<Vec<Policy>> {
        Ok(self
            .store
            .list_resource_policies(resource_type, resource_id)
            .await?)
    }

    async fn prepare(&self, batch: Vec<NewPolicy>) -> ServiceResult<Vec<Policy>> {
        let now = self.clock.now_micros();
        let mut policies = Vec::with_capacity(batch.len());
        for new in batch {
            validate_end_time(new.end_time, now)?;
            self.validate(&new.accessor, &new.resource, &new.operation)
                .await?;
            policies.push(Policy::from_new(uuid::Uuid::new_v4().to_string(), new, now));
        }
        self.fill_accessor_names(&mut policies).await;
        Ok(policies)
    }

    async fn validate(
        &self,
        accessor: &AccessorInfo,
        resource: &ResourceInfo,
        operation: &PolicyOperation,
    ) -> ServiceResult<()> {
        if accessor.id.trim().is_empty() {
            return Err(ServiceError::invalid("accessor id must not be empty"));
        }
        if resource.id.trim().is_empty() {
            return Err(ServiceError::invalid("resource id must not be empty"));
        }
        if operation.is_empty() {
            return Err(ServiceError::invalid("policy grants or denies nothing"));
        }
        if let Some(op) = operation.duplicate() {
            return Err(ServiceError::invalid(format!("operation {op} listed twice")));
        }
        if let Some(op) = operation.overlap() {
            return Err(ServiceError::invalid(format!(
                "operation {op} is both allowed and denied"
            )));
        }

        let Some(resource_type) = self.resource_types.get(&resource.resource_type).await? else {
            return Err(ServiceError::invalid(format!(
                "unknown resource type {}",
                resource.resource_type
            )));
        };
        for item in operation.allow.iter().chain(&operation.deny) {
            if resource_type.operation(&item.id).is_none() {
                return Err(ServiceError::invalid(format!(
                    "resource type {} has no operation {}",
                    resource_type.id, item.id
                )));
            }
            if !resource_type.grantable(&item.id, &resource.id) {
                return Err(ServiceError::invalid(format!(
                    "operation {} can only be granted on the whole resource type",
                    item.id
                )));
            }
        }
        if let Some(item) = operation.deny.iter().find(|item| !item.obligations.is_empty()) {
            return Err(ServiceError::invalid(format!(
                "denied operation {} cannot carry obligations",
                item.id
            )));
        }
        for item in &operation.allow {
            self.validate_obligations(&resource_type, item).await?;
        }

        if accessor.accessor_type == AccessorType::Role {
            let Some(role) = self.roles.get(&accessor.id).await? else {
                return Err(ServiceError::invalid(format!("unknown role {}", accessor.id)));
            };
            if let Some(op) =
                first_unscoped_allow(&role.resource_type_scope, &resource_type.id, operation)
            {
                return Err(ServiceError::invalid(format!(
                    "role {} may not be granted {}:{op}",
                    role.id, resource_type.id
                )));
            }
        }
        Ok(())
    }

    async fn validate_obligations(
        &self,
        resource_type: &ResourceType,
        item: &PolicyItem,
    ) -> ServiceResult<()> {
        let mut seen_types = HashSet::new();
        for reference in &item.obligations {
            if !seen_types.insert(reference.type_id.as_str()) {
                return Err(ServiceError::invalid(format!(
                    "obligation type {} attached twice to operation {}",
                    reference.type_id, item.id
                )));
            }
            let source = reference.source().map_err(|err| {
                ServiceError::invalid(format!(
                    "obligation {} on operation {}: {err}",
                    reference.type_id, item.id
                ))
            })?;
            let Some(obligation_type) = self.obligations.get_type(&reference.type_id).await? else {
                return Err(ServiceError::invalid(format!(
                    "unknown obligation type {}",
                    reference.type_id
                )));
            };
            if !obligation_type
                .applicable
                .permits(&resource_type.id, &item.id)
            {
                return Err(ServiceError::invalid(format!(
                    "obligation type {} does not apply to {}:{}",
                    obligation_type.id, resource_type.id, item.id
                )));
            }
            match source {
                ObligationSource::Instance(id) => match self.obligations.get(id).await? {
                    Some(instance) if instance.type_id == obligation_type.id => {}
                    Some(instance) => {
                        return Err(ServiceError::invalid(format!(
                            "obligation {id} is of type {}, not {}",
                            instance.type_id, obligation_type.id
                        )));
                    }
                    None => {
                        return Err(ServiceError::invalid(format!("unknown obligation {id}")));
                    }
                },
                ObligationSource::Inline(Value::Null) => {
                    if obligation_type.default_value.is_none() {
                        return Err(ServiceError::invalid(format!(
                            "obligation type {} has no default value",
                            obligation_type.id
                        )));
                    }
                }
                ObligationSource::Inline(value) => {
                    validate_value(&obligation_type, value).map_err(ServiceError::InvalidInput)?;
                }
            }
        }
        Ok(())
    }

    /// Fill missing accessor display names. Lookup failures leave names empty.
    async fn fill_accessor_names(&self, policies: &mut [Policy]) {
        let mut missing: Vec<String> = policies
            .iter()
            .filter(|policy| policy.accessor.name.is_none())
            .filter(|policy| policy.accessor.accessor_type != AccessorType::Role)
            .map(|policy| policy.accessor.id.clone())
            .collect();
        missing.sort();
        missing.dedup();

        if !missing.is_empty() {
            match self.directory.names(&missing).await {
                Ok(names) => {
                    for policy in policies.iter_mut() {
                        if policy.accessor.name.is_none() {
                            policy.accessor.name = names.get(&policy.accessor.id).cloned();
                        }
                    }
                }
                Err(err) => tracing::warn!(error = %err, "accessor name lookup failed"),
            }
        }

        for policy in policies.iter_mut() {
            if policy.accessor.name.is_none()
                && policy.accessor.accessor_type == AccessorType::Role
            {
                if let Ok(Some(role)) = self.roles.get(&policy.accessor.id).await {
                    policy.accessor.name = Some(role.name);
                }
            }
        }
    }
}
