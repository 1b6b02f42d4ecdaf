use super::TtlCache;
use crate::engine::scope::first_unscoped_allow;
use crate::error::{ServiceError, ServiceResult};
use crate::model::{AccessorInfo, NewRole, Role, RoleMember, RolePatch};
use crate::store::{AuthorizationStore, StoreResult, found};
use std::sync::Arc;
use std::time::Duration;
use warden_authz::{AccessorType, ResourceTypeScope};

pub struct RoleRegistry {
    store: Arc<dyn AuthorizationStore>,
    cache: TtlCache<Role>,
}

impl RoleRegistry {
    pub fn new(store: Arc<dyn AuthorizationStore>, ttl: Duration) -> Self {
        Self {
            store,
            cache: TtlCache::new(ttl),
        }
    }

    pub async fn get(&self, id: &str) -> StoreResult<Option<Role>> {
        self.cache
            .get_or_load(id, || async { found(self.store.get_role(id).await) })
            .await
    }

    /// Known roles among `ids`, in input order.
    pub async fn get_many(&self, ids: &[String]) -> StoreResult<Vec<Role>> {
        let mut roles = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(role) = self.get(id).await? {
                roles.push(role);
            }
        }
        Ok(roles)
    }

    pub async fn list(&self) -> StoreResult<Vec<Role>> {
        self.store.list_roles().await
    }

    pub async fn create(&self, new: NewRole) -> ServiceResult<Role> {
        validate_name(&new.name)?;
        new.resource_type_scope.validate()?;
        let role = Role {
            id: new
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            name: new.name,
            description: new.description,
            source: new.source,
            resource_type_scope: new.resource_type_scope,
        };
        let created = self.store.create_role(role).await?;
        self.cache.invalidate(&created.id);
        tracing::info!(role_id = %created.id, "role created");
        Ok(created)
    }

    /// Patch a role. Narrowing the scope is rejected while policies held by the
    /// role would fall outside it.
    pub async fn update(&self, id: &str, patch: RolePatch) -> ServiceResult<Role> {
        let mut role = self.store.get_role(id).await?;
        if let Some(name) = patch.name {
            validate_name(&name)?;
            role.name = name;
        }
        if let Some(description) = patch.description {
            role.description = description;
        }
        if let Some(scope) = patch.resource_type_scope {
            scope.validate()?;
            self.ensure_policies_fit(id, &scope).await?;
            role.resource_type_scope = scope;
        }
        let updated = self.store.update_role(role).await?;
        self.cache.invalidate(id);
        Ok(updated)
    }

    pub async fn delete(&self, id: &str) -> ServiceResult<()> {
        self.store.delete_role(id).await?;
        self.cache.invalidate(id);
        tracing::info!(role_id = %id, "role deleted");
        Ok(())
    }

    pub async fn add_members(
        &self,
        role_id: &str,
        members: Vec<AccessorInfo>,
    ) -> ServiceResult<()> {
        if let Some(nested) = members
            .iter()
            .find(|member| member.accessor_type == AccessorType::Role)
        {
            return Err(ServiceError::invalid(format!(
                "role {} cannot be a member of another role",
                nested.id
            )));
        }
        if let Some(blank) = members.iter().find(|member| member.id.trim().is_empty()) {
            return Err(ServiceError::invalid(format!(
                "empty {} id in role members",
                blank.accessor_type
            )));
        }
        self.store.add_role_members(role_id, members).await?;
        Ok(())
    }

    pub async fn remove_members(
        &self,
        role_id: &str,
        accessor_ids: &[String],
    ) -> ServiceResult<u64> {
        Ok(self.store.remove_role_members(role_id, accessor_ids).await?)
    }

    pub async fn members(&self, role_id: &str) -> ServiceResult<Vec<RoleMember>> {
        if self.get(role_id).await?.is_none() {
            return Err(ServiceError::NotFound(format!("role {role_id}")));
        }
        Ok(self.store.list_role_members(role_id).await?)
    }

    async fn ensure_policies_fit(
        &self,
        role_id: &str,
        scope: &ResourceTypeScope,
    ) -> ServiceResult<()> {
        for policy in self.store.list_accessor_policies(role_id).await? {
            if let Some(op) =
                first_unscoped_allow(scope, &policy.resource.resource_type, &policy.operation)
            {
                return Err(ServiceError::Conflict(format!(
                    "policy {} grants {}:{op} outside the new scope of role {role_id}",
                    policy.id, policy.resource.resource_type
                )));
            }
        }
        Ok(())
    }
}

fn validate_name(name: &str) -> ServiceResult<()> {
    if name.trim().is_empty() {
        return Err(ServiceError::invalid("role name must not be empty"));
    }
    Ok(())
}
