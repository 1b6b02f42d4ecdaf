//! In-memory implementation of the authorization store.
//!
//! # Purpose
//! Implements [`AuthorizationStore`] entirely in memory using `HashMap`s guarded
//! by `tokio::sync::RwLock`. Used for local development, tests, and deployments
//! that do not need durability.
//!
//! # Durability and consistency
//! - **Not durable**: all state is lost on process restart.
//! - **Single-process consistency**: mutations take the write lock of the map they
//!   touch, so multi-row policy writes are atomic with respect to readers.
//! - Cascades take locks in a fixed order (roles, members, policies) and never
//!   hold two of them across an `.await` on another component.
//!
//! # Metrics
//! Keeps `warden_policies_total` in step with the policy map.
use super::{
    AuthorizationStore, PolicyStore, RegistryStore, RoleStore, StoreError, StoreResult,
};
use crate::model::{
    AccessorInfo, Obligation, ObligationType, Policy, ResourceType, Role, RoleMember,
};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Key of the one-policy-per-pair invariant.
type PolicyKey = (String, String, String);

fn policy_key(policy: &Policy) -> PolicyKey {
    (
        policy.accessor.id.clone(),
        policy.resource.resource_type.clone(),
        policy.resource.id.clone(),
    )
}

#[derive(Default)]
pub struct InMemoryStore {
    /// Policies keyed by policy ID.
    policies: Arc<RwLock<HashMap<String, Policy>>>,
    /// Roles keyed by role ID.
    roles: Arc<RwLock<HashMap<String, Role>>>,
    /// Memberships keyed by `(role_id, accessor_id)`.
    members: Arc<RwLock<HashMap<(String, String), RoleMember>>>,
    resource_types: Arc<RwLock<HashMap<String, ResourceType>>>,
    obligation_types: Arc<RwLock<HashMap<String, ObligationType>>>,
    obligations: Arc<RwLock<HashMap<String, Obligation>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn record_policy_count(policies: &HashMap<String, Policy>) {
    metrics::gauge!("warden_policies_total").set(policies.len() as f64);
}

/// Reject a batch whose (accessor, resource) pairs collide with each other or
/// with policies already in `existing` (ignoring IDs listed in `replaced`).
fn check_unique(
    existing: &HashMap<String, Policy>,
    incoming: &[Policy],
    replaced: &HashSet<String>,
) -> StoreResult<()> {
    let mut taken: HashSet<PolicyKey> = existing
        .values()
        .filter(|policy| !replaced.contains(&policy.id))
        .map(policy_key)
        .collect();
    let mut ids: HashSet<&str> = existing
        .keys()
        .filter(|id| !replaced.contains(*id))
        .map(String::as_str)
        .collect();
    for policy in incoming {
        if !ids.insert(policy.id.as_str()) {
            return Err(StoreError::Conflict(format!("policy {} exists", policy.id)));
        }
        if !taken.insert(policy_key(policy)) {
            return Err(StoreError::Conflict(format!(
                "accessor {} already has a policy on {}/{}",
                policy.accessor.id, policy.resource.resource_type, policy.resource.id
            )));
        }
    }
    Ok(())
}

fn retain_counting<K, V>(map: &mut HashMap<K, V>, keep: impl Fn(&V) -> bool) -> u64 {
    let before = map.len();
    map.retain(|_, value| keep(value));
    (before - map.len()) as u64
}

#[async_trait]
impl PolicyStore for InMemoryStore {
    async fn insert_policies(&self, policies: Vec<Policy>) -> StoreResult<()> {
        let mut stored = self.policies.write().await;
        check_unique(&stored, &policies, &HashSet::new())?;
        for policy in policies {
            stored.insert(policy.id.clone(), policy);
        }
        record_policy_count(&stored);
        Ok(())
    }

    async fn get_policy(&self, id: &str) -> StoreResult<Policy> {
        self.policies
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("policy {id}")))
    }

    async fn update_policy(&self, policy: Policy) -> StoreResult<Policy> {
        let mut stored = self.policies.write().await;
        let current = stored
            .get(&policy.id)
            .ok_or_else(|| StoreError::NotFound(format!("policy {}", policy.id)))?;
        if policy_key(current) != policy_key(&policy) {
            return Err(StoreError::InvalidInput(
                "policy accessor and resource cannot change".into(),
            ));
        }
        stored.insert(policy.id.clone(), policy.clone());
        Ok(policy)
    }

    async fn delete_policies(&self, ids: &[String]) -> StoreResult<u64> {
        let mut stored = self.policies.write().await;
        let removed = ids.iter().filter(|id| stored.remove(*id).is_some()).count() as u64;
        record_policy_count(&stored);
        Ok(removed)
    }

    async fn replace_resource_policies(
        &self,
        resource_type: &str,
        resource_id: &str,
        policies: Vec<Policy>,
    ) -> StoreResult<()> {
        if let Some(stray) = policies.iter().find(|policy| {
            policy.resource.resource_type != resource_type || policy.resource.id != resource_id
        }) {
            return Err(StoreError::InvalidInput(format!(
                "policy {} does not address {resource_type}/{resource_id}",
                stray.id
            )));
        }
        let mut stored = self.policies.write().await;
        let replaced: HashSet<String> = stored
            .values()
            .filter(|policy| {
                policy.resource.resource_type == resource_type && policy.resource.id == resource_id
            })
            .map(|policy| policy.id.clone())
            .collect();
        check_unique(&stored, &policies, &replaced)?;
        stored.retain(|id, _| !replaced.contains(id));
        for policy in policies {
            stored.insert(policy.id.clone(), policy);
        }
        record_policy_count(&stored);
        Ok(())
    }

    async fn list_resource_policies(
        &self,
        resource_type: &str,
        resource_id: &str,
    ) -> StoreResult<Vec<Policy>> {
        let mut items: Vec<Policy> = self
            .policies
            .read()
            .await
            .values()
            .filter(|policy| {
                policy.resource.resource_type == resource_type && policy.resource.id == resource_id
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| a.accessor.id.cmp(&b.accessor.id));
        Ok(items)
    }

    async fn list_accessor_policies(&self, accessor_id: &str) -> StoreResult<Vec<Policy>> {
        let mut items: Vec<Policy> = self
            .policies
            .read()
            .await
            .values()
            .filter(|policy| policy.accessor.id == accessor_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| {
            (&a.resource.resource_type, &a.resource.id)
                .cmp(&(&b.resource.resource_type, &b.resource.id))
        });
        Ok(items)
    }

    async fn find_policies(
        &self,
        accessor_ids: &[String],
        resource_type: &str,
        resource_ids: &[String],
    ) -> StoreResult<Vec<Policy>> {
        let accessors: HashSet<&str> = accessor_ids.iter().map(String::as_str).collect();
        let resources: HashSet<&str> = resource_ids.iter().map(String::as_str).collect();
        Ok(self
            .policies
            .read()
            .await
            .values()
            .filter(|policy| {
                policy.resource.resource_type == resource_type
                    && accessors.contains(policy.accessor.id.as_str())
                    && resources.contains(policy.resource.id.as_str())
            })
            .cloned()
            .collect())
    }

    async fn find_type_policies(
        &self,
        accessor_ids: &[String],
        resource_type: &str,
    ) -> StoreResult<Vec<Policy>> {
        let accessors: HashSet<&str> = accessor_ids.iter().map(String::as_str).collect();
        Ok(self
            .policies
            .read()
            .await
            .values()
            .filter(|policy| {
                policy.resource.resource_type == resource_type
                    && accessors.contains(policy.accessor.id.as_str())
            })
            .cloned()
            .collect())
    }

    async fn delete_accessor_policies(&self, accessor_id: &str) -> StoreResult<u64> {
        let mut stored = self.policies.write().await;
        let removed = retain_counting(&mut stored, |policy| policy.accessor.id != accessor_id);
        record_policy_count(&stored);
        Ok(removed)
    }

    async fn delete_resource_policies(
        &self,
        resource_type: &str,
        resource_id: &str,
    ) -> StoreResult<u64> {
        let mut stored = self.policies.write().await;
        let removed = retain_counting(&mut stored, |policy| {
            !(policy.resource.resource_type == resource_type && policy.resource.id == resource_id)
        });
        record_policy_count(&stored);
        Ok(removed)
    }

    async fn delete_expired_policies(&self, now_micros: i64) -> StoreResult<u64> {
        let mut stored = self.policies.write().await;
        let removed = retain_counting(&mut stored, |policy| !policy.is_expired(now_micros));
        record_policy_count(&stored);
        Ok(removed)
    }

    async fn rename_policy_accessor(&self, accessor_id: &str, name: &str) -> StoreResult<u64> {
        let mut stored = self.policies.write().await;
        let mut touched = 0;
        for policy in stored.values_mut() {
            if policy.accessor.id == accessor_id {
                policy.accessor.name = Some(name.to_string());
                touched += 1;
            }
        }
        Ok(touched)
    }

    async fn rename_policy_resource(
        &self,
        resource_type: &str,
        resource_id: &str,
        name: &str,
    ) -> StoreResult<u64> {
        let mut stored = self.policies.write().await;
        let mut touched = 0;
        for policy in stored.values_mut() {
            if policy.resource.resource_type == resource_type && policy.resource.id == resource_id
            {
                policy.resource.name = Some(name.to_string());
                touched += 1;
            }
        }
        Ok(touched)
    }
}

#[async_trait]
impl RoleStore for InMemoryStore {
    async fn create_role(&self, role: Role) -> StoreResult<Role> {
        let mut roles = self.roles.write().await;
        if roles.contains_key(&role.id) {
            return Err(StoreError::Conflict(format!("role {} exists", role.id)));
        }
        if roles.values().any(|existing| existing.name == role.name) {
            return Err(StoreError::Conflict(format!("role name {} taken", role.name)));
        }
        roles.insert(role.id.clone(), role.clone());
        Ok(role)
    }

    async fn get_role(&self, id: &str) -> StoreResult<Role> {
        self.roles
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("role {id}")))
    }

    async fn get_roles(&self, ids: &[String]) -> StoreResult<Vec<Role>> {
        let roles = self.roles.read().await;
        Ok(ids.iter().filter_map(|id| roles.get(id).cloned()).collect())
    }

    async fn list_roles(&self) -> StoreResult<Vec<Role>> {
        let mut items: Vec<Role> = self.roles.read().await.values().cloned().collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(items)
    }

    async fn update_role(&self, role: Role) -> StoreResult<Role> {
        let mut roles = self.roles.write().await;
        if !roles.contains_key(&role.id) {
            return Err(StoreError::NotFound(format!("role {}", role.id)));
        }
        if roles
            .values()
            .any(|existing| existing.id != role.id && existing.name == role.name)
        {
            return Err(StoreError::Conflict(format!("role name {} taken", role.name)));
        }
        roles.insert(role.id.clone(), role.clone());
        Ok(role)
    }

    async fn delete_role(&self, id: &str) -> StoreResult<()> {
        let mut roles = self.roles.write().await;
        if roles.remove(id).is_none() {
            return Err(StoreError::NotFound(format!("role {id}")));
        }
        drop(roles);
        // Cascade: memberships of the role, then policies held by the role.
        self.members
            .write()
            .await
            .retain(|(role_id, _), _| role_id != id);
        let mut policies = self.policies.write().await;
        policies.retain(|_, policy| policy.accessor.id != id);
        record_policy_count(&policies);
        Ok(())
    }

    async fn add_role_members(
        &self,
        role_id: &str,
        members: Vec<AccessorInfo>,
    ) -> StoreResult<()> {
        if !self.roles.read().await.contains_key(role_id) {
            return Err(StoreError::NotFound(format!("role {role_id}")));
        }
        let mut stored = self.members.write().await;
        for accessor in members {
            stored.insert(
                (role_id.to_string(), accessor.id.clone()),
                RoleMember {
                    role_id: role_id.to_string(),
                    accessor,
                },
            );
        }
        Ok(())
    }

    async fn remove_role_members(
        &self,
        role_id: &str,
        accessor_ids: &[String],
    ) -> StoreResult<u64> {
        let mut stored = self.members.write().await;
        let removed = accessor_ids
            .iter()
            .filter(|accessor_id| {
                stored
                    .remove(&(role_id.to_string(), (*accessor_id).clone()))
                    .is_some()
            })
            .count();
        Ok(removed as u64)
    }

    async fn list_role_members(&self, role_id: &str) -> StoreResult<Vec<RoleMember>> {
        let mut items: Vec<RoleMember> = self
            .members
            .read()
            .await
            .values()
            .filter(|member| member.role_id == role_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.accessor.id.cmp(&b.accessor.id));
        Ok(items)
    }

    async fn roles_of_accessors(&self, accessor_ids: &[String]) -> StoreResult<Vec<String>> {
        let accessors: HashSet<&str> = accessor_ids.iter().map(String::as_str).collect();
        let roles: BTreeSet<String> = self
            .members
            .read()
            .await
            .values()
            .filter(|member| accessors.contains(member.accessor.id.as_str()))
            .map(|member| member.role_id.clone())
            .collect();
        Ok(roles.into_iter().collect())
    }

    async fn delete_accessor_memberships(&self, accessor_id: &str) -> StoreResult<u64> {
        let mut stored = self.members.write().await;
        Ok(retain_counting(&mut stored, |member| {
            member.accessor.id != accessor_id
        }))
    }

    async fn rename_member_accessor(&self, accessor_id: &str, name: &str) -> StoreResult<u64> {
        let mut stored = self.members.write().await;
        let mut touched = 0;
        for member in stored.values_mut() {
            if member.accessor.id == accessor_id {
                member.accessor.name = Some(name.to_string());
                touched += 1;
            }
        }
        Ok(touched)
    }
}

#[async_trait]
impl RegistryStore for InMemoryStore {
    async fn upsert_resource_type(&self, resource_type: ResourceType) -> StoreResult<ResourceType> {
        self.resource_types
            .write()
            .await
            .insert(resource_type.id.clone(), resource_type.clone());
        Ok(resource_type)
    }

    async fn get_resource_type(&self, id: &str) -> StoreResult<ResourceType> {
        self.resource_types
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("resource type {id}")))
    }

    async fn list_resource_types(&self) -> StoreResult<Vec<ResourceType>> {
        let mut items: Vec<ResourceType> =
            self.resource_types.read().await.values().cloned().collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(items)
    }

    async fn delete_resource_type(&self, id: &str) -> StoreResult<()> {
        if self.resource_types.write().await.remove(id).is_none() {
            return Err(StoreError::NotFound(format!("resource type {id}")));
        }
        let mut policies = self.policies.write().await;
        policies.retain(|_, policy| policy.resource.resource_type != id);
        record_policy_count(&policies);
        Ok(())
    }

    async fn upsert_obligation_type(
        &self,
        obligation_type: ObligationType,
    ) -> StoreResult<ObligationType> {
        self.obligation_types
            .write()
            .await
            .insert(obligation_type.id.clone(), obligation_type.clone());
        Ok(obligation_type)
    }

    async fn get_obligation_type(&self, id: &str) -> StoreResult<ObligationType> {
        self.obligation_types
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("obligation type {id}")))
    }

    async fn list_obligation_types(&self) -> StoreResult<Vec<ObligationType>> {
        let mut items: Vec<ObligationType> =
            self.obligation_types.read().await.values().cloned().collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(items)
    }

    async fn delete_obligation_type(&self, id: &str) -> StoreResult<()> {
        if self.obligation_types.write().await.remove(id).is_none() {
            return Err(StoreError::NotFound(format!("obligation type {id}")));
        }
        self.obligations
            .write()
            .await
            .retain(|_, obligation| obligation.type_id != id);
        Ok(())
    }

    async fn create_obligation(&self, obligation: Obligation) -> StoreResult<Obligation> {
        let mut stored = self.obligations.write().await;
        if stored.contains_key(&obligation.id) {
            return Err(StoreError::Conflict(format!(
                "obligation {} exists",
                obligation.id
            )));
        }
        stored.insert(obligation.id.clone(), obligation.clone());
        Ok(obligation)
    }

    async fn get_obligation(&self, id: &str) -> StoreResult<Obligation> {
        self.obligations
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("obligation {id}")))
    }

    async fn list_obligations(&self, type_id: Option<&str>) -> StoreResult<Vec<Obligation>> {
        let mut items: Vec<Obligation> = self
            .obligations
            .read()
            .await
            .values()
            .filter(|obligation| type_id.is_none_or(|type_id| obligation.type_id == type_id))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(items)
    }

    async fn delete_obligation(&self, id: &str) -> StoreResult<()> {
        if self.obligations.write().await.remove(id).is_none() {
            return Err(StoreError::NotFound(format!("obligation {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl AuthorizationStore for InMemoryStore {
    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn is_durable(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewPolicy, PolicyOperation, ResourceInfo, RoleSource};
    use warden_authz::{AccessorType, NEVER_EXPIRES, ResourceTypeScope};

    fn policy(id: &str, accessor: &str, resource_id: &str, end_time: i64) -> Policy {
        Policy::from_new(
            id.to_string(),
            NewPolicy {
                accessor: AccessorInfo::new(accessor, AccessorType::User),
                resource: ResourceInfo::new("doc", resource_id),
                operation: PolicyOperation::allowing(["read"]),
                condition: Default::default(),
                end_time,
            },
            0,
        )
    }

    #[tokio::test]
    async fn second_policy_for_same_pair_conflicts() {
        let store = InMemoryStore::new();
        store
            .insert_policies(vec![policy("p1", "u1", "d1", NEVER_EXPIRES)])
            .await
            .expect("insert");
        let err = store
            .insert_policies(vec![policy("p2", "u1", "d1", NEVER_EXPIRES)])
            .await
            .expect_err("conflict");
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn batch_insert_is_all_or_nothing() {
        let store = InMemoryStore::new();
        let err = store
            .insert_policies(vec![
                policy("p1", "u1", "d1", NEVER_EXPIRES),
                policy("p2", "u1", "d1", NEVER_EXPIRES),
            ])
            .await
            .expect_err("conflict");
        assert!(matches!(err, StoreError::Conflict(_)));
        assert!(
            store
                .list_accessor_policies("u1")
                .await
                .expect("list")
                .is_empty()
        );
    }

    #[tokio::test]
    async fn replace_swaps_resource_policies() {
        let store = InMemoryStore::new();
        store
            .insert_policies(vec![
                policy("p1", "u1", "d1", NEVER_EXPIRES),
                policy("p2", "u2", "d1", NEVER_EXPIRES),
                policy("p3", "u1", "d2", NEVER_EXPIRES),
            ])
            .await
            .expect("insert");
        store
            .replace_resource_policies("doc", "d1", vec![policy("p4", "u1", "d1", NEVER_EXPIRES)])
            .await
            .expect("replace");
        let on_d1 = store.list_resource_policies("doc", "d1").await.expect("list");
        assert_eq!(on_d1.len(), 1);
        assert_eq!(on_d1[0].id, "p4");
        assert_eq!(store.get_policy("p3").await.expect("p3").id, "p3");
    }

    #[tokio::test]
    async fn expired_sweep_keeps_live_and_permanent_policies() {
        let store = InMemoryStore::new();
        store
            .insert_policies(vec![
                policy("gone", "u1", "d1", 100),
                policy("live", "u1", "d2", 10_000),
                policy("forever", "u1", "d3", NEVER_EXPIRES),
            ])
            .await
            .expect("insert");
        assert_eq!(store.delete_expired_policies(500).await.expect("sweep"), 1);
        assert_eq!(store.delete_expired_policies(500).await.expect("sweep"), 0);
        let left: Vec<String> = store
            .list_accessor_policies("u1")
            .await
            .expect("list")
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(left, vec!["live".to_string(), "forever".to_string()]);
    }

    #[tokio::test]
    async fn deleting_role_cascades() {
        let store = InMemoryStore::new();
        store
            .create_role(Role {
                id: "r1".into(),
                name: "editors".into(),
                description: String::new(),
                source: RoleSource::Business,
                resource_type_scope: ResourceTypeScope::unlimited(),
            })
            .await
            .expect("role");
        store
            .add_role_members("r1", vec![AccessorInfo::new("u1", AccessorType::User)])
            .await
            .expect("members");
        let mut held = policy("p1", "r1", "d1", NEVER_EXPIRES);
        held.accessor = AccessorInfo::new("r1", AccessorType::Role);
        store.insert_policies(vec![held]).await.expect("insert");

        store.delete_role("r1").await.expect("delete");
        assert!(
            store
                .list_role_members("r1")
                .await
                .expect("members")
                .is_empty()
        );
        assert!(
            store
                .list_accessor_policies("r1")
                .await
                .expect("policies")
                .is_empty()
        );
        assert!(matches!(
            store.delete_role("r1").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn accessor_cascade_is_idempotent() {
        let store = InMemoryStore::new();
        store
            .insert_policies(vec![
                policy("p1", "u1", "d1", NEVER_EXPIRES),
                policy("p2", "u1", "d2", NEVER_EXPIRES),
            ])
            .await
            .expect("insert");
        assert_eq!(
            store.delete_accessor_policies("u1").await.expect("first"),
            2
        );
        assert_eq!(
            store.delete_accessor_policies("u1").await.expect("second"),
            0
        );
    }
}
