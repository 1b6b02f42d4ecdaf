//! Accessor hierarchy resolution.
//!
//! # Purpose
//! Expands one accessor into the full set of identities whose policies apply
//! to it: the accessor itself, a user's departments with their ancestor
//! chains, a user's groups, and every role held by any of those.
//!
//! # Key invariants
//! - The accessor itself is always first in the identity set.
//! - IDs appear once, in discovery order.
//! - Roles are collected from memberships of every identity in the set, so a
//!   role assigned to a department applies to its members.
use crate::directory::Directory;
use crate::error::ServiceResult;
use crate::model::AccessorInfo;
use crate::store::AuthorizationStore;
use std::collections::HashSet;
use std::sync::Arc;
use warden_authz::AccessorType;

/// Expanded identity of one accessor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentitySet {
    pub principal: AccessorInfo,
    /// Every accessor ID whose policies apply, roles included.
    pub accessor_ids: Vec<String>,
    /// Roles held by the identity; their scopes bound what can be granted.
    pub role_ids: Vec<String>,
}

#[derive(Default)]
struct OrderedIds {
    seen: HashSet<String>,
    ids: Vec<String>,
}

impl OrderedIds {
    fn push(&mut self, id: &str) {
        if self.seen.insert(id.to_string()) {
            self.ids.push(id.to_string());
        }
    }
}

pub struct HierarchyResolver {
    directory: Arc<dyn Directory>,
    store: Arc<dyn AuthorizationStore>,
}

impl HierarchyResolver {
    pub fn new(directory: Arc<dyn Directory>, store: Arc<dyn AuthorizationStore>) -> Self {
        Self { directory, store }
    }

    pub async fn resolve(&self, accessor: &AccessorInfo) -> ServiceResult<IdentitySet> {
        let mut ids = OrderedIds::default();
        ids.push(&accessor.id);
        match accessor.accessor_type {
            AccessorType::User => {
                let memberships = self.directory.memberships(&accessor.id).await?;
                for department in &memberships.departments {
                    ids.push(department);
                    for ancestor in self.directory.department_ancestors(department).await? {
                        ids.push(&ancestor);
                    }
                }
                for group in &memberships.groups {
                    ids.push(group);
                }
            }
            AccessorType::Department => {
                for ancestor in self.directory.department_ancestors(&accessor.id).await? {
                    ids.push(&ancestor);
                }
            }
            AccessorType::Group | AccessorType::App | AccessorType::Role => {}
        }

        let mut role_ids = if accessor.accessor_type == AccessorType::Role {
            vec![accessor.id.clone()]
        } else {
            Vec::new()
        };
        for role_id in self.store.roles_of_accessors(&ids.ids).await? {
            if !role_ids.contains(&role_id) {
                role_ids.push(role_id);
            }
        }
        for role_id in &role_ids {
            ids.push(role_id);
        }

        tracing::debug!(
            accessor_id = %accessor.id,
            identities = ids.ids.len(),
            roles = role_ids.len(),
            "resolved accessor hierarchy"
        );
        Ok(IdentitySet {
            principal: accessor.clone(),
            accessor_ids: ids.ids,
            role_ids,
        })
    }
}
