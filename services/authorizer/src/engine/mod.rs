//! Policy decision engine.
//!
//! # Purpose
//! Answers "may this accessor do these operations on these resources" for
//! single resources, batches, whole resource types, and listings, optionally
//! returning the obligations attached to each allowed operation.
//!
//! # Key invariants
//! - Default deny: no matching policy, an unknown resource type, or an
//!   undeclared operation all answer "not allowed" without an error.
//! - Deny overrides allow across the whole identity set.
//! - Role scopes only ever remove grants.
//! - Decisions are read-only; the only errors are invalid input and store or
//!   directory failures.
mod batch;
mod check;
mod evaluate;
mod listing;
pub mod obligations;
pub mod scope;

use crate::clock::Clock;
use crate::error::{ServiceError, ServiceResult};
use crate::hierarchy::{HierarchyResolver, IdentitySet};
use crate::model::{AccessorInfo, ResolvedObligation, ResourceInfo};
use crate::registry::{ObligationRegistry, ResourceTypeRegistry, RoleRegistry};
use crate::store::AuthorizationStore;
use evaluate::ResourceDecision;
use obligations::ObligationResolver;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use warden_authz::ResourceTypeScope;

/// Extra detail a caller can ask for alongside a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Include {
    OperationObligations,
}

/// Obligations per allowed operation.
pub type OperationObligations = BTreeMap<String, Vec<ResolvedObligation>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRequest {
    pub resource: ResourceInfo,
    pub accessor: AccessorInfo,
    pub operations: Vec<String>,
    #[serde(default)]
    pub include: Vec<Include>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_obligations: Option<OperationObligations>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceFilterRequest {
    pub resources: Vec<ResourceInfo>,
    pub accessor: AccessorInfo,
    pub operations: Vec<String>,
    /// Report every allowed operation of each surviving resource.
    #[serde(default)]
    pub allow_operation: bool,
    #[serde(default)]
    pub include: Vec<Include>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceListRequest {
    pub resource_type: String,
    pub accessor: AccessorInfo,
    pub operations: Vec<String>,
    #[serde(default)]
    pub include: Vec<Include>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceOperationRequest {
    pub resources: Vec<ResourceInfo>,
    pub accessor: AccessorInfo,
    #[serde(default)]
    pub include: Vec<Include>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceTypeOperationRequest {
    pub resource_types: Vec<String>,
    pub accessor: AccessorInfo,
}

/// Decision for one resource in a batch or listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceGrant {
    pub resource: ResourceInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_operations: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_obligations: Option<OperationObligations>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTypeGrant {
    pub resource_type: String,
    pub operations: Vec<String>,
}

/// Identity, role scope, and evaluation time shared by every resource of one call.
struct DecisionContext {
    identity: IdentitySet,
    scope: Option<ResourceTypeScope>,
    now_micros: i64,
}

pub struct DecisionEngine {
    store: Arc<dyn AuthorizationStore>,
    hierarchy: HierarchyResolver,
    resource_types: Arc<ResourceTypeRegistry>,
    roles: Arc<RoleRegistry>,
    obligations: ObligationResolver,
    clock: Arc<dyn Clock>,
}

impl DecisionEngine {
    pub fn new(
        store: Arc<dyn AuthorizationStore>,
        hierarchy: HierarchyResolver,
        resource_types: Arc<ResourceTypeRegistry>,
        roles: Arc<RoleRegistry>,
        obligations: Arc<ObligationRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            hierarchy,
            resource_types,
            roles,
            obligations: ObligationResolver::new(obligations),
            clock,
        }
    }

    async fn context(&self, accessor: &AccessorInfo) -> ServiceResult<DecisionContext> {
        if accessor.id.trim().is_empty() {
            return Err(ServiceError::invalid("accessor id must not be empty"));
        }
        let identity = self.hierarchy.resolve(accessor).await?;
        let scope = scope::effective_scope(&self.roles, &identity.role_ids).await?;
        Ok(DecisionContext {
            identity,
            scope,
            now_micros: self.clock.now_micros(),
        })
    }

    /// Resolved obligations for each of `operations` the decision allows.
    async fn obligations_for<S: AsRef<str>>(
        &self,
        resource_type: &str,
        decision: &ResourceDecision,
        operations: &[S],
    ) -> ServiceResult<OperationObligations> {
        let mut out = OperationObligations::new();
        for operation in operations {
            let operation = operation.as_ref();
            if !decision.is_allowed(operation) {
                continue;
            }
            let resolved = self
                .obligations
                .resolve(resource_type, operation, decision.obligations_for(operation))
                .await?;
            out.insert(operation.to_string(), resolved);
        }
        Ok(out)
    }
}

fn wants_obligations(include: &[Include]) -> bool {
    include.contains(&Include::OperationObligations)
}

fn require_operations(operations: &[String]) -> ServiceResult<()> {
    if operations.is_empty() {
        return Err(ServiceError::invalid("at least one operation is required"));
    }
    if operations.iter().any(|op| op.trim().is_empty()) {
        return Err(ServiceError::invalid("operation ids must not be empty"));
    }
    Ok(())
}

fn record_decision(op: &'static str) {
    metrics::counter!("warden_decisions_total", "op" => op).increment(1);
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::clock::ManualClock;
    use crate::directory::StaticDirectory;
    use crate::model::{Operation, ResourceType};
    use crate::store::memory::InMemoryStore;
    use std::time::Duration;
    use warden_authz::OperationScope;

    pub(crate) const NOW: i64 = 1_700_000_000_000_000;

    pub(crate) struct Fixture {
        pub store: Arc<InMemoryStore>,
        pub roles: Arc<RoleRegistry>,
        pub obligations: Arc<ObligationRegistry>,
        pub engine: DecisionEngine,
    }

    pub(crate) fn doc_type() -> ResourceType {
        let op = |id: &str, scope| Operation {
            id: id.to_string(),
            names: Vec::new(),
            description: String::new(),
            scope,
        };
        ResourceType {
            id: "doc".to_string(),
            name: "Document".to_string(),
            description: String::new(),
            instance_url: String::new(),
            data_struct: String::new(),
            hidden: false,
            operations: vec![
                op("create", OperationScope::Type),
                op("read", OperationScope::Instance),
                op("download", OperationScope::Instance),
                op("delete", OperationScope::Instance),
            ],
        }
    }

    pub(crate) async fn fixture(directory: StaticDirectory) -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let shared: Arc<dyn AuthorizationStore> = store.clone();
        let ttl = Duration::from_secs(60);
        let resource_types = Arc::new(ResourceTypeRegistry::new(shared.clone(), ttl));
        resource_types.put(doc_type()).await.expect("doc type");
        let roles = Arc::new(RoleRegistry::new(shared.clone(), ttl));
        let obligations = Arc::new(ObligationRegistry::new(shared.clone(), ttl));
        let engine = DecisionEngine::new(
            shared.clone(),
            HierarchyResolver::new(Arc::new(directory), shared.clone()),
            resource_types,
            roles.clone(),
            obligations.clone(),
            Arc::new(ManualClock::at(NOW)),
        );
        Fixture {
            store,
            roles,
            obligations,
            engine,
        }
    }
}
