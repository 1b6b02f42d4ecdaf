//! Per-resource evaluation over already-fetched policies.
//!
//! Nothing here does I/O: the callers fetch the policies, the resource type,
//! and the effective role scope, and this module folds them into a decision.
use crate::model::{ObligationRef, Policy, ResourceType};
use std::collections::{BTreeMap, HashSet};
use warden_authz::{GrantAccumulator, ResourceTypeScope, is_type_level};

/// Outcome for one resource.
#[derive(Debug, Default)]
pub(crate) struct ResourceDecision {
    grants: GrantAccumulator,
    obligations: BTreeMap<String, Vec<ObligationRef>>,
}

impl ResourceDecision {
    pub(crate) fn is_allowed(&self, operation: &str) -> bool {
        self.grants.is_allowed(operation)
    }

    pub(crate) fn allows_all<S: AsRef<str>>(&self, operations: &[S]) -> bool {
        self.grants.allows_all(operations)
    }

    /// Effective allowed operations, sorted.
    pub(crate) fn allowed(&self) -> Vec<String> {
        self.grants.allowed().map(str::to_string).collect()
    }

    /// Obligation references attached to `operation` by matching allow policies.
    pub(crate) fn obligations_for(&self, operation: &str) -> &[ObligationRef] {
        self.obligations
            .get(operation)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Fold `policies` into a decision for one resource of `resource_type`.
///
/// - Expired policies are ignored.
/// - A deny always wins over an allow for the same operation.
/// - An allow only counts if the operation exists on the type and may be
///   granted on the policy's resource (type operations need a `*` policy).
/// - `scope` (the union of the accessor's role scopes, `None` when the accessor
///   holds no roles) can remove allows but never add them.
/// - Instance obligation references are merged by (type, instance id); inline
///   values are kept as they are.
pub(crate) fn evaluate<'a, I>(
    resource_type: Option<&ResourceType>,
    policies: I,
    scope: Option<&ResourceTypeScope>,
    now_micros: i64,
) -> ResourceDecision
where
    I: IntoIterator<Item = &'a Policy>,
{
    let mut decision = ResourceDecision::default();
    let Some(resource_type) = resource_type else {
        return decision;
    };

    let mut live: Vec<&Policy> = policies
        .into_iter()
        .filter(|policy| !policy.is_expired(now_micros))
        .collect();
    // Stable obligation order regardless of how the store returned rows.
    live.sort_by(|a, b| a.id.cmp(&b.id));

    let mut seen_refs: HashSet<(String, String, String)> = HashSet::new();
    for policy in live {
        for item in &policy.operation.deny {
            decision.grants.deny(&item.id);
        }
        for item in &policy.operation.allow {
            if !resource_type.grantable(&item.id, &policy.resource.id) {
                continue;
            }
            decision.grants.allow(&item.id);
            let refs = decision.obligations.entry(item.id.clone()).or_default();
            for obligation in &item.obligations {
                if let Some((type_id, instance_id)) = obligation.dedup_key() {
                    let key = (item.id.clone(), type_id.to_string(), instance_id.to_string());
                    if !seen_refs.insert(key) {
                        continue;
                    }
                }
                refs.push(obligation.clone());
            }
        }
    }

    if let Some(scope) = scope {
        decision
            .grants
            .retain_allowed(|operation| scope.permits(&resource_type.id, operation));
    }
    decision
}

/// Split policies fetched for several resources of one type into the
/// type-level ones and the ones addressing each instance.
pub(crate) fn partition_by_resource(
    policies: &[Policy],
) -> (Vec<&Policy>, BTreeMap<&str, Vec<&Policy>>) {
    let mut type_level = Vec::new();
    let mut by_instance: BTreeMap<&str, Vec<&Policy>> = BTreeMap::new();
    for policy in policies {
        if is_type_level(&policy.resource.id) {
            type_level.push(policy);
        } else {
            by_instance
                .entry(policy.resource.id.as_str())
                .or_default()
                .push(policy);
        }
    }
    (type_level, by_instance)
}
