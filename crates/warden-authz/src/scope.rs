//! Resource-type scope math.
//!
//! # Purpose
//! Describes which resource types (and which of their operations) something is
//! allowed to touch. Roles use it to narrow what their holders can ever be
//! granted; obligation types use it to say where they may be attached.
//!
//! # Key invariants
//! - `unlimited == true` permits every type and operation; `types` is ignored.
//! - An entry without an explicit operation list permits every operation of
//!   that type.
//! - A union of scopes is never narrower than any of its inputs.
use crate::{AuthzError, AuthzResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationsScope {
    #[serde(default)]
    pub unlimited: bool,
    #[serde(default)]
    pub operations: Vec<String>,
}

impl OperationsScope {
    pub fn unlimited() -> Self {
        Self {
            unlimited: true,
            operations: Vec::new(),
        }
    }

    pub fn only<I, S>(operations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            unlimited: false,
            operations: operations.into_iter().map(Into::into).collect(),
        }
    }

    pub fn permits(&self, operation: &str) -> bool {
        self.unlimited || self.operations.iter().any(|op| op == operation)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopedResourceType {
    pub id: String,
    #[serde(default = "OperationsScope::unlimited")]
    pub operations: OperationsScope,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTypeScope {
    #[serde(default)]
    pub unlimited: bool,
    #[serde(default)]
    pub types: Vec<ScopedResourceType>,
}

impl ResourceTypeScope {
    pub fn unlimited() -> Self {
        Self {
            unlimited: true,
            types: Vec::new(),
        }
    }

    /// Scope permitting every operation of the listed types.
    pub fn of_types<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            unlimited: false,
            types: types
                .into_iter()
                .map(|id| ScopedResourceType {
                    id: id.into(),
                    operations: OperationsScope::unlimited(),
                })
                .collect(),
        }
    }

    pub fn with_type(mut self, id: impl Into<String>, operations: OperationsScope) -> Self {
        self.types.push(ScopedResourceType {
            id: id.into(),
            operations,
        });
        self
    }

    pub fn permits_type(&self, resource_type: &str) -> bool {
        self.unlimited || self.types.iter().any(|entry| entry.id == resource_type)
    }

    pub fn permits(&self, resource_type: &str, operation: &str) -> bool {
        if self.unlimited {
            return true;
        }
        self.types
            .iter()
            .filter(|entry| entry.id == resource_type)
            .any(|entry| entry.operations.permits(operation))
    }

    /// Reject scopes that can never permit anything or are ambiguous.
    pub fn validate(&self) -> AuthzResult<()> {
        if self.unlimited {
            return Ok(());
        }
        if self.types.is_empty() {
            return Err(AuthzError::InvalidScope(
                "scope must be unlimited or list at least one resource type".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for entry in &self.types {
            if entry.id.trim().is_empty() {
                return Err(AuthzError::InvalidScope("empty resource type id".to_string()));
            }
            if !seen.insert(entry.id.as_str()) {
                return Err(AuthzError::InvalidScope(format!(
                    "resource type {} listed twice",
                    entry.id
                )));
            }
            if !entry.operations.unlimited && entry.operations.operations.is_empty() {
                return Err(AuthzError::InvalidScope(format!(
                    "resource type {} lists no operations",
                    entry.id
                )));
            }
        }
        Ok(())
    }

    /// Union of several scopes, or `None` when there is nothing to union.
    ///
    /// The union is unlimited as soon as one input is unlimited. Per-type
    /// operation lists are merged, and a type unlimited in any input stays
    /// unlimited.
    pub fn union<'a, I>(scopes: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a ResourceTypeScope>,
    {
        let mut any = false;
        let mut merged: BTreeMap<String, Option<BTreeSet<String>>> = BTreeMap::new();
        for scope in scopes {
            any = true;
            if scope.unlimited {
                return Some(Self::unlimited());
            }
            for entry in &scope.types {
                let slot = merged
                    .entry(entry.id.clone())
                    .or_insert_with(|| Some(BTreeSet::new()));
                if entry.operations.unlimited {
                    *slot = None;
                } else if let Some(ops) = slot {
                    ops.extend(entry.operations.operations.iter().cloned());
                }
            }
        }
        if !any {
            return None;
        }
        Some(Self {
            unlimited: false,
            types: merged
                .into_iter()
                .map(|(id, ops)| ScopedResourceType {
                    id,
                    operations: match ops {
                        None => OperationsScope::unlimited(),
                        Some(ops) => OperationsScope::only(ops),
                    },
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_permits_everything() {
        let scope = ResourceTypeScope::unlimited();
        assert!(scope.permits("doc", "read"));
        assert!(scope.permits_type("anything"));
        assert!(scope.validate().is_ok());
    }

    #[test]
    fn listed_type_with_operation_subset() {
        let scope = ResourceTypeScope::of_types(["folder"])
            .with_type("doc", OperationsScope::only(["read", "preview"]));
        assert!(scope.permits("doc", "read"));
        assert!(!scope.permits("doc", "delete"));
        assert!(scope.permits("folder", "delete"));
        assert!(!scope.permits("bucket", "read"));
    }

    #[test]
    fn union_of_nothing_is_none() {
        let scopes: Vec<ResourceTypeScope> = Vec::new();
        assert!(ResourceTypeScope::union(&scopes).is_none());
    }

    #[test]
    fn union_is_unlimited_if_any_input_is() {
        let scopes = vec![
            ResourceTypeScope::of_types(["doc"]),
            ResourceTypeScope::unlimited(),
        ];
        let merged = ResourceTypeScope::union(&scopes).expect("union");
        assert!(merged.unlimited);
    }

    #[test]
    fn union_merges_operation_lists() {
        let first = ResourceTypeScope {
            unlimited: false,
            types: Vec::new(),
        }
        .with_type("doc", OperationsScope::only(["read"]));
        let second = ResourceTypeScope {
            unlimited: false,
            types: Vec::new(),
        }
        .with_type("doc", OperationsScope::only(["download"]))
        .with_type("folder", OperationsScope::only(["list"]));
        let third = ResourceTypeScope::of_types(["folder"]);

        let merged = ResourceTypeScope::union([&first, &second, &third]).expect("union");
        assert!(merged.permits("doc", "read"));
        assert!(merged.permits("doc", "download"));
        assert!(!merged.permits("doc", "delete"));
        assert!(merged.permits("folder", "delete"));
    }

    #[test]
    fn validate_rejects_degenerate_scopes() {
        let empty = ResourceTypeScope {
            unlimited: false,
            types: Vec::new(),
        };
        assert!(empty.validate().is_err());

        let duplicated = ResourceTypeScope::of_types(["doc", "doc"]);
        assert!(duplicated.validate().is_err());

        let no_ops = ResourceTypeScope {
            unlimited: false,
            types: Vec::new(),
        }
        .with_type("doc", OperationsScope::only(Vec::<String>::new()));
        assert!(no_ops.validate().is_err());
    }

    #[test]
    fn missing_operations_field_means_all_operations() {
        let scope: ResourceTypeScope =
            serde_json::from_str(r#"{"types":[{"id":"doc"}]}"#).expect("parse");
        assert!(!scope.unlimited);
        assert!(scope.permits("doc", "anything"));
    }
}
