//! Resource type definitions.
//!
//! A resource type owns an ordered list of operations. Each operation carries a
//! scope saying whether it can be granted on single instances or only on the
//! whole type.
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use warden_authz::OperationScope;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedName {
    pub language: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub id: String,
    #[serde(default)]
    pub names: Vec<LocalizedName>,
    #[serde(default)]
    pub description: String,
    pub scope: OperationScope,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceType {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Link template for instances, e.g. `https://docs.example.com/{id}`.
    #[serde(default)]
    pub instance_url: String,
    #[serde(default)]
    pub data_struct: String,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub operations: Vec<Operation>,
}

impl ResourceType {
    pub fn operation(&self, id: &str) -> Option<&Operation> {
        self.operations.iter().find(|op| op.id == id)
    }

    /// Whether `operation` exists and may be granted by a policy on `resource_id`.
    pub fn grantable(&self, operation: &str, resource_id: &str) -> bool {
        self.operation(operation)
            .is_some_and(|op| op.scope.grantable_on(resource_id))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("resource type id must not be empty".to_string());
        }
        if self.id == warden_authz::TYPE_WILDCARD {
            return Err("resource type id must not be the wildcard".to_string());
        }
        let mut seen = HashSet::new();
        for op in &self.operations {
            if op.id.trim().is_empty() {
                return Err(format!("resource type {} has an empty operation id", self.id));
            }
            if !seen.insert(op.id.as_str()) {
                return Err(format!(
                    "operation {} declared twice on resource type {}",
                    op.id, self.id
                ));
            }
        }
        Ok(())
    }
}
