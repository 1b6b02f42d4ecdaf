use crate::AuthzError;
use serde::{Deserialize, Serialize};

/// Resource ID used by type-level policies.
pub const TYPE_WILDCARD: &str = "*";

/// Returns true when `resource_id` addresses the whole resource type.
pub fn is_type_level(resource_id: &str) -> bool {
    resource_id == TYPE_WILDCARD
}

/// Where an operation may be granted.
///
/// `Type` operations only make sense for the resource type as a whole (for
/// example "create"), so grants on a single instance are ignored. `Instance`
/// operations can be granted on an instance or on the whole type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationScope {
    Type,
    Instance,
}

impl OperationScope {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationScope::Type => "type",
            OperationScope::Instance => "instance",
        }
    }

    /// Whether a grant on a policy addressing `resource_id` counts for this scope.
    pub fn grantable_on(self, resource_id: &str) -> bool {
        match self {
            OperationScope::Type => is_type_level(resource_id),
            OperationScope::Instance => true,
        }
    }
}

impl std::str::FromStr for OperationScope {
    type Err = AuthzError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "type" => Ok(OperationScope::Type),
            "instance" => Ok(OperationScope::Instance),
            other => Err(AuthzError::InvalidOperationScope(other.to_string())),
        }
    }
}
