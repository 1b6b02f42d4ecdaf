use crate::AuthzError;
use serde::{Deserialize, Serialize};

/// Kinds of entity that can hold policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessorType {
    User,
    Department,
    Group,
    Role,
    App,
}

impl AccessorType {
    pub fn as_str(self) -> &'static str {
        match self {
            AccessorType::User => "user",
            AccessorType::Department => "department",
            AccessorType::Group => "group",
            AccessorType::Role => "role",
            AccessorType::App => "app",
        }
    }

    /// Whether directory membership (departments, groups) applies to this kind.
    pub fn has_memberships(self) -> bool {
        matches!(self, AccessorType::User)
    }
}

impl std::fmt::Display for AccessorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AccessorType {
    type Err = AuthzError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(AccessorType::User),
            "department" => Ok(AccessorType::Department),
            "group" => Ok(AccessorType::Group),
            "role" => Ok(AccessorType::Role),
            "app" => Ok(AccessorType::App),
            other => Err(AuthzError::InvalidAccessorType(other.to_string())),
        }
    }
}
