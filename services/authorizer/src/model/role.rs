//! Roles and role membership.
use super::AccessorInfo;
use serde::{Deserialize, Serialize};
use warden_authz::ResourceTypeScope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleSource {
    System,
    Business,
    User,
}

impl RoleSource {
    pub fn as_str(self) -> &'static str {
        match self {
            RoleSource::System => "system",
            RoleSource::Business => "business",
            RoleSource::User => "user",
        }
    }
}

impl std::str::FromStr for RoleSource {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "system" => Ok(RoleSource::System),
            "business" => Ok(RoleSource::Business),
            "user" => Ok(RoleSource::User),
            other => Err(format!("unknown role source {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub source: RoleSource,
    pub resource_type_scope: ResourceTypeScope,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRole {
    /// Generated when absent.
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_source")]
    pub source: RoleSource,
    #[serde(default = "ResourceTypeScope::unlimited")]
    pub resource_type_scope: ResourceTypeScope,
}

fn default_source() -> RoleSource {
    RoleSource::User
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub resource_type_scope: Option<ResourceTypeScope>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleMember {
    pub role_id: String,
    pub accessor: AccessorInfo,
}
