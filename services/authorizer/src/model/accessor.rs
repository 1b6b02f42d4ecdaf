//! Accessor and resource references carried on policies and queries.
use serde::{Deserialize, Serialize};
use warden_authz::AccessorType;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessorInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub accessor_type: AccessorType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl AccessorInfo {
    pub fn new(id: impl Into<String>, accessor_type: AccessorType) -> Self {
        Self {
            id: id.into(),
            accessor_type,
            name: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ResourceInfo {
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            resource_type: resource_type.into(),
            name: None,
        }
    }

    /// Type-level reference (`*`) for `resource_type`.
    pub fn whole_type(resource_type: impl Into<String>) -> Self {
        Self::new(resource_type, warden_authz::TYPE_WILDCARD)
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn is_type_level(&self) -> bool {
        warden_authz::is_type_level(&self.id)
    }
}
