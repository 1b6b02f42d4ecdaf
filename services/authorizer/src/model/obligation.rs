//! Obligation types and obligation instances.
//!
//! An obligation is a side constraint attached to an allowed operation (for
//! example a watermark on download). Its type carries a JSON Schema for values
//! and says on which resource types and operations it may be attached.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use warden_authz::ResourceTypeScope;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObligationType {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub schema: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui_schema: Option<Value>,
    #[serde(default = "ResourceTypeScope::unlimited")]
    pub applicable: ResourceTypeScope,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obligation {
    pub id: String,
    pub type_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewObligation {
    #[serde(default)]
    pub id: Option<String>,
    pub type_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub value: Value,
}

/// Obligation returned alongside an allowed operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedObligation {
    pub type_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub value: Value,
}
