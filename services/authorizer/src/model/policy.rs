//! Policy records.
//!
//! # Purpose
//! A policy binds one accessor to one resource (or to a whole resource type via
//! the `*` resource ID) and lists the operations it allows and denies.
//!
//! # Key invariants
//! - An operation ID never appears in both `allow` and `deny` of one policy.
//! - At most one policy exists per (accessor ID, resource type, resource ID).
//! - `end_time == -1` never expires; otherwise it is microseconds since epoch.
use super::{AccessorInfo, ResourceInfo};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;
use warden_authz::NEVER_EXPIRES;

/// Opaque condition expression. Stored and returned untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Condition(pub String);

impl Condition {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Reference from an allowed operation to an obligation.
///
/// Exactly one of `id` (a stored obligation instance) or `value` (an inline
/// value) must be present. An inline JSON `null` stands for the obligation
/// type's default value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObligationRef {
    pub type_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(
        default,
        deserialize_with = "explicit_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<Value>,
}

/// Keeps an explicit `"value": null` distinct from a missing field.
fn explicit_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ObligationRefError {
    #[error("obligation reference carries both an instance id and an inline value")]
    Ambiguous,
    #[error("obligation reference needs an instance id or an inline value")]
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ObligationSource<'a> {
    Instance(&'a str),
    /// Inline value; `Value::Null` means "use the type default".
    Inline(&'a Value),
}

impl ObligationRef {
    pub fn instance(type_id: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            type_id: type_id.into(),
            id: Some(id.into()),
            value: None,
        }
    }

    pub fn inline(type_id: impl Into<String>, value: Value) -> Self {
        Self {
            type_id: type_id.into(),
            id: None,
            value: Some(value),
        }
    }

    pub fn source(&self) -> Result<ObligationSource<'_>, ObligationRefError> {
        match (&self.id, &self.value) {
            (Some(_), Some(_)) => Err(ObligationRefError::Ambiguous),
            (None, None) => Err(ObligationRefError::Missing),
            (Some(id), None) => Ok(ObligationSource::Instance(id)),
            (None, Some(value)) => Ok(ObligationSource::Inline(value)),
        }
    }

    /// Identity used when unioning obligations across policies. Inline values
    /// have no identity and are never merged.
    pub fn dedup_key(&self) -> Option<(&str, &str)> {
        match self.source() {
            Ok(ObligationSource::Instance(id)) => Some((self.type_id.as_str(), id)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyItem {
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub obligations: Vec<ObligationRef>,
}

impl PolicyItem {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            obligations: Vec::new(),
        }
    }

    pub fn with_obligation(mut self, obligation: ObligationRef) -> Self {
        self.obligations.push(obligation);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyOperation {
    #[serde(default)]
    pub allow: Vec<PolicyItem>,
    #[serde(default)]
    pub deny: Vec<PolicyItem>,
}

impl PolicyOperation {
    pub fn allowing<I, S>(operations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allow: operations.into_iter().map(PolicyItem::new).collect(),
            deny: Vec::new(),
        }
    }

    pub fn denying<I, S>(operations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allow: Vec::new(),
            deny: operations.into_iter().map(PolicyItem::new).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.allow.is_empty() && self.deny.is_empty()
    }

    pub fn allow_item(&self, operation: &str) -> Option<&PolicyItem> {
        self.allow.iter().find(|item| item.id == operation)
    }

    /// First operation listed in both `allow` and `deny`, if any.
    pub fn overlap(&self) -> Option<&str> {
        let denied: HashSet<&str> = self.deny.iter().map(|item| item.id.as_str()).collect();
        self.allow
            .iter()
            .map(|item| item.id.as_str())
            .find(|id| denied.contains(id))
    }

    /// First operation listed twice on the same side, if any.
    pub fn duplicate(&self) -> Option<&str> {
        for items in [&self.allow, &self.deny] {
            let mut seen = HashSet::new();
            if let Some(dup) = items.iter().find(|item| !seen.insert(item.id.as_str())) {
                return Some(dup.id.as_str());
            }
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    pub accessor: AccessorInfo,
    pub resource: ResourceInfo,
    pub operation: PolicyOperation,
    #[serde(default)]
    pub condition: Condition,
    pub end_time: i64,
    pub created_at: i64,
    pub modified_at: i64,
}

impl Policy {
    pub fn from_new(id: String, new: NewPolicy, now_micros: i64) -> Self {
        Self {
            id,
            accessor: new.accessor,
            resource: new.resource,
            operation: new.operation,
            condition: new.condition,
            end_time: new.end_time,
            created_at: now_micros,
            modified_at: now_micros,
        }
    }

    pub fn is_expired(&self, now_micros: i64) -> bool {
        warden_authz::is_expired(self.end_time, now_micros)
    }

    pub fn is_type_level(&self) -> bool {
        self.resource.is_type_level()
    }

    pub fn apply(&mut self, patch: PolicyPatch, now_micros: i64) {
        if let Some(operation) = patch.operation {
            self.operation = operation;
        }
        if let Some(condition) = patch.condition {
            self.condition = condition;
        }
        if let Some(end_time) = patch.end_time {
            self.end_time = end_time;
        }
        self.modified_at = now_micros;
    }
}

fn never_expires() -> i64 {
    NEVER_EXPIRES
}

/// Authoring payload for a new policy. ID and timestamps are assigned on create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPolicy {
    pub accessor: AccessorInfo,
    pub resource: ResourceInfo,
    pub operation: PolicyOperation,
    #[serde(default)]
    pub condition: Condition,
    #[serde(default = "never_expires")]
    pub end_time: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyPatch {
    #[serde(default)]
    pub operation: Option<PolicyOperation>,
    #[serde(default)]
    pub condition: Option<Condition>,
    #[serde(default)]
    pub end_time: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn obligation_ref_distinguishes_null_from_missing() {
        let null: ObligationRef =
            serde_json::from_value(json!({"type_id": "watermark", "value": null}))
                .expect("parse");
        assert_eq!(null.source(), Ok(ObligationSource::Inline(&Value::Null)));

        let missing: ObligationRef =
            serde_json::from_value(json!({"type_id": "watermark"})).expect("parse");
        assert_eq!(missing.source(), Err(ObligationRefError::Missing));

        let both: ObligationRef = serde_json::from_value(
            json!({"type_id": "watermark", "id": "wm-1", "value": {"text": "x"}}),
        )
        .expect("parse");
        assert_eq!(both.source(), Err(ObligationRefError::Ambiguous));
    }

    #[test]
    fn only_instance_refs_are_deduplicated() {
        let by_id = ObligationRef::instance("watermark", "wm-1");
        assert_eq!(by_id.dedup_key(), Some(("watermark", "wm-1")));
        let inline = ObligationRef::inline("watermark", json!({"text": "x"}));
        assert_eq!(inline.dedup_key(), None);
    }

    #[test]
    fn overlap_and_duplicates_detected() {
        let mut op = PolicyOperation::allowing(["read", "write"]);
        assert_eq!(op.overlap(), None);
        op.deny.push(PolicyItem::new("write"));
        assert_eq!(op.overlap(), Some("write"));

        let dup = PolicyOperation::allowing(["read", "read"]);
        assert_eq!(dup.duplicate(), Some("read"));
    }

    #[test]
    fn new_policy_defaults_to_never_expiring() {
        let new: NewPolicy = serde_json::from_value(json!({
            "accessor": {"id": "u1", "type": "user"},
            "resource": {"id": "*", "type": "doc"},
            "operation": {"allow": [{"id": "read"}]}
        }))
        .expect("parse");
        assert_eq!(new.end_time, NEVER_EXPIRES);
        assert!(new.condition.is_empty());
        assert!(new.resource.is_type_level());
    }
}
