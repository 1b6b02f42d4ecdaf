//! Topic handlers.
use super::bus::Message;
use crate::store::AuthorizationStore;
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use warden_authz::{Categorized, ErrorCategory};

pub const USER_DELETED: &str = "org.user.deleted";
pub const DEPARTMENT_DELETED: &str = "org.department.deleted";
pub const GROUP_DELETED: &str = "org.group.deleted";
pub const APP_DELETED: &str = "org.app.deleted";
pub const USER_RENAMED: &str = "org.user.renamed";
pub const DEPARTMENT_RENAMED: &str = "org.department.renamed";
pub const GROUP_RENAMED: &str = "org.group.renamed";
pub const APP_RENAMED: &str = "org.app.renamed";
pub const RESOURCE_RENAMED: &str = "resource.renamed";
pub const RESOURCE_DELETED: &str = "resource.deleted";

/// Every topic the service consumes.
pub const TOPICS: &[&str] = &[
    USER_DELETED,
    DEPARTMENT_DELETED,
    GROUP_DELETED,
    APP_DELETED,
    USER_RENAMED,
    DEPARTMENT_RENAMED,
    GROUP_RENAMED,
    APP_RENAMED,
    RESOURCE_RENAMED,
    RESOURCE_DELETED,
];

#[derive(Debug, Error)]
pub enum EventError {
    #[error("malformed {topic} payload: {source}")]
    Malformed {
        topic: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid {topic} payload: {reason}")]
    Invalid { topic: String, reason: String },
    #[error("no handler for topic {0}")]
    UnknownTopic(String),
    #[error("handler timed out after {0:?}")]
    Timeout(Duration),
    #[error("handler panicked: {0}")]
    Panicked(String),
}

impl Categorized for EventError {
    fn category(&self) -> ErrorCategory {
        match self {
            EventError::Malformed { .. }
            | EventError::Invalid { .. }
            | EventError::UnknownTopic(_) => ErrorCategory::External,
            EventError::Timeout(_) | EventError::Panicked(_) => ErrorCategory::Internal,
        }
    }
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, message: &Message) -> anyhow::Result<()>;
}

#[derive(Debug, Deserialize)]
struct EntityDeleted {
    id: String,
}

#[derive(Debug, Deserialize)]
struct EntityRenamed {
    id: String,
    new_name: String,
}

#[derive(Debug, Deserialize)]
struct ResourceRenamed {
    id: String,
    #[serde(rename = "type")]
    resource_type: String,
    new_name: String,
}

#[derive(Debug, Deserialize)]
struct ResourceDeleted {
    id: String,
    #[serde(rename = "type")]
    resource_type: String,
}

/// Applies org and resource lifecycle events to the store.
pub struct ConsistencyHandler {
    store: Arc<dyn AuthorizationStore>,
}

impl ConsistencyHandler {
    pub fn new(store: Arc<dyn AuthorizationStore>) -> Self {
        Self { store }
    }

    async fn accessor_deleted(&self, topic: &str, event: EntityDeleted) -> anyhow::Result<()> {
        require(topic, "id", &event.id)?;
        let policies = self.store.delete_accessor_policies(&event.id).await?;
        let memberships = self.store.delete_accessor_memberships(&event.id).await?;
        tracing::info!(
            topic,
            accessor_id = %event.id,
            policies,
            memberships,
            "removed grants of deleted accessor"
        );
        Ok(())
    }

    async fn accessor_renamed(&self, topic: &str, event: EntityRenamed) -> anyhow::Result<()> {
        require(topic, "id", &event.id)?;
        require(topic, "new_name", &event.new_name)?;
        let policies = self
            .store
            .rename_policy_accessor(&event.id, &event.new_name)
            .await?;
        let memberships = self
            .store
            .rename_member_accessor(&event.id, &event.new_name)
            .await?;
        tracing::info!(topic, accessor_id = %event.id, policies, memberships, "accessor renamed");
        Ok(())
    }

    async fn resource_renamed(&self, event: ResourceRenamed) -> anyhow::Result<()> {
        require(RESOURCE_RENAMED, "id", &event.id)?;
        require(RESOURCE_RENAMED, "type", &event.resource_type)?;
        require(RESOURCE_RENAMED, "new_name", &event.new_name)?;
        let policies = self
            .store
            .rename_policy_resource(&event.resource_type, &event.id, &event.new_name)
            .await?;
        tracing::info!(
            resource_type = %event.resource_type,
            resource_id = %event.id,
            policies,
            "resource renamed"
        );
        Ok(())
    }

    async fn resource_deleted(&self, event: ResourceDeleted) -> anyhow::Result<()> {
        require(RESOURCE_DELETED, "id", &event.id)?;
        require(RESOURCE_DELETED, "type", &event.resource_type)?;
        let policies = self
            .store
            .delete_resource_policies(&event.resource_type, &event.id)
            .await?;
        tracing::info!(
            resource_type = %event.resource_type,
            resource_id = %event.id,
            policies,
            "removed policies of deleted resource"
        );
        Ok(())
    }
}

#[async_trait]
impl EventHandler for ConsistencyHandler {
    async fn handle(&self, message: &Message) -> anyhow::Result<()> {
        let topic = message.topic.as_str();
        match topic {
            USER_DELETED | DEPARTMENT_DELETED | GROUP_DELETED | APP_DELETED => {
                self.accessor_deleted(topic, decode(message)?).await
            }
            USER_RENAMED | DEPARTMENT_RENAMED | GROUP_RENAMED | APP_RENAMED => {
                self.accessor_renamed(topic, decode(message)?).await
            }
            RESOURCE_RENAMED => self.resource_renamed(decode(message)?).await,
            RESOURCE_DELETED => self.resource_deleted(decode(message)?).await,
            other => Err(EventError::UnknownTopic(other.to_string()).into()),
        }
    }
}

fn decode<T: DeserializeOwned>(message: &Message) -> Result<T, EventError> {
    serde_json::from_slice(&message.payload).map_err(|source| EventError::Malformed {
        topic: message.topic.clone(),
        source,
    })
}

fn require(topic: &str, field: &str, value: &str) -> Result<(), EventError> {
    if value.trim().is_empty() {
        return Err(EventError::Invalid {
            topic: topic.to_string(),
            reason: format!("{field} must not be empty"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AccessorInfo, NewPolicy, Policy, PolicyOperation, ResourceInfo, Role, RoleSource,
    };
    use crate::store::memory::InMemoryStore;
    use crate::store::{PolicyStore, RoleStore};
    use serde_json::json;
    use warden_authz::{AccessorType, NEVER_EXPIRES, ResourceTypeScope};

    fn message(topic: &str, payload: serde_json::Value) -> Message {
        Message {
            id: 1,
            topic: topic.to_string(),
            payload: serde_json::to_vec(&payload).expect("payload"),
            attempt: 1,
        }
    }

    fn policy(id: &str, accessor: AccessorInfo, resource_id: &str) -> Policy {
        Policy::from_new(
            id.to_string(),
            NewPolicy {
                accessor,
                resource: ResourceInfo::new("doc", resource_id).named("Draft"),
                operation: PolicyOperation::allowing(["read"]),
                condition: Default::default(),
                end_time: NEVER_EXPIRES,
            },
            0,
        )
    }

    async fn seeded() -> (Arc<InMemoryStore>, ConsistencyHandler) {
        let store = Arc::new(InMemoryStore::new());
        let u1 = AccessorInfo::new("u1", AccessorType::User).named("Ursula");
        store
            .insert_policies(vec![
                policy("p1", u1.clone(), "d1"),
                policy("p2", u1.clone(), "d2"),
                policy("p3", AccessorInfo::new("u2", AccessorType::User), "d1"),
            ])
            .await
            .expect("policies");
        let role = Role {
            id: "r1".to_string(),
            name: "Readers".to_string(),
            description: String::new(),
            source: RoleSource::User,
            resource_type_scope: ResourceTypeScope::unlimited(),
        };
        store.create_role(role).await.expect("role");
        store.add_role_members("r1", vec![u1]).await.expect("member");
        let handler = ConsistencyHandler::new(store.clone());
        (store, handler)
    }

    #[tokio::test]
    async fn user_deletion_removes_policies_and_memberships_idempotently() {
        let (store, handler) = seeded().await;
        let event = message(USER_DELETED, json!({"id": "u1"}));
        handler.handle(&event).await.expect("first delivery");
        handler.handle(&event).await.expect("redelivery is a no-op");

        assert!(
            store
                .list_accessor_policies("u1")
                .await
                .expect("list")
                .is_empty()
        );
        assert_eq!(
            store
                .list_accessor_policies("u2")
                .await
                .expect("list")
                .len(),
            1
        );
        assert!(
            store
                .list_role_members("r1")
                .await
                .expect("members")
                .is_empty()
        );
    }

    #[tokio::test]
    async fn rename_updates_denormalized_names() {
        let (store, handler) = seeded().await;
        handler
            .handle(&message(USER_RENAMED, json!({"id": "u1", "new_name": "Ursula K."})))
            .await
            .expect("rename");
        for policy in store.list_accessor_policies("u1").await.expect("list") {
            assert_eq!(policy.accessor.name.as_deref(), Some("Ursula K."));
        }
        let members = store.list_role_members("r1").await.expect("members");
        assert_eq!(members[0].accessor.name.as_deref(), Some("Ursula K."));

        handler
            .handle(&message(
                RESOURCE_RENAMED,
                json!({"id": "d1", "type": "doc", "new_name": "Final"}),
            ))
            .await
            .expect("resource rename");
        for policy in store.list_resource_policies("doc", "d1").await.expect("list") {
            assert_eq!(policy.resource.name.as_deref(), Some("Final"));
        }
    }

    #[tokio::test]
    async fn resource_deletion_removes_its_policies() {
        let (store, handler) = seeded().await;
        handler
            .handle(&message(RESOURCE_DELETED, json!({"id": "d1", "type": "doc"})))
            .await
            .expect("delete");
        assert!(
            store
                .list_resource_policies("doc", "d1")
                .await
                .expect("list")
                .is_empty()
        );
        assert_eq!(
            store
                .list_resource_policies("doc", "d2")
                .await
                .expect("list")
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn bad_payloads_are_external_errors() {
        let (_store, handler) = seeded().await;
        let garbage = Message {
            id: 1,
            topic: USER_DELETED.to_string(),
            payload: b"not json".to_vec(),
            attempt: 1,
        };
        for event in [
            garbage,
            message(USER_DELETED, json!({"name": "u1"})),
            message(USER_RENAMED, json!({"id": "u1", "new_name": " "})),
            message("org.planet.deleted", json!({"id": "p"})),
        ] {
            let err = handler.handle(&event).await.expect_err("rejected");
            let event_err = err.downcast_ref::<EventError>().expect("event error");
            assert_eq!(event_err.category(), ErrorCategory::External);
        }
    }
}
