#![allow(dead_code)]

use authorizer::app::AppState;
use authorizer::clock::ManualClock;
use authorizer::directory::StaticDirectory;
use authorizer::events::MemoryQueue;
use authorizer::identity::StaticIntrospector;
use authorizer::model::{
    AccessorInfo, NewPolicy, Operation, PolicyOperation, ResourceInfo, ResourceType,
};
use authorizer::store::memory::InMemoryStore;
use axum::body::Body;
use axum::http::Request;
use std::sync::Arc;
use std::time::Duration;
use warden_authz::{AccessorType, NEVER_EXPIRES, OperationScope};

pub const NOW: i64 = 1_700_000_000_000_000;
pub const ADMIN_TOKEN: &str = "admin-token";

pub struct TestApp {
    pub store: Arc<InMemoryStore>,
    pub queue: Arc<MemoryQueue>,
    pub clock: ManualClock,
    pub state: AppState,
}

/// Org used across tests: `u1` sits in `dept1`, which sits under `root`.
pub fn org() -> StaticDirectory {
    StaticDirectory::new()
        .with_department("root", None)
        .with_department("dept1", Some("root"))
        .with_user("u1", &["dept1"], &["g1"])
        .with_user("u2", &[], &[])
        .with_name("u1", "Ursula")
        .with_name("dept1", "Research")
}

pub async fn test_app() -> TestApp {
    test_app_with(org()).await
}

pub async fn test_app_with(directory: StaticDirectory) -> TestApp {
    let store = Arc::new(InMemoryStore::new());
    let queue = Arc::new(MemoryQueue::new());
    let clock = ManualClock::at(NOW);
    let state = AppState::new(
        store.clone(),
        Arc::new(directory),
        Arc::new(StaticIntrospector::new().with_user(ADMIN_TOKEN, "admin")),
        queue.clone(),
        Arc::new(clock.clone()),
        Duration::from_secs(60),
    );
    state
        .resource_types
        .put(resource_type(
            "doc",
            &[
                ("create", OperationScope::Type),
                ("read", OperationScope::Instance),
                ("download", OperationScope::Instance),
                ("delete", OperationScope::Instance),
            ],
        ))
        .await
        .expect("doc type");
    state
        .resource_types
        .put(resource_type(
            "folder",
            &[("list", OperationScope::Instance), ("create", OperationScope::Type)],
        ))
        .await
        .expect("folder type");
    TestApp {
        store,
        queue,
        clock,
        state,
    }
}

pub fn resource_type(id: &str, operations: &[(&str, OperationScope)]) -> ResourceType {
    ResourceType {
        id: id.to_string(),
        name: id.to_string(),
        description: String::new(),
        instance_url: String::new(),
        data_struct: String::new(),
        hidden: false,
        operations: operations
            .iter()
            .map(|(op, scope)| Operation {
                id: op.to_string(),
                names: Vec::new(),
                description: String::new(),
                scope: *scope,
            })
            .collect(),
    }
}

pub fn user(id: &str) -> AccessorInfo {
    AccessorInfo::new(id, AccessorType::User)
}

pub fn new_policy(
    accessor: AccessorInfo,
    resource: ResourceInfo,
    operation: PolicyOperation,
) -> NewPolicy {
    NewPolicy {
        accessor,
        resource,
        operation,
        condition: Default::default(),
        end_time: NEVER_EXPIRES,
    }
}

pub fn ops(operations: &[&str]) -> Vec<String> {
    operations.iter().map(|op| op.to_string()).collect()
}

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub fn authed_json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {ADMIN_TOKEN}"))
        .body(Body::from(body.to_string()))
        .expect("request")
}
