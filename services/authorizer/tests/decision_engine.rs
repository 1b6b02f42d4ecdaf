mod common;

use authorizer::engine::{
    CheckRequest, Include, ResourceFilterRequest, ResourceListRequest, ResourceOperationRequest,
    ResourceTypeOperationRequest,
};
use authorizer::error::ServiceError;
use authorizer::model::{
    AccessorInfo, NewObligation, NewRole, ObligationRef, ObligationType, PolicyItem,
    PolicyOperation, PolicyPatch, ResourceInfo, RoleSource,
};
use common::{NOW, TestApp, new_policy, ops, test_app, user};
use serde_json::json;
use warden_authz::{AccessorType, OperationsScope, ResourceTypeScope};

fn check(resource_id: &str, accessor: &str, operations: &[&str]) -> CheckRequest {
    CheckRequest {
        resource: ResourceInfo::new("doc", resource_id),
        accessor: user(accessor),
        operations: ops(operations),
        include: Vec::new(),
    }
}

async fn allowed(app: &TestApp, resource_id: &str, accessor: &str, operations: &[&str]) -> bool {
    app.state
        .engine
        .check(&check(resource_id, accessor, operations))
        .await
        .expect("check")
        .allowed
}

async fn watermark_type(app: &TestApp, applicable: ResourceTypeScope) {
    app.state
        .obligations
        .put_type(ObligationType {
            id: "watermark".to_string(),
            name: "Watermark".to_string(),
            description: String::new(),
            schema: json!({"type": "string"}),
            default_value: Some(json!("INTERNAL")),
            ui_schema: None,
            applicable,
        })
        .await
        .expect("obligation type");
}

#[tokio::test]
async fn user_allow_without_obligations() {
    let app = test_app().await;
    app.state
        .policies
        .create(vec![new_policy(
            user("u1"),
            ResourceInfo::new("doc", "d1"),
            PolicyOperation::allowing(["read"]),
        )])
        .await
        .expect("create");

    let mut request = check("d1", "u1", &["read"]);
    request.include = vec![Include::OperationObligations];
    let result = app.state.engine.check(&request).await.expect("check");
    assert!(result.allowed);
    let obligations = result.operation_obligations.expect("obligations");
    assert!(obligations["read"].is_empty());
}

#[tokio::test]
async fn ancestor_department_deny_beats_user_allow() {
    let app = test_app().await;
    app.state
        .policies
        .create(vec![
            new_policy(
                user("u1"),
                ResourceInfo::new("doc", "d1"),
                PolicyOperation::allowing(["read", "download"]),
            ),
            new_policy(
                AccessorInfo::new("root", AccessorType::Department),
                ResourceInfo::new("doc", "d1"),
                PolicyOperation::denying(["download"]),
            ),
        ])
        .await
        .expect("create");

    assert!(allowed(&app, "d1", "u1", &["read"]).await);
    assert!(!allowed(&app, "d1", "u1", &["download"]).await);
    assert!(!allowed(&app, "d1", "u1", &["read", "download"]).await);
    // u2 is outside the department and has no policy at all.
    assert!(!allowed(&app, "d1", "u2", &["read"]).await);
}

#[tokio::test]
async fn watermark_obligation_from_instance_and_default() {
    let app = test_app().await;
    watermark_type(&app, ResourceTypeScope::of_types(["doc"])).await;
    let stored = app
        .state
        .obligations
        .create(NewObligation {
            id: Some("wm-secret".to_string()),
            type_id: "watermark".to_string(),
            name: "Secret".to_string(),
            description: String::new(),
            value: json!("SECRET"),
        })
        .await
        .expect("obligation");
    app.state
        .policies
        .create(vec![
            new_policy(
                user("u1"),
                ResourceInfo::new("doc", "d1"),
                PolicyOperation {
                    allow: vec![
                        PolicyItem::new("download")
                            .with_obligation(ObligationRef::instance("watermark", &stored.id)),
                    ],
                    deny: Vec::new(),
                },
            ),
            new_policy(
                AccessorInfo::new("g1", AccessorType::Group),
                ResourceInfo::new("doc", "d2"),
                PolicyOperation {
                    allow: vec![
                        PolicyItem::new("download")
                            .with_obligation(ObligationRef::inline("watermark", json!(null))),
                    ],
                    deny: Vec::new(),
                },
            ),
        ])
        .await
        .expect("create");

    let mut request = check("d1", "u1", &["download"]);
    request.include = vec![Include::OperationObligations];
    let result = app.state.engine.check(&request).await.expect("check");
    let download = &result.operation_obligations.expect("obligations")["download"];
    assert_eq!(download.len(), 1);
    assert_eq!(download[0].id.as_deref(), Some("wm-secret"));
    assert_eq!(download[0].value, json!("SECRET"));

    request.resource = ResourceInfo::new("doc", "d2");
    let result = app.state.engine.check(&request).await.expect("check");
    let download = &result.operation_obligations.expect("obligations")["download"];
    assert_eq!(download[0].value, json!("INTERNAL"));
}

#[tokio::test]
async fn role_scope_narrows_but_never_grants() {
    let app = test_app().await;
    app.state
        .roles
        .create(NewRole {
            id: Some("readers".to_string()),
            name: "Readers".to_string(),
            description: String::new(),
            source: RoleSource::Business,
            resource_type_scope: ResourceTypeScope {
                unlimited: false,
                types: Vec::new(),
            }
            .with_type("doc", OperationsScope::only(["read", "download"])),
        })
        .await
        .expect("role");
    app.state
        .roles
        .add_members("readers", vec![user("u1")])
        .await
        .expect("members");
    app.state
        .policies
        .create(vec![new_policy(
            user("u1"),
            ResourceInfo::new("doc", "d1"),
            PolicyOperation::allowing(["read", "delete"]),
        )])
        .await
        .expect("create");

    assert!(allowed(&app, "d1", "u1", &["read"]).await);
    assert!(!allowed(&app, "d1", "u1", &["delete"]).await);
    // In scope but never granted.
    assert!(!allowed(&app, "d1", "u1", &["download"]).await);
}

#[tokio::test]
async fn role_policies_apply_to_members() {
    let app = test_app().await;
    app.state
        .roles
        .create(NewRole {
            id: Some("editors".to_string()),
            name: "Editors".to_string(),
            description: String::new(),
            source: RoleSource::User,
            resource_type_scope: ResourceTypeScope::of_types(["doc"]),
        })
        .await
        .expect("role");
    app.state
        .roles
        .add_members("editors", vec![AccessorInfo::new("dept1", AccessorType::Department)])
        .await
        .expect("members");
    app.state
        .policies
        .create(vec![new_policy(
            AccessorInfo::new("editors", AccessorType::Role),
            ResourceInfo::whole_type("doc"),
            PolicyOperation::allowing(["create", "delete"]),
        )])
        .await
        .expect("create");

    assert!(allowed(&app, "d7", "u1", &["delete"]).await);
    assert!(!allowed(&app, "d7", "u2", &["delete"]).await);

    let types = app
        .state
        .engine
        .resource_type_operations(&ResourceTypeOperationRequest {
            resource_types: vec!["doc".to_string(), "folder".to_string()],
            accessor: user("u1"),
        })
        .await
        .expect("type operations");
    assert_eq!(types[0].operations, vec!["create", "delete"]);
    assert!(types[1].operations.is_empty());
}

#[tokio::test]
async fn expiry_is_evaluated_at_decision_time() {
    let app = test_app().await;
    let end_time = NOW + 10;
    let mut policy = new_policy(
        user("u1"),
        ResourceInfo::new("doc", "d1"),
        PolicyOperation::allowing(["read"]),
    );
    policy.end_time = end_time;
    app.state.policies.create(vec![policy]).await.expect("create");

    app.clock.set(end_time - 1);
    assert!(allowed(&app, "d1", "u1", &["read"]).await);
    app.clock.set(end_time);
    assert!(allowed(&app, "d1", "u1", &["read"]).await);
    app.clock.set(end_time + 1);
    assert!(!allowed(&app, "d1", "u1", &["read"]).await);
}

#[tokio::test]
async fn batch_filter_and_operations_keep_input_order() {
    let app = test_app().await;
    app.state
        .policies
        .create(vec![
            new_policy(
                user("u1"),
                ResourceInfo::whole_type("doc"),
                PolicyOperation::allowing(["read"]),
            ),
            new_policy(
                user("u1"),
                ResourceInfo::new("doc", "d2"),
                PolicyOperation {
                    allow: vec![PolicyItem::new("download")],
                    deny: vec![PolicyItem::new("read")],
                },
            ),
        ])
        .await
        .expect("create");

    let resources = vec![
        ResourceInfo::new("doc", "d3"),
        ResourceInfo::new("doc", "d2"),
        ResourceInfo::new("doc", "d1"),
        ResourceInfo::new("unknown", "x"),
    ];
    let kept = app
        .state
        .engine
        .resource_filter(&ResourceFilterRequest {
            resources: resources.clone(),
            accessor: user("u1"),
            operations: ops(&["read"]),
            allow_operation: true,
            include: Vec::new(),
        })
        .await
        .expect("filter");
    let ids: Vec<&str> = kept.iter().map(|grant| grant.resource.id.as_str()).collect();
    assert_eq!(ids, vec!["d3", "d1"]);
    assert_eq!(
        kept[0].allowed_operations.as_deref(),
        Some(&["read".to_string()][..])
    );

    let all = app
        .state
        .engine
        .resource_operations(&ResourceOperationRequest {
            resources,
            accessor: user("u1"),
            include: Vec::new(),
        })
        .await
        .expect("operations");
    assert_eq!(all.len(), 4);
    assert_eq!(all[1].allowed_operations, Some(ops(&["download"])));
    assert_eq!(all[3].allowed_operations, Some(Vec::new()));
}

#[tokio::test]
async fn resource_list_only_names_live_instances() {
    let app = test_app().await;
    let mut expiring = new_policy(
        user("u1"),
        ResourceInfo::new("doc", "d9").named("Old"),
        PolicyOperation::allowing(["read"]),
    );
    expiring.end_time = NOW + 5;
    app.state
        .policies
        .create(vec![
            new_policy(
                user("u1"),
                ResourceInfo::new("doc", "d2").named("Budget"),
                PolicyOperation::allowing(["read"]),
            ),
            new_policy(
                AccessorInfo::new("dept1", AccessorType::Department),
                ResourceInfo::new("doc", "d1").named("Plan"),
                PolicyOperation::allowing(["download"]),
            ),
            new_policy(
                user("u1"),
                ResourceInfo::whole_type("doc"),
                PolicyOperation::allowing(["read"]),
            ),
            expiring,
        ])
        .await
        .expect("create");
    app.clock.set(NOW + 6);

    let listed = app
        .state
        .engine
        .resource_list(&ResourceListRequest {
            resource_type: "doc".to_string(),
            accessor: user("u1"),
            operations: ops(&["read"]),
            include: Vec::new(),
        })
        .await
        .expect("list");
    let names: Vec<(&str, Option<&str>)> = listed
        .iter()
        .map(|grant| (grant.resource.id.as_str(), grant.resource.name.as_deref()))
        .collect();
    assert_eq!(names, vec![("d1", Some("Plan")), ("d2", Some("Budget"))]);
}

#[tokio::test]
async fn authoring_rejects_overlap_ambiguous_refs_and_scope_violations() {
    let app = test_app().await;
    watermark_type(&app, ResourceTypeScope::of_types(["folder"])).await;

    let overlap = app
        .state
        .policies
        .create(vec![new_policy(
            user("u1"),
            ResourceInfo::new("doc", "d1"),
            PolicyOperation {
                allow: vec![PolicyItem::new("read")],
                deny: vec![PolicyItem::new("read")],
            },
        )])
        .await;
    assert!(matches!(overlap, Err(ServiceError::InvalidInput(_))));

    let mut ambiguous_ref = ObligationRef::instance("watermark", "wm");
    ambiguous_ref.value = Some(json!("X"));
    let ambiguous = app
        .state
        .policies
        .create(vec![new_policy(
            user("u1"),
            ResourceInfo::new("folder", "f1"),
            PolicyOperation {
                allow: vec![PolicyItem::new("list").with_obligation(ambiguous_ref)],
                deny: Vec::new(),
            },
        )])
        .await;
    assert!(matches!(ambiguous, Err(ServiceError::InvalidInput(_))));

    let out_of_scope = app
        .state
        .policies
        .create(vec![new_policy(
            user("u1"),
            ResourceInfo::new("doc", "d1"),
            PolicyOperation {
                allow: vec![
                    PolicyItem::new("download")
                        .with_obligation(ObligationRef::inline("watermark", json!("X"))),
                ],
                deny: Vec::new(),
            },
        )])
        .await;
    assert!(matches!(out_of_scope, Err(ServiceError::InvalidInput(_))));

    app.state
        .roles
        .create(NewRole {
            id: Some("folder-only".to_string()),
            name: "Folder only".to_string(),
            description: String::new(),
            source: RoleSource::User,
            resource_type_scope: ResourceTypeScope::of_types(["folder"]),
        })
        .await
        .expect("role");
    let role_outside_scope = app
        .state
        .policies
        .create(vec![new_policy(
            AccessorInfo::new("folder-only", AccessorType::Role),
            ResourceInfo::new("doc", "d1"),
            PolicyOperation::allowing(["read"]),
        )])
        .await;
    assert!(matches!(
        role_outside_scope,
        Err(ServiceError::InvalidInput(_))
    ));

    // Nothing from the rejected batches was stored.
    let stored = app.state.policies.list_by_accessor("u1").await.expect("list");
    assert!(stored.is_empty());
}

#[tokio::test]
async fn update_and_delete_change_decisions() {
    let app = test_app().await;
    let created = app
        .state
        .policies
        .create(vec![new_policy(
            user("u1"),
            ResourceInfo::new("doc", "d1"),
            PolicyOperation::allowing(["read"]),
        )])
        .await
        .expect("create");
    let id = created[0].id.clone();
    assert_eq!(created[0].accessor.name.as_deref(), Some("Ursula"));

    app.state
        .policies
        .update(
            &id,
            PolicyPatch {
                operation: Some(PolicyOperation::allowing(["download"])),
                ..Default::default()
            },
        )
        .await
        .expect("update");
    assert!(!allowed(&app, "d1", "u1", &["read"]).await);
    assert!(allowed(&app, "d1", "u1", &["download"]).await);

    assert_eq!(
        app.state.policies
            .delete(&[id.clone()])
            .await
            .expect("delete"),
        1
    );
    assert!(!allowed(&app, "d1", "u1", &["download"]).await);
    assert!(matches!(
        app.state.policies.get(&id).await,
        Err(ServiceError::NotFound(_))
    ));
}
