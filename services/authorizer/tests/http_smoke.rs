mod common;

use authorizer::app::{build_internal_router, build_router};
use authorizer::events::handlers::USER_DELETED;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{authed_json_request, json_request, read_json, test_app};
use serde_json::json;
use tower::ServiceExt;

fn doc_policy(accessor: &str, resource_id: &str, allow: &[&str]) -> serde_json::Value {
    json!({
        "accessor": {"id": accessor, "type": "user"},
        "resource": {"id": resource_id, "type": "doc", "name": "Quarterly report"},
        "operation": {
            "allow": allow.iter().map(|op| json!({"id": op})).collect::<Vec<_>>(),
            "deny": []
        }
    })
}

#[tokio::test]
async fn health_reports_backend() {
    let app = build_router(test_app().await.state);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/system/health")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["backend"], "memory");
}

#[tokio::test]
async fn authoring_requires_active_bearer_token() {
    let app = build_router(test_app().await.state);
    let body = json!({"policies": [doc_policy("u1", "d1", &["read"])]});

    let response = app
        .clone()
        .oneshot(json_request("POST", "/v1/policies", body.clone()))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(read_json(response).await["code"], "unauthorized");

    let mut request = json_request("POST", "/v1/policies", body);
    request
        .headers_mut()
        .insert("authorization", "Bearer stale-token".parse().expect("header"));
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_check_and_delete_policy() {
    let app = build_router(test_app().await.state);

    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/v1/policies",
            json!({"policies": [doc_policy("u1", "d1", &["read", "download"])]}),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = read_json(response).await;
    let policy_id = created["items"][0]["id"].as_str().expect("id").to_string();
    assert_eq!(created["items"][0]["end_time"], -1);

    let check = json!({
        "resource": {"id": "d1", "type": "doc"},
        "accessor": {"id": "u1", "type": "user"},
        "operations": ["read"],
        "include": ["operation_obligations"]
    });
    let response = app
        .clone()
        .oneshot(json_request("POST", "/v1/operation-check", check.clone()))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let decision = read_json(response).await;
    assert_eq!(decision["allowed"], true);
    assert_eq!(decision["operation_obligations"]["read"], json!([]));

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/v1/resource-list",
            json!({
                "resource_type": "doc",
                "accessor": {"id": "u1", "type": "user"},
                "operations": ["download"]
            }),
        ))
        .await
        .expect("response");
    let listed = read_json(response).await;
    assert_eq!(listed["items"][0]["resource"]["name"], "Quarterly report");

    let response = app
        .clone()
        .oneshot(authed_json_request(
            "DELETE",
            &format!("/v1/policies/{policy_id}"),
            json!({}),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["deleted"], 1);

    let response = app
        .oneshot(json_request("POST", "/v1/operation-check", check))
        .await
        .expect("response");
    assert_eq!(read_json(response).await["allowed"], false);
}

#[tokio::test]
async fn invalid_policy_is_a_validation_error() {
    let app = build_router(test_app().await.state);
    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/v1/policies",
            json!({"policies": [doc_policy("u1", "d1", &["fly"])]}),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["code"], "validation_error");

    let response = app
        .oneshot(json_request(
            "POST",
            "/v1/operation-check",
            json!({
                "resource": {"id": "d1", "type": "doc"},
                "accessor": {"id": "u1", "type": "user"},
                "operations": []
            }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn obligation_with_instance_and_value_is_a_validation_error() {
    let app = build_router(test_app().await.state);
    let response = app
        .oneshot(authed_json_request(
            "POST",
            "/v1/policies",
            json!({"policies": [{
                "accessor": {"id": "u1", "type": "user"},
                "resource": {"id": "d1", "type": "doc"},
                "operation": {
                    "allow": [{
                        "id": "download",
                        "obligations": [{"type_id": "watermark", "id": "wm-1", "value": "X"}]
                    }],
                    "deny": []
                }
            }]}),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["code"], "validation_error");
}

#[tokio::test]
async fn resource_type_path_must_match_body() {
    let app = build_router(test_app().await.state);
    let body = json!({
        "id": "bucket",
        "name": "Bucket",
        "operations": [{"id": "list", "scope": "instance"}]
    });
    let response = app
        .clone()
        .oneshot(authed_json_request("PUT", "/v1/resource-types/pail", body.clone()))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(authed_json_request("PUT", "/v1/resource-types/bucket", body))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/resource-types/bucket")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["operations"][0]["id"], "list");
}

#[tokio::test]
async fn role_lifecycle() {
    let app = build_router(test_app().await.state);
    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/v1/roles",
            json!({
                "id": "viewers",
                "name": "Viewers",
                "resource_type_scope": {"types": [{"id": "doc"}]}
            }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/v1/roles/viewers/members",
            json!({"members": [{"id": "u1", "type": "user"}]}),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .clone()
        .oneshot(authed_json_request("GET", "/v1/roles/viewers/members", json!({})))
        .await
        .expect("response");
    let members = read_json(response).await;
    assert_eq!(members["items"][0]["accessor"]["id"], "u1");

    let response = app
        .clone()
        .oneshot(authed_json_request("DELETE", "/v1/roles/viewers", json!({})))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(authed_json_request("GET", "/v1/roles/viewers", json!({})))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn internal_router_enqueues_known_topics() {
    let test = test_app().await;
    let queue = test.queue.clone();
    let app = build_internal_router(test.state);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/internal/events/{USER_DELETED}"),
            json!({"id": "u1"}),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(read_json(response).await["topic"], USER_DELETED);
    assert_eq!(queue.ready(USER_DELETED).await, 1);

    let response = app
        .oneshot(json_request("POST", "/internal/events/org.moon.deleted", json!({})))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
