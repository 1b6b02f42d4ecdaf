//! Authorizer HTTP application wiring.
//!
//! # Purpose
//! Builds the public and internal Axum routers and the shared state injected
//! into handlers. Registries are created once here and shared by the decision
//! engine and the authoring services so cache invalidation is seen by both.
use crate::api;
use crate::authoring::PolicyService;
use crate::clock::Clock;
use crate::directory::Directory;
use crate::engine::DecisionEngine;
use crate::events::MessageQueue;
use crate::hierarchy::HierarchyResolver;
use crate::identity::TokenIntrospector;
use crate::observability;
use crate::registry::{ObligationRegistry, ResourceTypeRegistry, RoleRegistry};
use crate::store::AuthorizationStore;
use axum::Router;
use axum::routing::{get, post, put};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing_opentelemetry::OpenTelemetrySpanExt;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn AuthorizationStore>,
    pub engine: Arc<DecisionEngine>,
    pub policies: Arc<PolicyService>,
    pub resource_types: Arc<ResourceTypeRegistry>,
    pub roles: Arc<RoleRegistry>,
    pub obligations: Arc<ObligationRegistry>,
    pub introspector: Arc<dyn TokenIntrospector>,
    pub queue: Arc<dyn MessageQueue>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn AuthorizationStore>,
        directory: Arc<dyn Directory>,
        introspector: Arc<dyn TokenIntrospector>,
        queue: Arc<dyn MessageQueue>,
        clock: Arc<dyn Clock>,
        cache_ttl: Duration,
    ) -> Self {
        let resource_types = Arc::new(ResourceTypeRegistry::new(store.clone(), cache_ttl));
        let roles = Arc::new(RoleRegistry::new(store.clone(), cache_ttl));
        let obligations = Arc::new(ObligationRegistry::new(store.clone(), cache_ttl));
        let engine = DecisionEngine::new(
            store.clone(),
            HierarchyResolver::new(directory.clone(), store.clone()),
            resource_types.clone(),
            roles.clone(),
            obligations.clone(),
            clock.clone(),
        );
        let policies = PolicyService::new(
            store.clone(),
            resource_types.clone(),
            roles.clone(),
            obligations.clone(),
            directory,
            clock,
        );
        Self {
            store,
            engine: Arc::new(engine),
            policies: Arc::new(policies),
            resource_types,
            roles,
            obligations,
            introspector,
            queue,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            let parent = observability::trace_context_from_headers(request.headers());
            let span = tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version()
            );
            span.set_parent(parent);
            span
        });

    Router::new()
        .route(
            "/v1/system/health",
            get(api::system::system_health),
        )
        .route(
            "/v1/operation-check",
            post(api::decisions::operation_check),
        )
        .route(
            "/v1/resource-filter",
            post(api::decisions::resource_filter),
        )
        .route("/v1/resource-list", post(api::decisions::resource_list))
        .route(
            "/v1/resource-operation",
            post(api::decisions::resource_operation),
        )
        .route(
            "/v1/resource-type-operation",
            post(api::decisions::resource_type_operation),
        )
        .route(
            "/v1/policies",
            get(api::policies::list_policies).post(api::policies::create_policies),
        )
        .route(
            "/v1/policies/:ids",
            get(api::policies::get_policy)
                .patch(api::policies::patch_policy)
                .delete(api::policies::delete_policies),
        )
        .route(
            "/v1/resources/:resource_type/:resource_id/policies",
            put(api::policies::init_resource_policies),
        )
        .route(
            "/v1/roles",
            get(api::roles::list_roles).post(api::roles::create_role),
        )
        .route(
            "/v1/roles/:role_id",
            get(api::roles::get_role)
                .patch(api::roles::patch_role)
                .delete(api::roles::delete_role),
        )
        .route(
            "/v1/roles/:role_id/members",
            get(api::roles::list_members).post(api::roles::add_members),
        )
        .route(
            "/v1/roles/:role_id/members/:accessor_ids",
            axum::routing::delete(api::roles::remove_members),
        )
        .route(
            "/v1/resource-types",
            get(api::registries::list_resource_types),
        )
        .route(
            "/v1/resource-types/:type_id",
            get(api::registries::get_resource_type)
                .put(api::registries::put_resource_type)
                .delete(api::registries::delete_resource_type),
        )
        .route(
            "/v1/obligation-types",
            get(api::registries::list_obligation_types),
        )
        .route(
            "/v1/obligation-types/:type_id",
            get(api::registries::get_obligation_type)
                .put(api::registries::put_obligation_type)
                .delete(api::registries::delete_obligation_type),
        )
        .route(
            "/v1/obligations",
            get(api::registries::list_obligations).post(api::registries::create_obligation),
        )
        .route(
            "/v1/obligations/:obligation_id",
            get(api::registries::get_obligation).delete(api::registries::delete_obligation),
        )
        .layer(trace_layer)
        .with_state(state)
}

/// Router for the loopback listener. Not exposed to callers outside the host.
pub fn build_internal_router(state: AppState) -> Router {
    Router::new()
        .route("/internal/events/:topic", post(api::events::publish_event))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
