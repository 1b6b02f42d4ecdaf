//! Policy authoring endpoints.
use crate::api::error::{ApiError, api_validation_error};
use crate::api::types::{DeleteResponse, ListResponse, PolicyBatchRequest, PolicyQuery};
use crate::api::{require_caller, split_ids};
use crate::app::AppState;
use crate::model::{Policy, PolicyPatch};
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};

pub(crate) async fn create_policies(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<PolicyBatchRequest>,
) -> Result<(StatusCode, Json<ListResponse<Policy>>), ApiError> {
    let caller = require_caller(&state, &headers).await?;
    let created = state.policies.create(body.policies).await?;
    tracing::info!(caller_id = %caller.id, count = created.len(), "policies created via api");
    Ok((StatusCode::CREATED, Json(created.into())))
}

pub(crate) async fn list_policies(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PolicyQuery>,
) -> Result<Json<ListResponse<Policy>>, ApiError> {
    require_caller(&state, &headers).await?;
    let items = match query {
        PolicyQuery {
            accessor_id: Some(accessor_id),
            resource_type: None,
            resource_id: None,
        } => state.policies.list_by_accessor(&accessor_id).await?,
        PolicyQuery {
            accessor_id: None,
            resource_type: Some(resource_type),
            resource_id: Some(resource_id),
        } => {
            state
                .policies
                .list_by_resource(&resource_type, &resource_id)
                .await?
        }
        _ => {
            return Err(api_validation_error(
                "filter by accessor_id, or by resource_type and resource_id",
            ));
        }
    };
    Ok(Json(items.into()))
}

pub(crate) async fn get_policy(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Policy>, ApiError> {
    require_caller(&state, &headers).await?;
    Ok(Json(state.policies.get(&id).await?))
}

pub(crate) async fn patch_policy(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(patch): Json<PolicyPatch>,
) -> Result<Json<Policy>, ApiError> {
    require_caller(&state, &headers).await?;
    Ok(Json(state.policies.update(&id, patch).await?))
}

/// `DELETE /v1/policies/:ids` with a comma separated ID list.
pub(crate) async fn delete_policies(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(ids): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    require_caller(&state, &headers).await?;
    let deleted = state.policies.delete(&split_ids(&ids)).await?;
    Ok(Json(DeleteResponse { deleted }))
}

/// Replace every policy on one resource.
pub(crate) async fn init_resource_policies(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((resource_type, resource_id)): Path<(String, String)>,
    Json(body): Json<PolicyBatchRequest>,
) -> Result<Json<ListResponse<Policy>>, ApiError> {
    require_caller(&state, &headers).await?;
    let policies = state
        .policies
        .init_resource(&resource_type, &resource_id, body.policies)
        .await?;
    Ok(Json(policies.into()))
}
