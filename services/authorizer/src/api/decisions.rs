//! Decision endpoints.
use crate::api::error::ApiError;
use crate::api::types::ListResponse;
use crate::app::AppState;
use crate::engine::{
    CheckRequest, CheckResult, ResourceFilterRequest, ResourceGrant, ResourceListRequest,
    ResourceOperationRequest, ResourceTypeGrant, ResourceTypeOperationRequest,
};
use axum::Json;
use axum::extract::State;

pub(crate) async fn operation_check(
    State(state): State<AppState>,
    Json(body): Json<CheckRequest>,
) -> Result<Json<CheckResult>, ApiError> {
    Ok(Json(state.engine.check(&body).await?))
}

pub(crate) async fn resource_filter(
    State(state): State<AppState>,
    Json(body): Json<ResourceFilterRequest>,
) -> Result<Json<ListResponse<ResourceGrant>>, ApiError> {
    Ok(Json(state.engine.resource_filter(&body).await?.into()))
}

pub(crate) async fn resource_list(
    State(state): State<AppState>,
    Json(body): Json<ResourceListRequest>,
) -> Result<Json<ListResponse<ResourceGrant>>, ApiError> {
    Ok(Json(state.engine.resource_list(&body).await?.into()))
}

pub(crate) async fn resource_operation(
    State(state): State<AppState>,
    Json(body): Json<ResourceOperationRequest>,
) -> Result<Json<ListResponse<ResourceGrant>>, ApiError> {
    Ok(Json(state.engine.resource_operations(&body).await?.into()))
}

pub(crate) async fn resource_type_operation(
    State(state): State<AppState>,
    Json(body): Json<ResourceTypeOperationRequest>,
) -> Result<Json<ListResponse<ResourceTypeGrant>>, ApiError> {
    Ok(Json(state.engine.resource_type_operations(&body).await?.into()))
}
