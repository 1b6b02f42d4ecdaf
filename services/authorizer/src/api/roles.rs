//! Role and membership endpoints.
use crate::api::error::{ApiError, api_not_found};
use crate::api::types::{DeleteResponse, ListResponse, MembersRequest};
use crate::api::{require_caller, split_ids};
use crate::app::AppState;
use crate::model::{NewRole, Role, RoleMember, RolePatch};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};

pub(crate) async fn create_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<NewRole>,
) -> Result<(StatusCode, Json<Role>), ApiError> {
    require_caller(&state, &headers).await?;
    Ok((StatusCode::CREATED, Json(state.roles.create(body).await?)))
}

pub(crate) async fn list_roles(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ListResponse<Role>>, ApiError> {
    require_caller(&state, &headers).await?;
    Ok(Json(state.roles.list().await?.into()))
}

pub(crate) async fn get_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Role>, ApiError> {
    require_caller(&state, &headers).await?;
    state
        .roles
        .get(&id)
        .await?
        .map(Json)
        .ok_or_else(|| api_not_found("role not found"))
}

pub(crate) async fn patch_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(patch): Json<RolePatch>,
) -> Result<Json<Role>, ApiError> {
    require_caller(&state, &headers).await?;
    Ok(Json(state.roles.update(&id, patch).await?))
}

pub(crate) async fn delete_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    require_caller(&state, &headers).await?;
    state.roles.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn list_members(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ListResponse<RoleMember>>, ApiError> {
    require_caller(&state, &headers).await?;
    Ok(Json(state.roles.members(&id).await?.into()))
}

pub(crate) async fn add_members(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<MembersRequest>,
) -> Result<StatusCode, ApiError> {
    require_caller(&state, &headers).await?;
    state.roles.add_members(&id, body.members).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn remove_members(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((id, accessor_ids)): Path<(String, String)>,
) -> Result<Json<DeleteResponse>, ApiError> {
    require_caller(&state, &headers).await?;
    let deleted = state
        .roles
        .remove_members(&id, &split_ids(&accessor_ids))
        .await?;
    Ok(Json(DeleteResponse { deleted }))
}
