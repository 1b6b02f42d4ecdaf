//! Resource type, obligation type, and obligation endpoints.
use crate::api::error::{ApiError, api_not_found, api_validation_error};
use crate::api::require_caller;
use crate::api::types::{ListResponse, ObligationQuery};
use crate::app::AppState;
use crate::model::{NewObligation, Obligation, ObligationType, ResourceType};
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};

fn ensure_path_id(path_id: &str, body_id: &str) -> Result<(), ApiError> {
    if path_id != body_id {
        return Err(api_validation_error("id in body does not match path"));
    }
    Ok(())
}

pub(crate) async fn put_resource_type(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ResourceType>,
) -> Result<Json<ResourceType>, ApiError> {
    require_caller(&state, &headers).await?;
    ensure_path_id(&id, &body.id)?;
    Ok(Json(state.resource_types.put(body).await?))
}

pub(crate) async fn list_resource_types(
    State(state): State<AppState>,
) -> Result<Json<ListResponse<ResourceType>>, ApiError> {
    Ok(Json(state.resource_types.list().await?.into()))
}

pub(crate) async fn get_resource_type(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ResourceType>, ApiError> {
    state
        .resource_types
        .get(&id)
        .await?
        .map(Json)
        .ok_or_else(|| api_not_found("resource type not found"))
}

pub(crate) async fn delete_resource_type(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    require_caller(&state, &headers).await?;
    state.resource_types.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn put_obligation_type(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ObligationType>,
) -> Result<Json<ObligationType>, ApiError> {
    require_caller(&state, &headers).await?;
    ensure_path_id(&id, &body.id)?;
    Ok(Json(state.obligations.put_type(body).await?))
}

pub(crate) async fn list_obligation_types(
    State(state): State<AppState>,
) -> Result<Json<ListResponse<ObligationType>>, ApiError> {
    Ok(Json(state.obligations.list_types().await?.into()))
}

pub(crate) async fn get_obligation_type(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ObligationType>, ApiError> {
    state
        .obligations
        .get_type(&id)
        .await?
        .map(Json)
        .ok_or_else(|| api_not_found("obligation type not found"))
}

pub(crate) async fn delete_obligation_type(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    require_caller(&state, &headers).await?;
    state.obligations.delete_type(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn create_obligation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<NewObligation>,
) -> Result<(StatusCode, Json<Obligation>), ApiError> {
    require_caller(&state, &headers).await?;
    Ok((StatusCode::CREATED, Json(state.obligations.create(body).await?)))
}

pub(crate) async fn list_obligations(
    State(state): State<AppState>,
    Query(query): Query<ObligationQuery>,
) -> Result<Json<ListResponse<Obligation>>, ApiError> {
    Ok(Json(
        state.obligations.list(query.type_id.as_deref()).await?.into(),
    ))
}

pub(crate) async fn get_obligation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Obligation>, ApiError> {
    state
        .obligations
        .get(&id)
        .await?
        .map(Json)
        .ok_or_else(|| api_not_found("obligation not found"))
}

pub(crate) async fn delete_obligation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    require_caller(&state, &headers).await?;
    state.obligations.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
