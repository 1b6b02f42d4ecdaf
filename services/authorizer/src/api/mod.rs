//! Thin HTTP adapter over the decision engine and authoring services.
//!
//! # Purpose
//! Translates JSON requests into service calls and service errors into
//! uniform error bodies. Authoring endpoints require an active bearer token;
//! decision endpoints are open to any caller that can reach the listener.
pub mod decisions;
pub mod error;
pub mod events;
pub mod policies;
pub mod registries;
pub mod roles;
pub mod system;
pub mod types;

use crate::api::error::{ApiError, api_internal, api_unauthorized};
use crate::app::AppState;
use crate::model::AccessorInfo;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;

/// Caller behind the request's bearer token.
pub(crate) async fn require_caller(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<AccessorInfo, ApiError> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| api_unauthorized("missing bearer token"))?;
    let introspection = state
        .introspector
        .introspect(token)
        .await
        .map_err(|err| api_internal("token introspection failed", &err))?;
    let caller = introspection
        .caller()
        .ok_or_else(|| api_unauthorized("inactive token"))?;
    tracing::debug!(
        caller_id = %caller.id,
        caller_type = %caller.accessor_type,
        "authenticated caller"
    );
    Ok(caller)
}

/// Split a comma separated path segment into non-empty IDs.
pub(crate) fn split_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}
