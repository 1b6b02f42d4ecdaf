//! API error types and helpers.
//!
//! # Purpose
//! Keeps error bodies uniform across endpoints and maps service errors onto
//! status codes.
//!
//! # Security considerations
//! Internal failures are logged server side; clients only ever see a generic
//! message for them.
use crate::api::types::ErrorResponse;
use crate::error::ServiceError;
use crate::store::StoreError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self.body)).into_response()
    }
}

fn api_error(status: StatusCode, code: &str, message: &str) -> ApiError {
    ApiError {
        status,
        body: ErrorResponse {
            code: code.to_string(),
            message: message.to_string(),
            request_id: None,
        },
    }
}

pub fn api_not_found(message: &str) -> ApiError {
    api_error(StatusCode::NOT_FOUND, "not_found", message)
}

pub fn api_conflict(message: &str) -> ApiError {
    api_error(StatusCode::CONFLICT, "conflict", message)
}

pub fn api_validation_error(message: &str) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, "validation_error", message)
}

pub fn api_unauthorized(message: &str) -> ApiError {
    api_error(StatusCode::UNAUTHORIZED, "unauthorized", message)
}

/// Generic 500. `err` is logged, never returned.
pub fn api_internal(message: &str, err: &dyn std::fmt::Display) -> ApiError {
    tracing::error!(error = %err, "{message}");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match &err {
            ServiceError::InvalidInput(message) => api_validation_error(message),
            ServiceError::NotFound(message) => api_not_found(message),
            ServiceError::Conflict(message) => api_conflict(message),
            // A collaborator refusing our request is still our failure.
            ServiceError::Store(_) | ServiceError::Collaborator(_) => {
                api_internal("request failed", &err)
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ServiceError::from(err).into()
    }
}
