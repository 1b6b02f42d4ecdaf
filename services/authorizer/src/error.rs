//! Error types for the authorizer services.
//!
//! # Key invariants
//! - Every error exposes an [`ErrorCategory`]; retry decisions switch on it and
//!   never on message text.
//! - `NotFound`, `Conflict`, and `InvalidInput` coming out of the store are
//!   lifted into the matching [`ServiceError`] variants so callers can match on
//!   one type.
use crate::store::StoreError;
use thiserror::Error;
use warden_authz::{AuthzError, Categorized, ErrorCategory};

/// Failure talking to an external collaborator (directory, token introspection).
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("{service} rejected the request with status {status}")]
    Rejected { service: &'static str, status: u16 },
    #[error("{service} unavailable: {reason}")]
    Unavailable {
        service: &'static str,
        reason: String,
    },
    #[error("{service} returned an undecodable response: {reason}")]
    Decode {
        service: &'static str,
        reason: String,
    },
}

impl CollaboratorError {
    pub fn from_reqwest(service: &'static str, err: reqwest::Error) -> Self {
        if err.is_decode() {
            return CollaboratorError::Decode {
                service,
                reason: err.to_string(),
            };
        }
        match err.status() {
            Some(status) if status.is_client_error() => CollaboratorError::Rejected {
                service,
                status: status.as_u16(),
            },
            _ => CollaboratorError::Unavailable {
                service,
                reason: err.to_string(),
            },
        }
    }
}

impl Categorized for CollaboratorError {
    fn category(&self) -> ErrorCategory {
        match self {
            CollaboratorError::Rejected { .. } => ErrorCategory::External,
            CollaboratorError::Unavailable { .. } | CollaboratorError::Decode { .. } => {
                ErrorCategory::Internal
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Store(StoreError),
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ServiceError::InvalidInput(message.into())
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(message) => ServiceError::NotFound(message),
            StoreError::Conflict(message) => ServiceError::Conflict(message),
            StoreError::InvalidInput(message) => ServiceError::InvalidInput(message),
            other => ServiceError::Store(other),
        }
    }
}

impl From<AuthzError> for ServiceError {
    fn from(err: AuthzError) -> Self {
        ServiceError::InvalidInput(err.to_string())
    }
}

impl Categorized for ServiceError {
    fn category(&self) -> ErrorCategory {
        match self {
            ServiceError::InvalidInput(_)
            | ServiceError::NotFound(_)
            | ServiceError::Conflict(_) => ErrorCategory::External,
            ServiceError::Store(err) => err.category(),
            ServiceError::Collaborator(err) => err.category(),
        }
    }
}
