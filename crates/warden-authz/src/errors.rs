use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which side of the system caused a failure.
///
/// `External` failures (bad or stale references, missing rows, malformed input)
/// cannot be fixed by trying again. `Internal` failures (storage unavailable,
/// timeouts, unexpected errors) may succeed on a later attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    External,
    Internal,
}

impl ErrorCategory {
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorCategory::Internal)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::External => "external",
            ErrorCategory::Internal => "internal",
        }
    }
}

/// Errors that know which [`ErrorCategory`] they belong to.
pub trait Categorized {
    fn category(&self) -> ErrorCategory;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("invalid accessor type: {0}")]
    InvalidAccessorType(String),
    #[error("invalid operation scope: {0}")]
    InvalidOperationScope(String),
    #[error("invalid resource type scope: {0}")]
    InvalidScope(String),
    #[error("invalid end time {end_time}: {reason}")]
    InvalidEndTime { end_time: i64, reason: &'static str },
}

impl Categorized for AuthzError {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::External
    }
}

pub type AuthzResult<T> = Result<T, AuthzError>;
