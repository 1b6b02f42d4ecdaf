//! Ack-or-redeliver decision for failed messages.
use super::handlers::EventError;
use crate::error::{CollaboratorError, ServiceError};
use crate::store::StoreError;
use warden_authz::{AuthzError, Categorized, ErrorCategory};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Drop the message: retrying cannot change the outcome.
    Ack,
    Redeliver,
}

impl Disposition {
    pub fn as_str(self) -> &'static str {
        match self {
            Disposition::Ack => "rejected",
            Disposition::Redeliver => "retried",
        }
    }
}

/// Category of the first classified error in the chain, if any.
pub fn category_of(err: &anyhow::Error) -> Option<ErrorCategory> {
    err.chain().find_map(|cause| {
        if let Some(err) = cause.downcast_ref::<EventError>() {
            Some(err.category())
        } else if let Some(err) = cause.downcast_ref::<StoreError>() {
            Some(err.category())
        } else if let Some(err) = cause.downcast_ref::<ServiceError>() {
            Some(err.category())
        } else if let Some(err) = cause.downcast_ref::<CollaboratorError>() {
            Some(err.category())
        } else {
            cause.downcast_ref::<AuthzError>().map(Categorized::category)
        }
    })
}

pub fn disposition(err: &anyhow::Error) -> Disposition {
    match category_of(err) {
        Some(category) if !category.is_retryable() => Disposition::Ack,
        _ => Disposition::Redeliver,
    }
}
