//! Request and response bodies used only by the HTTP adapter.
use crate::model::{AccessorInfo, NewPolicy};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub request_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HealthStatus {
    pub status: String,
    pub backend: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(items: Vec<T>) -> Self {
        Self { items }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct DeleteResponse {
    pub deleted: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PolicyBatchRequest {
    pub policies: Vec<NewPolicy>,
}

/// Policy listing filter: by accessor, or by one resource.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct PolicyQuery {
    pub accessor_id: Option<String>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MembersRequest {
    pub members: Vec<AccessorInfo>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ObligationQuery {
    pub type_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EventAccepted {
    pub topic: String,
    pub message_id: u64,
}
