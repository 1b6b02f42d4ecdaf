//! Persistent authorization state.
//!
//! # Purpose
//! Defines the storage contracts used by the registries, the decision engine,
//! the authoring services, and the consistency consumers. Two backends exist:
//! [`memory::InMemoryStore`] for development and tests and
//! [`postgres::PostgresStore`] for durable deployments.
//!
//! # Key invariants
//! - At most one policy per (accessor ID, resource type, resource ID); inserting
//!   a second one is a [`StoreError::Conflict`].
//! - Multi-row writes (batched insert, resource replace, cascades) are atomic.
//! - Cascade deletes return the number of rows removed and are idempotent.
use crate::model::{
    AccessorInfo, Obligation, ObligationType, Policy, ResourceType, Role, RoleMember,
};
use async_trait::async_trait;
use thiserror::Error;
use warden_authz::{Categorized, ErrorCategory};

pub mod memory;
pub mod postgres;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Turn a `NotFound` into `Ok(None)`, keeping every other error.
pub fn found<T>(result: StoreResult<T>) -> StoreResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(StoreError::NotFound(_)) => Ok(None),
        Err(err) => Err(err),
    }
}

impl Categorized for StoreError {
    fn category(&self) -> ErrorCategory {
        match self {
            StoreError::NotFound(_) | StoreError::Conflict(_) | StoreError::InvalidInput(_) => {
                ErrorCategory::External
            }
            StoreError::Unavailable(_) | StoreError::Unexpected(_) => ErrorCategory::Internal,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound("row".into()),
            sqlx::Error::PoolTimedOut => {
                StoreError::Unavailable("connection pool timed out".into())
            }
            sqlx::Error::PoolClosed => StoreError::Unavailable("connection pool closed".into()),
            sqlx::Error::Io(io) => StoreError::Unavailable(io.to_string()),
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                StoreError::Conflict(db_err.message().to_string())
            }
            // 23503: foreign_key_violation, a reference to a row that does not exist.
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23503") => {
                StoreError::InvalidInput(db_err.message().to_string())
            }
            // 57014: query_canceled, raised when statement_timeout fires.
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("57014") => {
                StoreError::Unavailable(db_err.message().to_string())
            }
            other => StoreError::Unexpected(other.into()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::Unexpected(err.into())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Unexpected(err.into())
    }
}

#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Insert new policies atomically. Fails with `Conflict` when any of them
    /// collides with an existing (accessor, resource) pair or with each other.
    async fn insert_policies(&self, policies: Vec<Policy>) -> StoreResult<()>;
    async fn get_policy(&self, id: &str) -> StoreResult<Policy>;
    /// Replace a stored policy by ID.
    async fn update_policy(&self, policy: Policy) -> StoreResult<Policy>;
    async fn delete_policies(&self, ids: &[String]) -> StoreResult<u64>;
    /// Atomically swap every policy on one resource for `policies`.
    async fn replace_resource_policies(
        &self,
        resource_type: &str,
        resource_id: &str,
        policies: Vec<Policy>,
    ) -> StoreResult<()>;
    async fn list_resource_policies(
        &self,
        resource_type: &str,
        resource_id: &str,
    ) -> StoreResult<Vec<Policy>>;
    async fn list_accessor_policies(&self, accessor_id: &str) -> StoreResult<Vec<Policy>>;
    /// Policies of `accessor_ids` on the given resources of one type. Callers
    /// include `*` in `resource_ids` to pick up type-level policies.
    async fn find_policies(
        &self,
        accessor_ids: &[String],
        resource_type: &str,
        resource_ids: &[String],
    ) -> StoreResult<Vec<Policy>>;
    /// Every policy of `accessor_ids` on any resource of one type.
    async fn find_type_policies(
        &self,
        accessor_ids: &[String],
        resource_type: &str,
    ) -> StoreResult<Vec<Policy>>;
    async fn delete_accessor_policies(&self, accessor_id: &str) -> StoreResult<u64>;
    async fn delete_resource_policies(
        &self,
        resource_type: &str,
        resource_id: &str,
    ) -> StoreResult<u64>;
    /// Delete policies with `end_time != -1 && end_time < now_micros`.
    async fn delete_expired_policies(&self, now_micros: i64) -> StoreResult<u64>;
    async fn rename_policy_accessor(&self, accessor_id: &str, name: &str) -> StoreResult<u64>;
    async fn rename_policy_resource(
        &self,
        resource_type: &str,
        resource_id: &str,
        name: &str,
    ) -> StoreResult<u64>;
}

#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Fails with `Conflict` on a duplicate role ID or name.
    async fn create_role(&self, role: Role) -> StoreResult<Role>;
    async fn get_role(&self, id: &str) -> StoreResult<Role>;
    /// Roles among `ids`; unknown IDs are skipped.
    async fn get_roles(&self, ids: &[String]) -> StoreResult<Vec<Role>>;
    async fn list_roles(&self) -> StoreResult<Vec<Role>>;
    async fn update_role(&self, role: Role) -> StoreResult<Role>;
    /// Delete a role, its memberships, and every policy held by the role.
    async fn delete_role(&self, id: &str) -> StoreResult<()>;
    /// Upsert memberships. Fails with `NotFound` when the role does not exist.
    async fn add_role_members(&self, role_id: &str, members: Vec<AccessorInfo>)
    -> StoreResult<()>;
    async fn remove_role_members(&self, role_id: &str, accessor_ids: &[String])
    -> StoreResult<u64>;
    async fn list_role_members(&self, role_id: &str) -> StoreResult<Vec<RoleMember>>;
    /// Distinct role IDs held directly by any of `accessor_ids`, sorted.
    async fn roles_of_accessors(&self, accessor_ids: &[String]) -> StoreResult<Vec<String>>;
    async fn delete_accessor_memberships(&self, accessor_id: &str) -> StoreResult<u64>;
    async fn rename_member_accessor(&self, accessor_id: &str, name: &str) -> StoreResult<u64>;
}

#[async_trait]
pub trait RegistryStore: Send + Sync {
    async fn upsert_resource_type(&self, resource_type: ResourceType) -> StoreResult<ResourceType>;
    async fn get_resource_type(&self, id: &str) -> StoreResult<ResourceType>;
    async fn list_resource_types(&self) -> StoreResult<Vec<ResourceType>>;
    /// Delete a resource type and every policy on it.
    async fn delete_resource_type(&self, id: &str) -> StoreResult<()>;

    async fn upsert_obligation_type(
        &self,
        obligation_type: ObligationType,
    ) -> StoreResult<ObligationType>;
    async fn get_obligation_type(&self, id: &str) -> StoreResult<ObligationType>;
    async fn list_obligation_types(&self) -> StoreResult<Vec<ObligationType>>;
    /// Delete an obligation type and its instances.
    async fn delete_obligation_type(&self, id: &str) -> StoreResult<()>;

    /// Fails with `Conflict` on a duplicate ID.
    async fn create_obligation(&self, obligation: Obligation) -> StoreResult<Obligation>;
    async fn get_obligation(&self, id: &str) -> StoreResult<Obligation>;
    async fn list_obligations(&self, type_id: Option<&str>) -> StoreResult<Vec<Obligation>>;
    async fn delete_obligation(&self, id: &str) -> StoreResult<()>;
}

/// Everything the service needs from a backend.
#[async_trait]
pub trait AuthorizationStore: PolicyStore + RoleStore + RegistryStore {
    async fn health_check(&self) -> StoreResult<()>;
    fn is_durable(&self) -> bool;
    fn backend_name(&self) -> &'static str;
}
