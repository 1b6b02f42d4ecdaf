//! Postgres-backed implementation of the authorization store.
//!
//! # Purpose
//! Durable, shared storage for policies, roles, memberships, and the resource
//! and obligation registries.
//!
//! # Data model
//! - Scalar fields used in lookups live in their own columns (`accessor_id`,
//!   `resource_type`, `resource_id`, `end_time`).
//! - Nested shapes (operation lists, scopes, JSON schemas) are stored as JSONB
//!   and decoded into the domain types on read.
//! - `UNIQUE (accessor_id, resource_type, resource_id)` enforces one policy per
//!   pair; a violation surfaces as [`StoreError::Conflict`].
//!
//! # Consistency / atomicity
//! Batched inserts, resource replacement, and cascades run inside one
//! transaction. Role memberships and obligation instances cascade through
//! `ON DELETE CASCADE` foreign keys.
//!
//! # Operational notes
//! - Migrations run at connect time via `sqlx::migrate!("./migrations")`.
//! - Every statement is bounded by the server-side `statement_timeout` set on
//!   the connection, and pool waits by `acquire_timeout`. Both surface as
//!   [`StoreError::Unavailable`].
//! - Database URLs may contain credentials; never log them.
use super::{
    AuthorizationStore, PolicyStore, RegistryStore, RoleStore, StoreError, StoreResult,
};
use crate::config::PostgresConfig;
use crate::model::{
    AccessorInfo, Condition, Obligation, ObligationType, Policy, ResourceInfo, ResourceType,
    Role, RoleMember,
};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{FromRow, PgConnection, PgPool};
use std::str::FromStr;
use std::time::Duration;
use warden_authz::AccessorType;

const POLICY_COLUMNS: &str = "id, accessor_id, accessor_type, accessor_name, resource_type, \
     resource_id, resource_name, operation, condition, end_time, created_at, modified_at";

/// Durable authorization store backed by Postgres.
///
/// # Example
/// ```rust,no_run
/// use authorizer::config::PostgresConfig;
/// use authorizer::store::postgres::PostgresStore;
///
/// async fn open(pg: PostgresConfig) {
///     let _ = PostgresStore::connect(&pg).await;
/// }
/// ```
pub struct PostgresStore {
    pool: PgPool,
}

#[derive(Debug, Clone, FromRow)]
struct DbPolicy {
    id: String,
    accessor_id: String,
    accessor_type: String,
    accessor_name: Option<String>,
    resource_type: String,
    resource_id: String,
    resource_name: Option<String>,
    operation: Value,
    condition: String,
    end_time: i64,
    created_at: i64,
    modified_at: i64,
}

#[derive(Debug, Clone, FromRow)]
struct DbRole {
    id: String,
    name: String,
    description: String,
    source: String,
    resource_type_scope: Value,
}

#[derive(Debug, Clone, FromRow)]
struct DbRoleMember {
    role_id: String,
    accessor_id: String,
    accessor_type: String,
    accessor_name: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
struct DbResourceType {
    id: String,
    name: String,
    description: String,
    instance_url: String,
    data_struct: String,
    hidden: bool,
    operations: Value,
}

#[derive(Debug, Clone, FromRow)]
struct DbObligationType {
    id: String,
    name: String,
    description: String,
    schema: Value,
    default_value: Option<Value>,
    ui_schema: Option<Value>,
    applicable: Value,
}

#[derive(Debug, Clone, FromRow)]
struct DbObligation {
    id: String,
    type_id: String,
    name: String,
    description: String,
    value: Value,
}

impl PostgresStore {
    /// Connect to Postgres and apply embedded migrations.
    pub async fn connect(pg: &PostgresConfig) -> StoreResult<Self> {
        let statement_timeout = pg.statement_timeout_ms.to_string();
        let connect_options = PgConnectOptions::from_str(&pg.url)?
            .options([("statement_timeout", statement_timeout.as_str())]);
        let pool = PgPoolOptions::new()
            .max_connections(pg.max_connections)
            .acquire_timeout(Duration::from_millis(pg.acquire_timeout_ms))
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        let store = Self { pool };
        store.refresh_counts().await?;
        Ok(store)
    }

    async fn refresh_counts(&self) -> StoreResult<()> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM policies")
            .fetch_one(&self.pool)
            .await?;
        metrics::gauge!("warden_policies_total").set(total as f64);
        Ok(())
    }

    async fn fetch_policies(&self, sql: &str, binds: PolicyBinds<'_>) -> StoreResult<Vec<Policy>> {
        let query = sqlx::query_as::<_, DbPolicy>(sql);
        let query = match binds {
            PolicyBinds::One(a) => query.bind(a),
            PolicyBinds::Two(a, b) => query.bind(a).bind(b),
            PolicyBinds::Set(ids, resource_type) => query.bind(ids).bind(resource_type),
            PolicyBinds::SetAndIds(ids, resource_type, resource_ids) => {
                query.bind(ids).bind(resource_type).bind(resource_ids)
            }
        };
        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter().map(policy_from_db).collect()
    }
}

enum PolicyBinds<'a> {
    One(&'a str),
    Two(&'a str, &'a str),
    Set(&'a [String], &'a str),
    SetAndIds(&'a [String], &'a str, &'a [String]),
}

async fn insert_policy(conn: &mut PgConnection, policy: &Policy) -> StoreResult<()> {
    sqlx::query(
        r#"INSERT INTO policies (id, accessor_id, accessor_type, accessor_name, resource_type,
               resource_id, resource_name, operation, condition, end_time, created_at, modified_at)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"#,
    )
    .bind(&policy.id)
    .bind(&policy.accessor.id)
    .bind(policy.accessor.accessor_type.as_str())
    .bind(&policy.accessor.name)
    .bind(&policy.resource.resource_type)
    .bind(&policy.resource.id)
    .bind(&policy.resource.name)
    .bind(serde_json::to_value(&policy.operation)?)
    .bind(policy.condition.as_str())
    .bind(policy.end_time)
    .bind(policy.created_at)
    .bind(policy.modified_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[async_trait]
impl PolicyStore for PostgresStore {
    async fn insert_policies(&self, policies: Vec<Policy>) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        for policy in &policies {
            insert_policy(&mut tx, policy).await?;
        }
        tx.commit().await?;
        self.refresh_counts().await
    }

    async fn get_policy(&self, id: &str) -> StoreResult<Policy> {
        let sql = format!("SELECT {POLICY_COLUMNS} FROM policies WHERE id = $1");
        let row = sqlx::query_as::<_, DbPolicy>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => policy_from_db(row),
            None => Err(StoreError::NotFound(format!("policy {id}"))),
        }
    }

    async fn update_policy(&self, policy: Policy) -> StoreResult<Policy> {
        let result = sqlx::query(
            r#"UPDATE policies SET operation = $2, condition = $3, end_time = $4, modified_at = $5,
                   accessor_name = $6, resource_name = $7
               WHERE id = $1 AND accessor_id = $8 AND resource_type = $9 AND resource_id = $10"#,
        )
        .bind(&policy.id)
        .bind(serde_json::to_value(&policy.operation)?)
        .bind(policy.condition.as_str())
        .bind(policy.end_time)
        .bind(policy.modified_at)
        .bind(&policy.accessor.name)
        .bind(&policy.resource.name)
        .bind(&policy.accessor.id)
        .bind(&policy.resource.resource_type)
        .bind(&policy.resource.id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("policy {}", policy.id)));
        }
        Ok(policy)
    }

    async fn delete_policies(&self, ids: &[String]) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM policies WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await?;
        self.refresh_counts().await?;
        Ok(result.rows_affected())
    }

    async fn replace_resource_policies(
        &self,
        resource_type: &str,
        resource_id: &str,
        policies: Vec<Policy>,
    ) -> StoreResult<()> {
        if let Some(stray) = policies.iter().find(|policy| {
            policy.resource.resource_type != resource_type || policy.resource.id != resource_id
        }) {
            return Err(StoreError::InvalidInput(format!(
                "policy {} does not address {resource_type}/{resource_id}",
                stray.id
            )));
        }
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM policies WHERE resource_type = $1 AND resource_id = $2")
            .bind(resource_type)
            .bind(resource_id)
            .execute(&mut *tx)
            .await?;
        for policy in &policies {
            insert_policy(&mut tx, policy).await?;
        }
        tx.commit().await?;
        self.refresh_counts().await
    }

    async fn list_resource_policies(
        &self,
        resource_type: &str,
        resource_id: &str,
    ) -> StoreResult<Vec<Policy>> {
        let sql = format!(
            "SELECT {POLICY_COLUMNS} FROM policies WHERE resource_type = $1 AND resource_id = $2 \
             ORDER BY accessor_id"
        );
        self.fetch_policies(&sql, PolicyBinds::Two(resource_type, resource_id))
            .await
    }

    async fn list_accessor_policies(&self, accessor_id: &str) -> StoreResult<Vec<Policy>> {
        let sql = format!(
            "SELECT {POLICY_COLUMNS} FROM policies WHERE accessor_id = $1 \
             ORDER BY resource_type, resource_id"
        );
        self.fetch_policies(&sql, PolicyBinds::One(accessor_id)).await
    }

    async fn find_policies(
        &self,
        accessor_ids: &[String],
        resource_type: &str,
        resource_ids: &[String],
    ) -> StoreResult<Vec<Policy>> {
        let sql = format!(
            "SELECT {POLICY_COLUMNS} FROM policies \
             WHERE accessor_id = ANY($1) AND resource_type = $2 AND resource_id = ANY($3)"
        );
        self.fetch_policies(
            &sql,
            PolicyBinds::SetAndIds(accessor_ids, resource_type, resource_ids),
        )
        .await
    }

    async fn find_type_policies(
        &self,
        accessor_ids: &[String],
        resource_type: &str,
    ) -> StoreResult<Vec<Policy>> {
        let sql = format!(
            "SELECT {POLICY_COLUMNS} FROM policies \
             WHERE accessor_id = ANY($1) AND resource_type = $2"
        );
        self.fetch_policies(&sql, PolicyBinds::Set(accessor_ids, resource_type))
            .await
    }

    async fn delete_accessor_policies(&self, accessor_id: &str) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM policies WHERE accessor_id = $1")
            .bind(accessor_id)
            .execute(&self.pool)
            .await?;
        self.refresh_counts().await?;
        Ok(result.rows_affected())
    }

    async fn delete_resource_policies(
        &self,
        resource_type: &str,
        resource_id: &str,
    ) -> StoreResult<u64> {
        let result =
            sqlx::query("DELETE FROM policies WHERE resource_type = $1 AND resource_id = $2")
                .bind(resource_type)
                .bind(resource_id)
                .execute(&self.pool)
                .await?;
        self.refresh_counts().await?;
        Ok(result.rows_affected())
    }

    async fn delete_expired_policies(&self, now_micros: i64) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM policies WHERE end_time <> -1 AND end_time < $1")
            .bind(now_micros)
            .execute(&self.pool)
            .await?;
        self.refresh_counts().await?;
        Ok(result.rows_affected())
    }

    async fn rename_policy_accessor(&self, accessor_id: &str, name: &str) -> StoreResult<u64> {
        let result = sqlx::query("UPDATE policies SET accessor_name = $2 WHERE accessor_id = $1")
            .bind(accessor_id)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn rename_policy_resource(
        &self,
        resource_type: &str,
        resource_id: &str,
        name: &str,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE policies SET resource_name = $3 WHERE resource_type = $1 AND resource_id = $2",
        )
        .bind(resource_type)
        .bind(resource_id)
        .bind(name)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl RoleStore for PostgresStore {
    async fn create_role(&self, role: Role) -> StoreResult<Role> {
        sqlx::query(
            r#"INSERT INTO roles (id, name, description, source, resource_type_scope)
               VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(&role.id)
        .bind(&role.name)
        .bind(&role.description)
        .bind(role.source.as_str())
        .bind(serde_json::to_value(&role.resource_type_scope)?)
        .execute(&self.pool)
        .await?;
        Ok(role)
    }

    async fn get_role(&self, id: &str) -> StoreResult<Role> {
        let row = sqlx::query_as::<_, DbRole>(
            "SELECT id, name, description, source, resource_type_scope FROM roles WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => role_from_db(row),
            None => Err(StoreError::NotFound(format!("role {id}"))),
        }
    }

    async fn get_roles(&self, ids: &[String]) -> StoreResult<Vec<Role>> {
        let rows = sqlx::query_as::<_, DbRole>(
            "SELECT id, name, description, source, resource_type_scope FROM roles \
             WHERE id = ANY($1) ORDER BY id",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(role_from_db).collect()
    }

    async fn list_roles(&self) -> StoreResult<Vec<Role>> {
        let rows = sqlx::query_as::<_, DbRole>(
            "SELECT id, name, description, source, resource_type_scope FROM roles ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(role_from_db).collect()
    }

    async fn update_role(&self, role: Role) -> StoreResult<Role> {
        let result = sqlx::query(
            r#"UPDATE roles SET name = $2, description = $3, source = $4, resource_type_scope = $5
               WHERE id = $1"#,
        )
        .bind(&role.id)
        .bind(&role.name)
        .bind(&role.description)
        .bind(role.source.as_str())
        .bind(serde_json::to_value(&role.resource_type_scope)?)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("role {}", role.id)));
        }
        Ok(role)
    }

    async fn delete_role(&self, id: &str) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        let removed = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if removed.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("role {id}")));
        }
        sqlx::query("DELETE FROM policies WHERE accessor_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        self.refresh_counts().await
    }

    async fn add_role_members(
        &self,
        role_id: &str,
        members: Vec<AccessorInfo>,
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM roles WHERE id = $1)")
            .bind(role_id)
            .fetch_one(&mut *tx)
            .await?;
        if !exists {
            return Err(StoreError::NotFound(format!("role {role_id}")));
        }
        for member in &members {
            sqlx::query(
                r#"INSERT INTO role_members (role_id, accessor_id, accessor_type, accessor_name)
                   VALUES ($1, $2, $3, $4)
                   ON CONFLICT (role_id, accessor_id)
                   DO UPDATE SET accessor_type = EXCLUDED.accessor_type,
                                 accessor_name = EXCLUDED.accessor_name"#,
            )
            .bind(role_id)
            .bind(&member.id)
            .bind(member.accessor_type.as_str())
            .bind(&member.name)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn remove_role_members(
        &self,
        role_id: &str,
        accessor_ids: &[String],
    ) -> StoreResult<u64> {
        let result =
            sqlx::query("DELETE FROM role_members WHERE role_id = $1 AND accessor_id = ANY($2)")
                .bind(role_id)
                .bind(accessor_ids)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    async fn list_role_members(&self, role_id: &str) -> StoreResult<Vec<RoleMember>> {
        let rows = sqlx::query_as::<_, DbRoleMember>(
            "SELECT role_id, accessor_id, accessor_type, accessor_name FROM role_members \
             WHERE role_id = $1 ORDER BY accessor_id",
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(member_from_db).collect()
    }

    async fn roles_of_accessors(&self, accessor_ids: &[String]) -> StoreResult<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT role_id FROM role_members \
             WHERE accessor_id = ANY($1) ORDER BY role_id",
        )
        .bind(accessor_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn delete_accessor_memberships(&self, accessor_id: &str) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM role_members WHERE accessor_id = $1")
            .bind(accessor_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn rename_member_accessor(&self, accessor_id: &str, name: &str) -> StoreResult<u64> {
        let result =
            sqlx::query("UPDATE role_members SET accessor_name = $2 WHERE accessor_id = $1")
                .bind(accessor_id)
                .bind(name)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl RegistryStore for PostgresStore {
    async fn upsert_resource_type(&self, resource_type: ResourceType) -> StoreResult<ResourceType> {
        sqlx::query(
            r#"INSERT INTO resource_types
                   (id, name, description, instance_url, data_struct, hidden, operations)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               ON CONFLICT (id) DO UPDATE SET
                   name = EXCLUDED.name,
                   description = EXCLUDED.description,
                   instance_url = EXCLUDED.instance_url,
                   data_struct = EXCLUDED.data_struct,
                   hidden = EXCLUDED.hidden,
                   operations = EXCLUDED.operations"#,
        )
        .bind(&resource_type.id)
        .bind(&resource_type.name)
        .bind(&resource_type.description)
        .bind(&resource_type.instance_url)
        .bind(&resource_type.data_struct)
        .bind(resource_type.hidden)
        .bind(serde_json::to_value(&resource_type.operations)?)
        .execute(&self.pool)
        .await?;
        Ok(resource_type)
    }

    async fn get_resource_type(&self, id: &str) -> StoreResult<ResourceType> {
        let row = sqlx::query_as::<_, DbResourceType>(
            "SELECT id, name, description, instance_url, data_struct, hidden, operations \
             FROM resource_types WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => resource_type_from_db(row),
            None => Err(StoreError::NotFound(format!("resource type {id}"))),
        }
    }

    async fn list_resource_types(&self) -> StoreResult<Vec<ResourceType>> {
        let rows = sqlx::query_as::<_, DbResourceType>(
            "SELECT id, name, description, instance_url, data_struct, hidden, operations \
             FROM resource_types ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(resource_type_from_db).collect()
    }

    async fn delete_resource_type(&self, id: &str) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        let removed = sqlx::query("DELETE FROM resource_types WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if removed.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("resource type {id}")));
        }
        sqlx::query("DELETE FROM policies WHERE resource_type = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        self.refresh_counts().await
    }

    async fn upsert_obligation_type(
        &self,
        obligation_type: ObligationType,
    ) -> StoreResult<ObligationType> {
        sqlx::query(
            r#"INSERT INTO obligation_types
                   (id, name, description, schema, default_value, ui_schema, applicable)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               ON CONFLICT (id) DO UPDATE SET
                   name = EXCLUDED.name,
                   description = EXCLUDED.description,
                   schema = EXCLUDED.schema,
                   default_value = EXCLUDED.default_value,
                   ui_schema = EXCLUDED.ui_schema,
                   applicable = EXCLUDED.applicable"#,
        )
        .bind(&obligation_type.id)
        .bind(&obligation_type.name)
        .bind(&obligation_type.description)
        .bind(&obligation_type.schema)
        .bind(&obligation_type.default_value)
        .bind(&obligation_type.ui_schema)
        .bind(serde_json::to_value(&obligation_type.applicable)?)
        .execute(&self.pool)
        .await?;
        Ok(obligation_type)
    }

    async fn get_obligation_type(&self, id: &str) -> StoreResult<ObligationType> {
        let row = sqlx::query_as::<_, DbObligationType>(
            "SELECT id, name, description, schema, default_value, ui_schema, applicable \
             FROM obligation_types WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => obligation_type_from_db(row),
            None => Err(StoreError::NotFound(format!("obligation type {id}"))),
        }
    }

    async fn list_obligation_types(&self) -> StoreResult<Vec<ObligationType>> {
        let rows = sqlx::query_as::<_, DbObligationType>(
            "SELECT id, name, description, schema, default_value, ui_schema, applicable \
             FROM obligation_types ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(obligation_type_from_db).collect()
    }

    async fn delete_obligation_type(&self, id: &str) -> StoreResult<()> {
        let removed = sqlx::query("DELETE FROM obligation_types WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if removed.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("obligation type {id}")));
        }
        Ok(())
    }

    async fn create_obligation(&self, obligation: Obligation) -> StoreResult<Obligation> {
        sqlx::query(
            r#"INSERT INTO obligations (id, type_id, name, description, value)
               VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(&obligation.id)
        .bind(&obligation.type_id)
        .bind(&obligation.name)
        .bind(&obligation.description)
        .bind(&obligation.value)
        .execute(&self.pool)
        .await?;
        Ok(obligation)
    }

    async fn get_obligation(&self, id: &str) -> StoreResult<Obligation> {
        let row = sqlx::query_as::<_, DbObligation>(
            "SELECT id, type_id, name, description, value FROM obligations WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => Ok(obligation_from_db(row)),
            None => Err(StoreError::NotFound(format!("obligation {id}"))),
        }
    }

    async fn list_obligations(&self, type_id: Option<&str>) -> StoreResult<Vec<Obligation>> {
        let rows = sqlx::query_as::<_, DbObligation>(
            "SELECT id, type_id, name, description, value FROM obligations \
             WHERE $1::text IS NULL OR type_id = $1 ORDER BY id",
        )
        .bind(type_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(obligation_from_db).collect())
    }

    async fn delete_obligation(&self, id: &str) -> StoreResult<()> {
        let removed = sqlx::query("DELETE FROM obligations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if removed.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("obligation {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl AuthorizationStore for PostgresStore {
    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn is_durable(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

fn parse_accessor_type(value: &str) -> StoreResult<AccessorType> {
    AccessorType::from_str(value).map_err(|err| StoreError::Unexpected(err.into()))
}

fn policy_from_db(row: DbPolicy) -> StoreResult<Policy> {
    let accessor_type = parse_accessor_type(&row.accessor_type)?;
    Ok(Policy {
        id: row.id,
        accessor: AccessorInfo {
            id: row.accessor_id,
            accessor_type,
            name: row.accessor_name,
        },
        resource: ResourceInfo {
            id: row.resource_id,
            resource_type: row.resource_type,
            name: row.resource_name,
        },
        operation: serde_json::from_value(row.operation)?,
        condition: Condition(row.condition),
        end_time: row.end_time,
        created_at: row.created_at,
        modified_at: row.modified_at,
    })
}

fn role_from_db(row: DbRole) -> StoreResult<Role> {
    Ok(Role {
        id: row.id,
        name: row.name,
        description: row.description,
        source: row
            .source
            .parse()
            .map_err(|err: String| StoreError::Unexpected(anyhow::anyhow!(err)))?,
        resource_type_scope: serde_json::from_value(row.resource_type_scope)?,
    })
}

fn member_from_db(row: DbRoleMember) -> StoreResult<RoleMember> {
    Ok(RoleMember {
        role_id: row.role_id,
        accessor: AccessorInfo {
            id: row.accessor_id,
            accessor_type: parse_accessor_type(&row.accessor_type)?,
            name: row.accessor_name,
        },
    })
}

fn resource_type_from_db(row: DbResourceType) -> StoreResult<ResourceType> {
    Ok(ResourceType {
        id: row.id,
        name: row.name,
        description: row.description,
        instance_url: row.instance_url,
        data_struct: row.data_struct,
        hidden: row.hidden,
        operations: serde_json::from_value(row.operations)?,
    })
}

fn obligation_type_from_db(row: DbObligationType) -> StoreResult<ObligationType> {
    Ok(ObligationType {
        id: row.id,
        name: row.name,
        description: row.description,
        schema: row.schema,
        default_value: row.default_value,
        ui_schema: row.ui_schema,
        applicable: serde_json::from_value(row.applicable)?,
    })
}

fn obligation_from_db(row: DbObligation) -> Obligation {
    Obligation {
        id: row.id,
        type_id: row.type_id,
        name: row.name,
        description: row.description,
        value: row.value,
    }
}
