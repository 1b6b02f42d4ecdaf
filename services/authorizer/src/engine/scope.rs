use crate::model::PolicyOperation;
use crate::registry::RoleRegistry;
use crate::store::StoreResult;
use warden_authz::ResourceTypeScope;

/// Union of the resource-type scopes of `role_ids`.
///
/// `None` means the accessor holds no (known) roles and is not narrowed at all.
pub async fn effective_scope(
    roles: &RoleRegistry,
    role_ids: &[String],
) -> StoreResult<Option<ResourceTypeScope>> {
    if role_ids.is_empty() {
        return Ok(None);
    }
    let held = roles.get_many(role_ids).await?;
    Ok(ResourceTypeScope::union(
        held.iter().map(|role| &role.resource_type_scope),
    ))
}

/// First allowed operation in `operation` that `scope` does not permit on
/// `resource_type`. Denies are always within scope.
pub fn first_unscoped_allow<'a>(
    scope: &ResourceTypeScope,
    resource_type: &str,
    operation: &'a PolicyOperation,
) -> Option<&'a str> {
    operation
        .allow
        .iter()
        .map(|item| item.id.as_str())
        .find(|op| !scope.permits(resource_type, op))
}
