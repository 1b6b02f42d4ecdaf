use super::evaluate::{evaluate, partition_by_resource};
use super::{
    DecisionEngine, ResourceGrant, ResourceListRequest, ResourceTypeGrant,
    ResourceTypeOperationRequest, record_decision, require_operations, wants_obligations,
};
use crate::error::ServiceResult;
use crate::model::ResourceInfo;
use warden_authz::TYPE_WILDCARD;

impl DecisionEngine {
    /// Instances of a type on which every requested operation is allowed.
    ///
    /// Only resources named by a live instance policy of the identity set are
    /// candidates; type-level policies then contribute to each candidate's
    /// decision. Sorted by resource ID.
    pub async fn resource_list(
        &self,
        request: &ResourceListRequest,
    ) -> ServiceResult<Vec<ResourceGrant>> {
        require_operations(&request.operations)?;
        record_decision("resource_list");
        let ctx = self.context(&request.accessor).await?;
        let Some(resource_type) = self.resource_types.get(&request.resource_type).await? else {
            return Ok(Vec::new());
        };

        let policies = self
            .store
            .find_type_policies(&ctx.identity.accessor_ids, &resource_type.id)
            .await?;
        let (type_level, by_instance) = partition_by_resource(&policies);

        let mut grants = Vec::new();
        for (resource_id, instance) in by_instance {
            if instance.iter().all(|policy| policy.is_expired(ctx.now_micros)) {
                continue;
            }
            let decision = evaluate(
                Some(&resource_type),
                type_level.iter().chain(instance.iter()).copied(),
                ctx.scope.as_ref(),
                ctx.now_micros,
            );
            if !decision.allows_all(&request.operations) {
                continue;
            }
            let mut resource = ResourceInfo::new(&resource_type.id, resource_id);
            resource.name = instance
                .iter()
                .find_map(|policy| policy.resource.name.clone());
            let operation_obligations = if wants_obligations(&request.include) {
                Some(
                    self.obligations_for(&resource_type.id, &decision, &request.operations)
                        .await?,
                )
            } else {
                None
            };
            grants.push(ResourceGrant {
                resource,
                allowed_operations: None,
                operation_obligations,
            });
        }
        tracing::debug!(
            accessor_id = %request.accessor.id,
            resource_type = %resource_type.id,
            listed = grants.len(),
            "resource list"
        );
        Ok(grants)
    }

    /// Operations granted on each whole resource type, from type-level
    /// policies only.
    pub async fn resource_type_operations(
        &self,
        request: &ResourceTypeOperationRequest,
    ) -> ServiceResult<Vec<ResourceTypeGrant>> {
        record_decision("resource_type_operation");
        let ctx = self.context(&request.accessor).await?;
        let wildcard = [TYPE_WILDCARD.to_string()];

        let mut grants = Vec::with_capacity(request.resource_types.len());
        for type_id in &request.resource_types {
            let operations = match self.resource_types.get(type_id).await? {
                Some(resource_type) => {
                    let policies = self
                        .store
                        .find_policies(&ctx.identity.accessor_ids, type_id, &wildcard)
                        .await?;
                    evaluate(
                        Some(&resource_type),
                        &policies,
                        ctx.scope.as_ref(),
                        ctx.now_micros,
                    )
                    .allowed()
                }
                None => Vec::new(),
            };
            grants.push(ResourceTypeGrant {
                resource_type: type_id.clone(),
                operations,
            });
        }
        Ok(grants)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{NOW, fixture};
    use super::super::{ResourceListRequest, ResourceTypeOperationRequest};
    use crate::directory::StaticDirectory;
    use crate::model::{AccessorInfo, NewPolicy, Policy, PolicyOperation, ResourceInfo};
    use crate::store::PolicyStore;
    use warden_authz::{AccessorType, NEVER_EXPIRES};

    fn policy(
        id: &str,
        accessor: AccessorInfo,
        resource_id: &str,
        operation: PolicyOperation,
    ) -> Policy {
        let mut resource = ResourceInfo::new("doc", resource_id);
        if resource_id != "*" {
            resource = resource.named(format!("Document {resource_id}"));
        }
        Policy::from_new(
            id.to_string(),
            NewPolicy {
                accessor,
                resource,
                operation,
                condition: Default::default(),
                end_time: NEVER_EXPIRES,
            },
            NOW - 1_000,
        )
    }

    fn org() -> StaticDirectory {
        StaticDirectory::new()
            .with_department("dept1", None)
            .with_user("u1", &["dept1"], &["g1"])
    }

    #[tokio::test]
    async fn lists_instances_sorted_and_combined_with_type_grants() {
        let fx = fixture(org()).await;
        let u1 = AccessorInfo::new("u1", AccessorType::User);
        let g1 = AccessorInfo::new("g1", AccessorType::Group);
        let dept = AccessorInfo::new("dept1", AccessorType::Department);
        let mut expired = policy("p5", u1.clone(), "d5", PolicyOperation::allowing(["read"]));
        expired.end_time = NOW - 1;
        fx.store
            .insert_policies(vec![
                policy("p1", u1.clone(), "d2", PolicyOperation::allowing(["read"])),
                policy("p2", g1, "d1", PolicyOperation::allowing(["download"])),
                policy("p3", dept.clone(), "*", PolicyOperation::allowing(["download"])),
                policy("p4", dept, "d3", PolicyOperation::denying(["read"])),
                expired,
                policy(
                    "p6",
                    AccessorInfo::new("u2", AccessorType::User),
                    "d4",
                    PolicyOperation::allowing(["read"]),
                ),
            ])
            .await
            .expect("insert");

        let request = ResourceListRequest {
            resource_type: "doc".to_string(),
            accessor: u1,
            operations: vec!["download".to_string()],
            include: Vec::new(),
        };
        let grants = fx.engine.resource_list(&request).await.expect("list");
        let ids: Vec<&str> = grants.iter().map(|g| g.resource.id.as_str()).collect();
        assert_eq!(ids, vec!["d1", "d2", "d3"]);
        assert_eq!(grants[0].resource.name.as_deref(), Some("Document d1"));

        let read = ResourceListRequest {
            operations: vec!["read".to_string(), "download".to_string()],
            ..request
        };
        let grants = fx.engine.resource_list(&read).await.expect("list");
        let ids: Vec<&str> = grants.iter().map(|g| g.resource.id.as_str()).collect();
        assert_eq!(ids, vec!["d2"]);
    }

    #[tokio::test]
    async fn unknown_type_lists_nothing() {
        let fx = fixture(org()).await;
        let request = ResourceListRequest {
            resource_type: "spaceship".to_string(),
            accessor: AccessorInfo::new("u1", AccessorType::User),
            operations: vec!["read".to_string()],
            include: Vec::new(),
        };
        assert!(
            fx.engine
                .resource_list(&request)
                .await
                .expect("list")
                .is_empty()
        );
    }

    #[tokio::test]
    async fn type_operations_ignore_instance_policies() {
        let fx = fixture(org()).await;
        let u1 = AccessorInfo::new("u1", AccessorType::User);
        fx.store
            .insert_policies(vec![
                policy("p1", u1.clone(), "*", PolicyOperation::allowing(["create", "read"])),
                policy("p2", u1.clone(), "d1", PolicyOperation::allowing(["delete"])),
                policy(
                    "p3",
                    AccessorInfo::new("dept1", AccessorType::Department),
                    "*",
                    PolicyOperation::denying(["read"]),
                ),
            ])
            .await
            .expect("insert");

        let request = ResourceTypeOperationRequest {
            resource_types: vec!["doc".to_string(), "spaceship".to_string()],
            accessor: u1,
        };
        let grants = fx
            .engine
            .resource_type_operations(&request)
            .await
            .expect("type operations");
        assert_eq!(grants.len(), 2);
        assert_eq!(grants[0].operations, vec!["create".to_string()]);
        assert!(grants[1].operations.is_empty());
    }
}
