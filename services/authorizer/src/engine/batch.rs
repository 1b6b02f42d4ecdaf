use super::evaluate::{ResourceDecision, evaluate, partition_by_resource};
use super::{
    DecisionContext, DecisionEngine, ResourceFilterRequest, ResourceGrant,
    ResourceOperationRequest, record_decision, require_operations, wants_obligations,
};
use crate::error::ServiceResult;
use crate::model::ResourceInfo;
use std::collections::BTreeMap;
use warden_authz::TYPE_WILDCARD;

impl DecisionEngine {
    /// Keep the resources on which every requested operation is allowed.
    /// Survivors keep their input order.
    pub async fn resource_filter(
        &self,
        request: &ResourceFilterRequest,
    ) -> ServiceResult<Vec<ResourceGrant>> {
        require_operations(&request.operations)?;
        record_decision("resource_filter");
        let ctx = self.context(&request.accessor).await?;
        let decisions = self.decide_each(&ctx, &request.resources).await?;

        let mut grants = Vec::new();
        for (resource, decision) in request.resources.iter().zip(decisions) {
            if !decision.allows_all(&request.operations) {
                continue;
            }
            let reported = if request.allow_operation {
                decision.allowed()
            } else {
                request.operations.clone()
            };
            let operation_obligations = if wants_obligations(&request.include) {
                Some(
                    self.obligations_for(&resource.resource_type, &decision, &reported)
                        .await?,
                )
            } else {
                None
            };
            grants.push(ResourceGrant {
                resource: resource.clone(),
                allowed_operations: request.allow_operation.then_some(reported),
                operation_obligations,
            });
        }
        tracing::debug!(
            accessor_id = %request.accessor.id,
            requested = request.resources.len(),
            kept = grants.len(),
            "resource filter"
        );
        Ok(grants)
    }

    /// Every allowed operation for each resource. No resource is dropped.
    pub async fn resource_operations(
        &self,
        request: &ResourceOperationRequest,
    ) -> ServiceResult<Vec<ResourceGrant>> {
        record_decision("resource_operation");
        let ctx = self.context(&request.accessor).await?;
        let decisions = self.decide_each(&ctx, &request.resources).await?;

        let mut grants = Vec::with_capacity(request.resources.len());
        for (resource, decision) in request.resources.iter().zip(decisions) {
            let allowed = decision.allowed();
            let operation_obligations = if wants_obligations(&request.include) {
                Some(
                    self.obligations_for(&resource.resource_type, &decision, &allowed)
                        .await?,
                )
            } else {
                None
            };
            grants.push(ResourceGrant {
                resource: resource.clone(),
                allowed_operations: Some(allowed),
                operation_obligations,
            });
        }
        Ok(grants)
    }

    /// One decision per resource, in input order, with one policy query per
    /// resource type.
    async fn decide_each(
        &self,
        ctx: &DecisionContext,
        resources: &[ResourceInfo],
    ) -> ServiceResult<Vec<ResourceDecision>> {
        let mut by_type: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (position, resource) in resources.iter().enumerate() {
            by_type
                .entry(resource.resource_type.as_str())
                .or_default()
                .push(position);
        }

        let mut decisions: Vec<Option<ResourceDecision>> =
            resources.iter().map(|_| None).collect();
        for (type_id, positions) in by_type {
            let Some(resource_type) = self.resource_types.get(type_id).await? else {
                continue;
            };
            let mut ids: Vec<String> = positions
                .iter()
                .map(|&position| resources[position].id.clone())
                .collect();
            ids.push(TYPE_WILDCARD.to_string());
            ids.sort();
            ids.dedup();

            let policies = self
                .store
                .find_policies(&ctx.identity.accessor_ids, type_id, &ids)
                .await?;
            let (type_level, by_instance) = partition_by_resource(&policies);
            for position in positions {
                let instance = by_instance
                    .get(resources[position].id.as_str())
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                decisions[position] = Some(evaluate(
                    Some(&resource_type),
                    type_level.iter().chain(instance.iter()).copied(),
                    ctx.scope.as_ref(),
                    ctx.now_micros,
                ));
            }
        }
        Ok(decisions.into_iter().map(Option::unwrap_or_default).collect())
    }
}
