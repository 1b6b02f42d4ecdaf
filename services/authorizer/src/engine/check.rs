use super::evaluate::evaluate;
use super::{
    CheckRequest, CheckResult, DecisionEngine, record_decision, require_operations,
    wants_obligations,
};
use crate::error::ServiceResult;
use warden_authz::TYPE_WILDCARD;

impl DecisionEngine {
    /// Whether the accessor may perform every requested operation on one resource.
    pub async fn check(&self, request: &CheckRequest) -> ServiceResult<CheckResult> {
        require_operations(&request.operations)?;
        record_decision("check");
        let ctx = self.context(&request.accessor).await?;
        let resource = &request.resource;

        let Some(resource_type) = self.resource_types.get(&resource.resource_type).await? else {
            tracing::debug!(
                resource_type = %resource.resource_type,
                "check against unknown resource type"
            );
            return Ok(CheckResult {
                allowed: false,
                operation_obligations: None,
            });
        };

        let mut resource_ids = vec![resource.id.clone()];
        if resource.id != TYPE_WILDCARD {
            resource_ids.push(TYPE_WILDCARD.to_string());
        }
        let policies = self
            .store
            .find_policies(&ctx.identity.accessor_ids, &resource_type.id, &resource_ids)
            .await?;
        let decision = evaluate(
            Some(&resource_type),
            &policies,
            ctx.scope.as_ref(),
            ctx.now_micros,
        );
        let allowed = decision.allows_all(&request.operations);
        tracing::debug!(
            accessor_id = %request.accessor.id,
            resource_type = %resource_type.id,
            resource_id = %resource.id,
            policies = policies.len(),
            allowed,
            "operation check"
        );

        let operation_obligations = if wants_obligations(&request.include) {
            Some(
                self.obligations_for(&resource_type.id, &decision, &request.operations)
                    .await?,
            )
        } else {
            None
        };
        Ok(CheckResult {
            allowed,
            operation_obligations,
        })
    }
}
