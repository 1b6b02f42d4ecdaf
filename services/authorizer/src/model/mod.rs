//! Authorization data model.
//!
//! # Purpose
//! Re-exports the resource-type, policy, role, and obligation records shared by
//! the stores, the decision engine, and the HTTP adapter.
mod accessor;
mod obligation;
mod policy;
mod resource_type;
mod role;

pub use accessor::{AccessorInfo, ResourceInfo};
pub use obligation::{NewObligation, Obligation, ObligationType, ResolvedObligation};
pub use policy::{
    Condition, NewPolicy, ObligationRef, ObligationRefError, ObligationSource, Policy, PolicyItem,
    PolicyOperation, PolicyPatch,
};
pub use resource_type::{LocalizedName, Operation, ResourceType};
pub use role::{NewRole, Role, RoleMember, RolePatch, RoleSource};
