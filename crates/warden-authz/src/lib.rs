//! Warden authorization primitives shared by the decision service.
//!
//! # Purpose
//! Centralizes the pure, synchronous parts of the authorization model: accessor
//! kinds, operation scope, resource-type scope math, deny-overrides grant
//! accumulation, policy expiry and the error categories used for retry decisions.
//!
//! # How it fits
//! The `authorizer` service loads policies, roles and registries from storage and
//! feeds them through these helpers. Nothing here performs I/O.
//!
//! # Key invariants
//! - A deny recorded for an operation always wins over any allow.
//! - Role scope can only narrow an allow decision, never produce one.
//! - `end_time == -1` means a policy never expires.
//!
//! # Examples
//! ```rust
//! use warden_authz::{GrantAccumulator, ResourceTypeScope};
//!
//! let mut grants = GrantAccumulator::default();
//! grants.allow("read");
//! grants.allow("write");
//! grants.deny("write");
//! assert!(grants.is_allowed("read"));
//! assert!(!grants.is_allowed("write"));
//!
//! let scope = ResourceTypeScope::of_types(["doc"]);
//! assert!(scope.permits("doc", "read"));
//! assert!(!scope.permits("folder", "read"));
//! ```

mod accessor;
mod decision;
mod errors;
mod expiry;
mod operation;
mod scope;

pub use accessor::AccessorType;
pub use decision::GrantAccumulator;
pub use errors::{AuthzError, AuthzResult, Categorized, ErrorCategory};
pub use expiry::{NEVER_EXPIRES, is_expired, validate_end_time};
pub use operation::{OperationScope, TYPE_WILDCARD, is_type_level};
pub use scope::{OperationsScope, ResourceTypeScope, ScopedResourceType};
