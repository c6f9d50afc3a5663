//! Role- and ownership-scoped authorization.
//!
//! This module provides:
//! - [`Role`] and [`RoleSet`]: the closed role enum
//! - [`OwnershipDirectory`]: lookup of warehouse/customer links
//! - [`PermissionMatrix`]: role to resource CRUD flags
//! - Guard predicates over [`ResolvedActor`]
//! - [`AuthorizationContext`]: per-session caches with single-flight resolution

mod actor;
mod context;
pub mod guard;
pub mod ownership;
pub mod permissions;
mod role;

pub use actor::{Actor, ResolvedActor};
pub use context::AuthorizationContext;
pub use guard::{
    advance_decision, can_access_resource, can_advance_stage, can_view_record, effective_view_rule, view_rule,
    AdvanceDecision, DenyReason, ViewRule,
};
pub use ownership::{
    resolve_ownership, InMemoryOwnershipDirectory, OwnershipBinding, OwnershipDirectory, OwnershipState,
};
pub use permissions::{
    Action, PermissionMatrix, PermissionRow, PermissionSource, ResourcePermissions, StaticPermissionSource,
    RESOURCE_CUSTOMERS, RESOURCE_LOADINGS,
};
pub use role::{Role, RoleSet, UnknownRole};
