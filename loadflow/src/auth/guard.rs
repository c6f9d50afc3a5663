//! Capability predicates over resolved actors.
//!
//! Every predicate takes a [`ResolvedActor`], so none of them can be
//! evaluated while the ownership lookup is still pending. Absent links deny.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::permissions::{Action, PermissionMatrix, RESOURCE_CUSTOMERS};
use super::{ResolvedActor, Role};
use crate::core::LoadingRecord;

/// Which records a single role can see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ViewRule {
    /// Nothing.
    None,
    /// Records of the linked warehouse.
    OwnWarehouse,
    /// Records of the linked customer.
    OwnCustomer,
    /// Every record.
    All,
}

/// The view rule granted by one role.
#[must_use]
pub const fn view_rule(role: Role) -> ViewRule {
    match role {
        Role::Admin | Role::Logistica => ViewRule::All,
        Role::Cliente => ViewRule::OwnCustomer,
        Role::Armazem => ViewRule::OwnWarehouse,
        Role::Comercial => ViewRule::None,
    }
}

/// The strongest view rule across the actor's roles.
///
/// Ordering follows the precedence of the checks: staff access first, then
/// customer ownership, then warehouse ownership.
#[must_use]
pub fn effective_view_rule(actor: &ResolvedActor) -> ViewRule {
    actor
        .actor()
        .roles
        .iter()
        .map(view_rule)
        .max()
        .unwrap_or(ViewRule::None)
}

/// Returns true if the actor may see `record`.
#[must_use]
pub fn can_view_record(actor: &ResolvedActor, record: &LoadingRecord) -> bool {
    match effective_view_rule(actor) {
        ViewRule::All => true,
        ViewRule::OwnCustomer => actor.cliente_id() == Some(record.cliente_id()),
        ViewRule::OwnWarehouse => actor.armazem_id() == Some(record.armazem_id()),
        ViewRule::None => false,
    }
}

/// Why an advance was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// The actor does not hold the warehouse role.
    NotWarehouseOperator,
    /// The actor holds the role but has no linked warehouse.
    NoWarehouseBinding,
    /// The actor's warehouse differs from the record's.
    WarehouseMismatch,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotWarehouseOperator => write!(f, "only warehouse operators may advance a loading"),
            Self::NoWarehouseBinding => write!(f, "actor is not linked to any warehouse"),
            Self::WarehouseMismatch => write!(f, "loading belongs to another warehouse"),
        }
    }
}

/// Outcome of the advance check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceDecision {
    /// The actor may advance the record.
    Allowed,
    /// The actor may never advance this record.
    Denied(DenyReason),
    /// The actor owns the record but it is finalized.
    Terminal,
}

/// Decides whether the actor may advance `record` and why not.
///
/// Only the warehouse role may advance, and only on its own warehouse's
/// records. This rule is independent of the permission matrix.
#[must_use]
pub fn advance_decision(actor: &ResolvedActor, record: &LoadingRecord) -> AdvanceDecision {
    if !actor.actor().roles.iter().any(may_advance) {
        return AdvanceDecision::Denied(DenyReason::NotWarehouseOperator);
    }
    match actor.armazem_id() {
        None => AdvanceDecision::Denied(DenyReason::NoWarehouseBinding),
        Some(id) if id != record.armazem_id() => AdvanceDecision::Denied(DenyReason::WarehouseMismatch),
        Some(_) if record.is_terminal() => AdvanceDecision::Terminal,
        Some(_) => AdvanceDecision::Allowed,
    }
}

const fn may_advance(role: Role) -> bool {
    match role {
        Role::Armazem => true,
        Role::Admin | Role::Logistica | Role::Cliente | Role::Comercial => false,
    }
}

/// Returns true iff the actor may advance `record` right now.
#[must_use]
pub fn can_advance_stage(actor: &ResolvedActor, record: &LoadingRecord) -> bool {
    advance_decision(actor, record) == AdvanceDecision::Allowed
}

/// General matrix check.
///
/// Staff roles always read the customer directory regardless of the matrix.
#[must_use]
pub fn can_access_resource(actor: &ResolvedActor, matrix: &PermissionMatrix, resource: &str, action: Action) -> bool {
    let staff_override = action == Action::Read
        && resource == RESOURCE_CUSTOMERS
        && (actor.has_role(Role::Admin) || actor.has_role(Role::Logistica));

    staff_override || matrix.allows_any(&actor.actor().roles, resource, action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::permissions::{ResourcePermissions, RESOURCE_LOADINGS};
    use crate::auth::{Actor, OwnershipBinding, RoleSet};
    use crate::core::{ArmazemId, ClienteId};
    use crate::testing::fixtures;
    use uuid::Uuid;

    fn resolved(roles: &[Role], binding: OwnershipBinding) -> ResolvedActor {
        let roles: RoleSet = roles.iter().copied().collect();
        ResolvedActor::new(Actor::new(Uuid::new_v4(), roles), binding)
    }

    #[test]
    fn test_staff_see_everything() {
        let record = fixtures::record_at(1);
        for role in [Role::Admin, Role::Logistica] {
            assert!(can_view_record(&resolved(&[role], OwnershipBinding::none()), &record));
        }
    }

    #[test]
    fn test_customer_sees_only_own_records() {
        let record = fixtures::record_at(2);
        let owner = resolved(&[Role::Cliente], OwnershipBinding::customer(record.cliente_id()));
        let other = resolved(&[Role::Cliente], OwnershipBinding::customer(ClienteId::new_v4()));
        let unlinked = resolved(&[Role::Cliente], OwnershipBinding::none());

        assert!(can_view_record(&owner, &record));
        assert!(!can_view_record(&other, &record));
        assert!(!can_view_record(&unlinked, &record));
    }

    #[test]
    fn test_comercial_sees_nothing() {
        let record = fixtures::record_at(1);
        assert!(!can_view_record(&resolved(&[Role::Comercial], OwnershipBinding::none()), &record));
    }

    #[test]
    fn test_customer_rule_takes_precedence_over_warehouse() {
        let record = fixtures::record_at(1);
        let binding = OwnershipBinding {
            armazem_id: Some(record.armazem_id()),
            cliente_id: Some(ClienteId::new_v4()),
        };
        let actor = resolved(&[Role::Armazem, Role::Cliente], binding);
        assert_eq!(effective_view_rule(&actor), ViewRule::OwnCustomer);
        assert!(!can_view_record(&actor, &record));
    }

    #[test]
    fn test_only_owning_warehouse_advances() {
        let record = fixtures::record_at(3);
        let owner = resolved(&[Role::Armazem], OwnershipBinding::warehouse(record.armazem_id()));
        let other = resolved(&[Role::Armazem], OwnershipBinding::warehouse(ArmazemId::new_v4()));

        assert_eq!(advance_decision(&owner, &record), AdvanceDecision::Allowed);
        assert_eq!(
            advance_decision(&other, &record),
            AdvanceDecision::Denied(DenyReason::WarehouseMismatch)
        );
    }

    #[test]
    fn test_staff_never_advance() {
        let record = fixtures::record_at(1);
        for role in [Role::Admin, Role::Logistica, Role::Cliente, Role::Comercial] {
            let actor = resolved(&[role], OwnershipBinding::none());
            assert_eq!(
                advance_decision(&actor, &record),
                AdvanceDecision::Denied(DenyReason::NotWarehouseOperator)
            );
        }
    }

    #[test]
    fn test_unlinked_warehouse_operator_denied() {
        let record = fixtures::record_at(1);
        let actor = resolved(&[Role::Armazem], OwnershipBinding::none());
        assert_eq!(
            advance_decision(&actor, &record),
            AdvanceDecision::Denied(DenyReason::NoWarehouseBinding)
        );
    }

    #[test]
    fn test_owner_on_finalized_record_is_terminal() {
        let record = fixtures::record_at(6);
        let owner = resolved(&[Role::Armazem], OwnershipBinding::warehouse(record.armazem_id()));
        assert_eq!(advance_decision(&owner, &record), AdvanceDecision::Terminal);
        assert!(!can_advance_stage(&owner, &record));
    }

    #[test]
    fn test_staff_read_customers_without_matrix() {
        let matrix = PermissionMatrix::new();
        let admin = resolved(&[Role::Admin], OwnershipBinding::none());
        let comercial = resolved(&[Role::Comercial], OwnershipBinding::none());

        assert!(can_access_resource(&admin, &matrix, RESOURCE_CUSTOMERS, Action::Read));
        assert!(!can_access_resource(&admin, &matrix, RESOURCE_CUSTOMERS, Action::Update));
        assert!(!can_access_resource(&comercial, &matrix, RESOURCE_CUSTOMERS, Action::Read));
    }

    #[test]
    fn test_matrix_grants_listing() {
        let matrix = PermissionMatrix::new().grant(Role::Cliente, RESOURCE_LOADINGS, ResourcePermissions::read_only());
        let cliente = resolved(&[Role::Cliente], OwnershipBinding::none());
        assert!(can_access_resource(&cliente, &matrix, RESOURCE_LOADINGS, Action::Read));
        assert!(!can_access_resource(&cliente, &matrix, RESOURCE_LOADINGS, Action::Create));
    }
}
