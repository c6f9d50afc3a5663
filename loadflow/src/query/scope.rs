use crate::auth::{effective_view_rule, ResolvedActor, ViewRule};
use crate::core::{ArmazemId, ClienteId};
use crate::store::RecordFilter;

/// The set of records an actor may list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityScope {
    /// Every record.
    All,
    /// One warehouse's records.
    Warehouse(ArmazemId),
    /// One customer's records.
    Customer(ClienteId),
    /// No records; the store must not be queried.
    Nothing,
}

impl VisibilityScope {
    /// Derives the scope from the actor's strongest view rule and bindings.
    #[must_use]
    pub fn for_actor(actor: &ResolvedActor) -> Self {
        match effective_view_rule(actor) {
            ViewRule::All => Self::All,
            ViewRule::OwnCustomer => actor.cliente_id().map_or(Self::Nothing, Self::Customer),
            ViewRule::OwnWarehouse => actor.armazem_id().map_or(Self::Nothing, Self::Warehouse),
            ViewRule::None => Self::Nothing,
        }
    }

    /// The server-side filter, or `None` when nothing is visible.
    #[must_use]
    pub const fn filter(self) -> Option<RecordFilter> {
        match self {
            Self::All => Some(RecordFilter::All),
            Self::Warehouse(id) => Some(RecordFilter::Warehouse(id)),
            Self::Customer(id) => Some(RecordFilter::Customer(id)),
            Self::Nothing => None,
        }
    }
}
