//! Ownership bindings: the 1:1 link from a user to a warehouse or customer.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;
use uuid::Uuid;

use super::{Actor, Role};
use crate::core::{ArmazemId, ClienteId};
use crate::errors::{LoadflowError, Result, StoreError};

/// Lookup of the warehouse/customer rows linked to a user.
///
/// Rows are created by the external account-provisioning flows; this crate
/// only reads them.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OwnershipDirectory: Send + Sync {
    /// Warehouse linked to `user_id`, if any.
    async fn warehouse_for_user(&self, user_id: Uuid) -> std::result::Result<Option<ArmazemId>, StoreError>;

    /// Customer linked to `user_id`, if any.
    async fn customer_for_user(&self, user_id: Uuid) -> std::result::Result<Option<ClienteId>, StoreError>;
}

/// Resolved ownership of an actor.
///
/// A `None` id means the link is absent (or the role was not held); either
/// way the actor owns nothing through it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipBinding {
    /// Linked warehouse.
    pub armazem_id: Option<ArmazemId>,
    /// Linked customer.
    pub cliente_id: Option<ClienteId>,
}

impl OwnershipBinding {
    /// A binding with no links.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            armazem_id: None,
            cliente_id: None,
        }
    }

    /// A binding to a warehouse.
    #[must_use]
    pub const fn warehouse(id: ArmazemId) -> Self {
        Self {
            armazem_id: Some(id),
            cliente_id: None,
        }
    }

    /// A binding to a customer.
    #[must_use]
    pub const fn customer(id: ClienteId) -> Self {
        Self {
            armazem_id: None,
            cliente_id: Some(id),
        }
    }

    /// Returns true if no link was found.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.armazem_id.is_none() && self.cliente_id.is_none()
    }
}

/// Ownership resolution state held by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipState {
    /// The lookup has not completed.
    Unresolved,
    /// The lookup completed.
    Resolved(OwnershipBinding),
}

impl OwnershipState {
    /// Returns true while the lookup has not completed.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Unresolved)
    }
}

/// Looks up the links relevant to the actor's roles.
///
/// Only roles that carry ownership trigger a lookup.
pub async fn resolve_ownership(directory: &dyn OwnershipDirectory, actor: &Actor) -> Result<OwnershipBinding> {
    let mut binding = OwnershipBinding::none();

    if actor.has_role(Role::Armazem) {
        binding.armazem_id = directory
            .warehouse_for_user(actor.id)
            .await
            .map_err(|err| LoadflowError::from_store(None, err))?;
    }
    if actor.has_role(Role::Cliente) {
        binding.cliente_id = directory
            .customer_for_user(actor.id)
            .await
            .map_err(|err| LoadflowError::from_store(None, err))?;
    }

    debug!(
        actor_id = %actor.id,
        armazem_id = ?binding.armazem_id,
        cliente_id = ?binding.cliente_id,
        "Resolved ownership binding"
    );
    Ok(binding)
}

/// In-memory ownership directory.
#[derive(Debug, Default)]
pub struct InMemoryOwnershipDirectory {
    warehouses: RwLock<HashMap<Uuid, ArmazemId>>,
    customers: RwLock<HashMap<Uuid, ClienteId>>,
    lookups: AtomicUsize,
}

impl InMemoryOwnershipDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Links a user to a warehouse.
    pub fn link_warehouse(&self, user_id: Uuid, armazem_id: ArmazemId) {
        self.warehouses.write().insert(user_id, armazem_id);
    }

    /// Links a user to a customer.
    pub fn link_customer(&self, user_id: Uuid, cliente_id: ClienteId) {
        self.customers.write().insert(user_id, cliente_id);
    }

    /// Number of lookups served.
    #[must_use]
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OwnershipDirectory for InMemoryOwnershipDirectory {
    async fn warehouse_for_user(&self, user_id: Uuid) -> std::result::Result<Option<ArmazemId>, StoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.warehouses.read().get(&user_id).copied())
    }

    async fn customer_for_user(&self, user_id: Uuid) -> std::result::Result<Option<ClienteId>, StoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.customers.read().get(&user_id).copied())
    }
}
