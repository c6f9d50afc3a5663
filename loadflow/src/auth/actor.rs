//! Authenticated actors and their resolved form.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{OwnershipBinding, Role, RoleSet};
use crate::core::{ArmazemId, ClienteId};

/// An authenticated principal as supplied by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// User id.
    pub id: Uuid,
    /// Roles held by the user.
    pub roles: RoleSet,
}

impl Actor {
    /// Creates an actor.
    #[must_use]
    pub fn new(id: Uuid, roles: impl Into<RoleSet>) -> Self {
        Self {
            id,
            roles: roles.into(),
        }
    }

    /// Creates an actor from raw role claims.
    pub fn from_claims<I, S>(id: Uuid, claims: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            id,
            roles: RoleSet::from_claims(claims),
        }
    }

    /// Returns true if the actor holds `role`.
    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(role)
    }
}

/// An actor whose ownership binding has been resolved.
///
/// Guard predicates only accept this type, so they cannot run while the
/// ownership lookup is still pending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedActor {
    actor: Actor,
    binding: OwnershipBinding,
}

impl ResolvedActor {
    pub(crate) fn new(actor: Actor, binding: OwnershipBinding) -> Self {
        Self { actor, binding }
    }

    /// The underlying actor.
    #[must_use]
    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    /// Actor id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.actor.id
    }

    /// Returns true if the actor holds `role`.
    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.actor.has_role(role)
    }

    /// The resolved binding.
    #[must_use]
    pub fn binding(&self) -> &OwnershipBinding {
        &self.binding
    }

    /// Linked warehouse, if any.
    #[must_use]
    pub fn armazem_id(&self) -> Option<ArmazemId> {
        self.binding.armazem_id
    }

    /// Linked customer, if any.
    #[must_use]
    pub fn cliente_id(&self) -> Option<ClienteId> {
        self.binding.cliente_id
    }
}
