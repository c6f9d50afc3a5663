//! Per-session authorization context.
//!
//! Holds the actor, its ownership state and the lazily loaded permission
//! matrix. Lookups are single-flight: concurrent callers share one directory
//! call. Changing the role set invalidates both caches.

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::guard::{self, AdvanceDecision};
use super::ownership::{resolve_ownership, OwnershipDirectory, OwnershipState};
use super::permissions::{Action, PermissionMatrix, PermissionSource};
use super::{Actor, ResolvedActor, RoleSet};
use crate::core::LoadingRecord;
use crate::errors::{LoadflowError, Result};

struct SessionState {
    actor: Actor,
    ownership: OwnershipState,
    matrix: Option<Arc<PermissionMatrix>>,
    generation: u64,
}

/// Authorization state for one actor session.
pub struct AuthorizationContext {
    state: RwLock<SessionState>,
    directory: Arc<dyn OwnershipDirectory>,
    permissions: Arc<dyn PermissionSource>,
    resolve_lock: Mutex<()>,
    matrix_lock: Mutex<()>,
}

impl fmt::Debug for AuthorizationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("AuthorizationContext")
            .field("actor", &state.actor)
            .field("ownership", &state.ownership)
            .field("matrix_loaded", &state.matrix.is_some())
            .field("generation", &state.generation)
            .finish_non_exhaustive()
    }
}

impl AuthorizationContext {
    /// Creates a context with unresolved ownership and no matrix.
    #[must_use]
    pub fn new(actor: Actor, directory: Arc<dyn OwnershipDirectory>, permissions: Arc<dyn PermissionSource>) -> Self {
        Self {
            state: RwLock::new(SessionState {
                actor,
                ownership: OwnershipState::Unresolved,
                matrix: None,
                generation: 0,
            }),
            directory,
            permissions,
            resolve_lock: Mutex::new(()),
            matrix_lock: Mutex::new(()),
        }
    }

    /// The session actor.
    #[must_use]
    pub fn actor(&self) -> Actor {
        self.state.read().actor.clone()
    }

    /// Current ownership state.
    #[must_use]
    pub fn ownership(&self) -> OwnershipState {
        self.state.read().ownership
    }

    /// Returns true while ownership resolution has not completed.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.ownership().is_pending()
    }

    /// Replaces the actor's roles and drops cached ownership and permissions.
    pub fn set_roles(&self, roles: impl Into<RoleSet>) {
        let mut state = self.state.write();
        state.actor.roles = roles.into();
        state.ownership = OwnershipState::Unresolved;
        state.matrix = None;
        state.generation += 1;
        info!(
            actor_id = %state.actor.id,
            generation = state.generation,
            "Actor roles changed, authorization caches reset"
        );
    }

    /// Returns the resolved actor without waiting, or `None` while pending.
    #[must_use]
    pub fn try_resolved_actor(&self) -> Option<ResolvedActor> {
        let state = self.state.read();
        match state.ownership {
            OwnershipState::Resolved(binding) => Some(ResolvedActor::new(state.actor.clone(), binding)),
            OwnershipState::Unresolved => None,
        }
    }

    /// Resolves ownership once per role set and returns the resolved actor.
    pub async fn resolved_actor(&self) -> Result<ResolvedActor> {
        loop {
            if let Some(resolved) = self.try_resolved_actor() {
                return Ok(resolved);
            }

            let _flight = self.resolve_lock.lock().await;
            if let Some(resolved) = self.try_resolved_actor() {
                return Ok(resolved);
            }

            let (actor, generation) = {
                let state = self.state.read();
                (state.actor.clone(), state.generation)
            };
            let binding = resolve_ownership(self.directory.as_ref(), &actor).await?;

            let stored = {
                let mut state = self.state.write();
                if state.generation == generation {
                    state.ownership = OwnershipState::Resolved(binding);
                    true
                } else {
                    false
                }
            };
            if stored {
                return Ok(ResolvedActor::new(actor, binding));
            }
            debug!(actor_id = %actor.id, "Roles changed during ownership lookup, resolving again");
        }
    }

    /// Loads the permission matrix once per role set.
    pub async fn permission_matrix(&self) -> Result<Arc<PermissionMatrix>> {
        loop {
            if let Some(matrix) = self.cached_matrix() {
                return Ok(matrix);
            }

            let _flight = self.matrix_lock.lock().await;
            if let Some(matrix) = self.cached_matrix() {
                return Ok(matrix);
            }

            let (roles, generation) = {
                let state = self.state.read();
                (state.actor.roles.clone(), state.generation)
            };
            let matrix = Arc::new(
                self.permissions
                    .load_matrix(&roles)
                    .await
                    .map_err(|err| LoadflowError::from_store(None, err))?,
            );

            let stored = {
                let mut state = self.state.write();
                if state.generation == generation {
                    state.matrix = Some(Arc::clone(&matrix));
                    true
                } else {
                    false
                }
            };
            if stored {
                debug!(entries = matrix.len(), "Loaded permission matrix");
                return Ok(matrix);
            }
        }
    }

    fn cached_matrix(&self) -> Option<Arc<PermissionMatrix>> {
        self.state.read().matrix.clone()
    }

    /// Waits for resolution, then checks the matrix.
    pub async fn can_access_resource(&self, resource: &str, action: Action) -> Result<bool> {
        let actor = self.resolved_actor().await?;
        let matrix = self.permission_matrix().await?;
        Ok(guard::can_access_resource(&actor, &matrix, resource, action))
    }

    /// Waits for resolution, then checks visibility.
    pub async fn can_view_record(&self, record: &LoadingRecord) -> Result<bool> {
        let actor = self.resolved_actor().await?;
        Ok(guard::can_view_record(&actor, record))
    }

    /// Waits for resolution, then checks advance rights.
    pub async fn can_advance_stage(&self, record: &LoadingRecord) -> Result<bool> {
        let actor = self.resolved_actor().await?;
        Ok(guard::can_advance_stage(&actor, record))
    }

    /// Waits for resolution, then reports the full advance decision.
    pub async fn advance_decision(&self, record: &LoadingRecord) -> Result<(ResolvedActor, AdvanceDecision)> {
        let actor = self.resolved_actor().await?;
        let decision = guard::advance_decision(&actor, record);
        Ok((actor, decision))
    }
}
