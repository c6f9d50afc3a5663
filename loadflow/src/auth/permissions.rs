//! Role to resource permission matrix.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{Role, RoleSet};
use crate::errors::StoreError;

/// Resource gating the loading listing.
pub const RESOURCE_LOADINGS: &str = "carregamentos";

/// Customer directory resource.
pub const RESOURCE_CUSTOMERS: &str = "clientes";

/// A CRUD action on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Insert rows.
    Create,
    /// Read rows.
    Read,
    /// Update rows.
    Update,
    /// Delete rows.
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Read => write!(f, "read"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Flags granted to a role on one resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePermissions {
    /// Insert allowed.
    #[serde(default)]
    pub can_create: bool,
    /// Read allowed.
    #[serde(default)]
    pub can_read: bool,
    /// Update allowed.
    #[serde(default)]
    pub can_update: bool,
    /// Delete allowed.
    #[serde(default)]
    pub can_delete: bool,
}

impl ResourcePermissions {
    /// Read-only access.
    #[must_use]
    pub const fn read_only() -> Self {
        Self {
            can_create: false,
            can_read: true,
            can_update: false,
            can_delete: false,
        }
    }

    /// Every action allowed.
    #[must_use]
    pub const fn full() -> Self {
        Self {
            can_create: true,
            can_read: true,
            can_update: true,
            can_delete: true,
        }
    }

    /// Returns true if `action` is granted.
    #[must_use]
    pub const fn allows(&self, action: Action) -> bool {
        match action {
            Action::Create => self.can_create,
            Action::Read => self.can_read,
            Action::Update => self.can_update,
            Action::Delete => self.can_delete,
        }
    }
}

/// One row of the external `permissoes` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRow {
    /// Role the row applies to.
    pub role: Role,
    /// Resource name.
    pub resource: String,
    /// Granted flags.
    #[serde(flatten)]
    pub permissions: ResourcePermissions,
}

/// Permissions keyed by role and resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionMatrix {
    entries: HashMap<(Role, String), ResourcePermissions>,
}

impl PermissionMatrix {
    /// Creates an empty matrix; every lookup denies.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a matrix from stored rows. Later rows win.
    pub fn from_rows(rows: impl IntoIterator<Item = PermissionRow>) -> Self {
        let entries = rows
            .into_iter()
            .map(|row| ((row.role, row.resource), row.permissions))
            .collect();
        Self { entries }
    }

    /// Adds or replaces an entry.
    #[must_use]
    pub fn grant(mut self, role: Role, resource: impl Into<String>, permissions: ResourcePermissions) -> Self {
        self.entries.insert((role, resource.into()), permissions);
        self
    }

    /// Looks up the flags for a role on a resource.
    #[must_use]
    pub fn get(&self, role: Role, resource: &str) -> Option<&ResourcePermissions> {
        self.entries.get(&(role, resource.to_string()))
    }

    /// Returns true if any of `roles` is granted `action` on `resource`.
    #[must_use]
    pub fn allows_any(&self, roles: &RoleSet, resource: &str, action: Action) -> bool {
        roles
            .iter()
            .filter_map(|role| self.get(role, resource))
            .any(|perms| perms.allows(action))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the matrix has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Loads the permission matrix for a set of roles.
#[async_trait]
pub trait PermissionSource: Send + Sync {
    /// Returns the entries that apply to `roles`.
    async fn load_matrix(&self, roles: &RoleSet) -> Result<PermissionMatrix, StoreError>;
}

/// A permission source serving a fixed matrix.
#[derive(Debug, Default)]
pub struct StaticPermissionSource {
    matrix: PermissionMatrix,
    loads: AtomicUsize,
}

impl StaticPermissionSource {
    /// Creates a source serving `matrix`.
    #[must_use]
    pub fn new(matrix: PermissionMatrix) -> Self {
        Self {
            matrix,
            loads: AtomicUsize::new(0),
        }
    }

    /// Number of times the matrix was loaded.
    #[must_use]
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PermissionSource for StaticPermissionSource {
    async fn load_matrix(&self, roles: &RoleSet) -> Result<PermissionMatrix, StoreError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let entries = self
            .matrix
            .entries
            .iter()
            .filter(|((role, _), _)| roles.contains(*role))
            .map(|(key, perms)| (key.clone(), *perms))
            .collect();
        Ok(PermissionMatrix { entries })
    }
}
