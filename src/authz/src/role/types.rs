use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use lattice_core::{Permission, RoleId};

/// A named bundle of permission settings, optionally inheriting from a
/// single parent role.
///
/// `permissions` is sparse: a missing entry means "inherit" (or deny, for a
/// role with no parent), `true` grants, and an explicit `false` revokes a
/// permission the parent chain would otherwise grant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    /// Stable uppercase code, e.g. `DEPT_MGR`. Doubles as the storage key.
    pub id: RoleId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Seniority ordinal for display and comparison; plays no part in
    /// resolution.
    #[serde(default)]
    pub level: u32,
    #[serde(default)]
    pub permissions: HashMap<Permission, bool>,
    /// Single-parent inheritance; `None` for base roles.
    #[serde(default)]
    pub inherits_from: Option<RoleId>,
    /// System roles ship with the product and cannot be deleted.
    #[serde(default)]
    pub is_system_role: bool,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl Role {
    pub fn new(id: impl Into<RoleId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            level: 0,
            permissions: HashMap::new(),
            inherits_from: None,
            is_system_role: false,
            is_active: true,
        }
    }

    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    pub fn inheriting(mut self, parent: impl Into<RoleId>) -> Self {
        self.inherits_from = Some(parent.into());
        self
    }

    pub fn grant(mut self, permission: Permission) -> Self {
        self.permissions.insert(permission, true);
        self
    }

    /// Explicitly revokes a permission the inheritance chain would grant.
    pub fn revoke(mut self, permission: Permission) -> Self {
        self.permissions.insert(permission, false);
        self
    }

    pub fn system(mut self) -> Self {
        self.is_system_role = true;
        self
    }
}
