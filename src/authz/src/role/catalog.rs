use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use lattice_core::{Permission, RoleId};

use crate::error::{AuthzError, Result};
use crate::role::{Role, RoleStore};

/// Hard cap on inheritance chain length. Real role hierarchies are three or
/// four levels deep; anything past this is a modelling mistake.
pub const MAX_INHERITANCE_DEPTH: usize = 32;

/// Role registry with inheritance flattening.
///
/// Wraps a [`RoleStore`] and memoizes flattened permission sets. The cache
/// is keyed by role id and cleared wholesale on any write: a parent edit
/// must invalidate every descendant, and tracking that dependency graph
/// costs more than recomputing a few dozen roles.
pub struct RoleCatalog {
    store: Arc<dyn RoleStore>,
    flattened: DashMap<RoleId, Arc<HashSet<Permission>>>,
}

impl RoleCatalog {
    pub fn new(store: Arc<dyn RoleStore>) -> Self {
        Self {
            store,
            flattened: DashMap::new(),
        }
    }

    pub async fn get(&self, id: &RoleId) -> Result<Role> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| AuthzError::RoleNotFound(id.clone()))
    }

    pub async fn list(&self) -> Result<Vec<Role>> {
        self.store.list().await
    }

    /// Validates the inheritance chain and persists the role.
    ///
    /// Rejects a missing parent, a chain longer than
    /// [`MAX_INHERITANCE_DEPTH`], and any cycle the new edge would close,
    /// so stored hierarchies are always walkable without loop checks.
    pub async fn save(&self, role: Role) -> Result<()> {
        if let Some(parent_id) = &role.inherits_from {
            if *parent_id == role.id {
                return Err(AuthzError::InvalidRoleHierarchy(format!(
                    "role '{}' cannot inherit from itself",
                    role.id
                )));
            }
            self.validate_chain(&role.id, parent_id).await?;
        }

        debug!(role = %role.id, parent = ?role.inherits_from, "saving role");
        self.store.put(role).await?;
        self.flattened.clear();
        Ok(())
    }

    pub async fn delete(&self, id: &RoleId) -> Result<Role> {
        let role = self.get(id).await?;
        if role.is_system_role {
            return Err(AuthzError::InvalidRoleHierarchy(format!(
                "system role '{}' cannot be deleted",
                id
            )));
        }

        // Children of the removed role would be left with a dangling parent.
        for other in self.store.list().await? {
            if other.inherits_from.as_deref() == Some(id.as_str()) {
                return Err(AuthzError::InvalidRoleHierarchy(format!(
                    "role '{}' still inherits from '{}'",
                    other.id, id
                )));
            }
        }

        let removed = self
            .store
            .remove(id)
            .await?
            .ok_or_else(|| AuthzError::RoleNotFound(id.clone()))?;
        self.flattened.clear();
        Ok(removed)
    }

    /// The permissions a role effectively grants, with the whole
    /// inheritance chain applied.
    ///
    /// Flattening overlays child settings on top of the parent's: an
    /// explicit `false` in a child removes a permission an ancestor
    /// granted. Inactive roles flatten to the empty set.
    pub async fn effective_permissions(&self, id: &RoleId) -> Result<Arc<HashSet<Permission>>> {
        if let Some(cached) = self.flattened.get(id) {
            return Ok(cached.clone());
        }

        let flattened = Arc::new(self.flatten(id).await?);
        self.flattened.insert(id.clone(), flattened.clone());
        Ok(flattened)
    }

    async fn flatten(&self, id: &RoleId) -> Result<HashSet<Permission>> {
        // Collect the chain leaf-to-root, then overlay root-first.
        let mut chain: Vec<Role> = Vec::new();
        let mut cursor = Some(id.clone());
        while let Some(current_id) = cursor {
            if chain.len() >= MAX_INHERITANCE_DEPTH {
                return Err(AuthzError::InvalidRoleHierarchy(format!(
                    "inheritance chain of '{}' exceeds {} levels",
                    id, MAX_INHERITANCE_DEPTH
                )));
            }
            let role = self
                .store
                .get(&current_id)
                .await?
                .ok_or_else(|| AuthzError::RoleNotFound(current_id.clone()))?;
            cursor = role.inherits_from.clone();
            chain.push(role);
        }

        if chain.first().map(|r| !r.is_active).unwrap_or(false) {
            return Ok(HashSet::new());
        }

        let mut effective: HashMap<Permission, bool> = HashMap::new();
        for role in chain.iter().rev() {
            for (permission, granted) in &role.permissions {
                effective.insert(*permission, *granted);
            }
        }

        Ok(effective
            .into_iter()
            .filter_map(|(p, granted)| granted.then_some(p))
            .collect())
    }

    /// Walks up from `parent_id` checking that `child_id` never reappears
    /// and the chain stays within bounds.
    async fn validate_chain(&self, child_id: &RoleId, parent_id: &RoleId) -> Result<()> {
        let mut visited: HashSet<RoleId> = HashSet::from([child_id.clone()]);
        let mut cursor = Some(parent_id.clone());
        let mut depth = 0usize;

        while let Some(current_id) = cursor {
            if !visited.insert(current_id.clone()) {
                return Err(AuthzError::InvalidRoleHierarchy(format!(
                    "role '{}' inheriting from '{}' would create a cycle",
                    child_id, parent_id
                )));
            }
            depth += 1;
            if depth > MAX_INHERITANCE_DEPTH {
                return Err(AuthzError::InvalidRoleHierarchy(format!(
                    "inheritance chain above '{}' exceeds {} levels",
                    parent_id, MAX_INHERITANCE_DEPTH
                )));
            }

            let role = self
                .store
                .get(&current_id)
                .await?
                .ok_or_else(|| AuthzError::RoleNotFound(current_id.clone()))?;
            cursor = role.inherits_from;
        }

        Ok(())
    }
}
