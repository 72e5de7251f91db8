use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use lattice_core::RoleId;

use crate::error::Result;
use crate::role::Role;

/// Storage backend for role definitions. The in-memory implementation backs
/// tests and single-node deployments; a database-backed one plugs in here.
#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn get(&self, id: &RoleId) -> Result<Option<Role>>;

    async fn list(&self) -> Result<Vec<Role>>;

    /// Inserts or replaces a role. Hierarchy validation happens in the
    /// catalog before this is called.
    async fn put(&self, role: Role) -> Result<()>;

    async fn remove(&self, id: &RoleId) -> Result<Option<Role>>;
}

#[derive(Debug, Default)]
pub struct InMemoryRoleStore {
    roles: Arc<RwLock<HashMap<RoleId, Role>>>,
}

impl InMemoryRoleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoleStore for InMemoryRoleStore {
    async fn get(&self, id: &RoleId) -> Result<Option<Role>> {
        Ok(self.roles.read().await.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<Role>> {
        let mut roles: Vec<_> = self.roles.read().await.values().cloned().collect();
        roles.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(roles)
    }

    async fn put(&self, role: Role) -> Result<()> {
        self.roles.write().await.insert(role.id.clone(), role);
        Ok(())
    }

    async fn remove(&self, id: &RoleId) -> Result<Option<Role>> {
        Ok(self.roles.write().await.remove(id))
    }
}
