use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use lattice_core::{GrantId, RoleId, UserId};

use crate::error::{AuthzError, Result};
use crate::grant::AccessGrant;

/// Storage backend for access grants.
#[async_trait]
pub trait GrantStore: Send + Sync {
    async fn get(&self, id: GrantId) -> Result<Option<AccessGrant>>;

    async fn put(&self, grant: AccessGrant) -> Result<()>;

    /// All grants for a user, active or not. Administrative listing.
    async fn grants_for_user(&self, user_id: UserId) -> Result<Vec<AccessGrant>>;

    /// Grants for a user that are active at `at`. This is the resolver's
    /// entry point, so implementations should keep it cheap.
    async fn active_grants_for(&self, user_id: UserId, at: DateTime<Utc>)
        -> Result<Vec<AccessGrant>>;

    /// Grants (in any state) referencing a role; used to block role
    /// deletion while memberships exist.
    async fn grants_for_role(&self, role_id: &RoleId) -> Result<Vec<AccessGrant>>;

    /// Unrevoked grants whose validity window closes before `deadline`.
    /// Feeds expiry notifications.
    async fn expiring_before(&self, deadline: DateTime<Utc>) -> Result<Vec<AccessGrant>>;

    /// Marks the grant revoked. Revocation is permanent; a revoked grant
    /// stays in the store for audit.
    async fn revoke(
        &self,
        id: GrantId,
        by: Option<UserId>,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<()>;

    /// Stamps `last_used_at` and bumps the usage counter. Called on allow
    /// decisions, best-effort.
    async fn record_usage(&self, id: GrantId, at: DateTime<Utc>) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct InMemoryGrantStore {
    grants: Arc<RwLock<HashMap<GrantId, AccessGrant>>>,
}

impl InMemoryGrantStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GrantStore for InMemoryGrantStore {
    async fn get(&self, id: GrantId) -> Result<Option<AccessGrant>> {
        Ok(self.grants.read().await.get(&id).cloned())
    }

    async fn put(&self, grant: AccessGrant) -> Result<()> {
        debug!(grant = %grant.id, user = %grant.user_id, role = %grant.role_id, "storing grant");
        self.grants.write().await.insert(grant.id, grant);
        Ok(())
    }

    async fn grants_for_user(&self, user_id: UserId) -> Result<Vec<AccessGrant>> {
        Ok(self
            .grants
            .read()
            .await
            .values()
            .filter(|g| g.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn active_grants_for(
        &self,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<Vec<AccessGrant>> {
        Ok(self
            .grants
            .read()
            .await
            .values()
            .filter(|g| g.user_id == user_id && g.is_active_at(at))
            .cloned()
            .collect())
    }

    async fn grants_for_role(&self, role_id: &RoleId) -> Result<Vec<AccessGrant>> {
        Ok(self
            .grants
            .read()
            .await
            .values()
            .filter(|g| &g.role_id == role_id)
            .cloned()
            .collect())
    }

    async fn expiring_before(&self, deadline: DateTime<Utc>) -> Result<Vec<AccessGrant>> {
        Ok(self
            .grants
            .read()
            .await
            .values()
            .filter(|g| {
                g.is_active
                    && g.revoked_at.is_none()
                    && g.valid_until.map(|until| until < deadline).unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn revoke(
        &self,
        id: GrantId,
        by: Option<UserId>,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut grants = self.grants.write().await;
        let grant = grants.get_mut(&id).ok_or(AuthzError::GrantNotFound(id))?;
        grant.revoke(by, reason, at);
        Ok(())
    }

    async fn record_usage(&self, id: GrantId, at: DateTime<Utc>) -> Result<()> {
        let mut grants = self.grants.write().await;
        let grant = grants.get_mut(&id).ok_or(AuthzError::GrantNotFound(id))?;
        grant.last_used_at = Some(at);
        grant.usage_count += 1;
        Ok(())
    }
}
