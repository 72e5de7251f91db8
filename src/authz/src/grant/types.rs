use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use lattice_core::{GrantId, Permission, RoleId, ScopeType, UserId};
use lattice_hierarchy::TreePath;

use crate::error::{AuthzError, Result};

/// Where in a tree a grant applies.
///
/// `Unrestricted` (wire form `"*"`) covers every node of the grant's scope
/// type; `Within` anchors the grant at a path and covers that node plus its
/// descendants, optionally depth-capped by the grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeLimit {
    Unrestricted,
    Within(TreePath),
}

impl ScopeLimit {
    /// Parses the wire form, mapping path errors to the grant-level error
    /// so callers see which scope string was bad.
    pub fn parse(text: &str) -> Result<Self> {
        if text == "*" {
            return Ok(Self::Unrestricted);
        }
        TreePath::parse(text)
            .map(Self::Within)
            .map_err(|e| AuthzError::InvalidScopeFormat(text.to_string(), e))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Unrestricted => "*",
            Self::Within(path) => path.as_str(),
        }
    }

    /// Whether `resource` falls inside this scope, honoring `depth_limit`
    /// levels below the anchor (`None` = unlimited).
    pub fn contains(&self, resource: &TreePath, depth_limit: Option<u32>) -> bool {
        match self {
            Self::Unrestricted => true,
            Self::Within(anchor) => anchor.is_within_depth(resource, depth_limit),
        }
    }
}

impl fmt::Display for ScopeLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ScopeLimit {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ScopeLimit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

/// A user's membership in a role, scoped to a position in one of the
/// organizational trees and bounded in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessGrant {
    pub id: GrantId,
    pub user_id: UserId,
    pub role_id: RoleId,

    /// Which tree the scope path refers to (or `Global`).
    pub scope_type: ScopeType,
    pub scope: ScopeLimit,
    /// Levels below the scope anchor this grant reaches; `None` covers the
    /// whole subtree, `Some(0)` only the anchor itself.
    #[serde(default)]
    pub depth_limit: Option<u32>,

    /// Per-grant tweaks applied after role flattening. `true` adds a
    /// permission the role lacks, `false` removes one it grants.
    #[serde(default)]
    pub overrides: HashMap<Permission, bool>,
    /// Free-form constraint payload surfaced to callers on allow, e.g.
    /// `{"max_approval_amount": 5000}`. Opaque to the resolver except for
    /// merging.
    #[serde(default)]
    pub restrictions: HashMap<String, serde_json::Value>,

    /// Administrative kill switch, independent of revocation and the
    /// validity window.
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub valid_from: DateTime<Utc>,
    #[serde(default)]
    pub valid_until: Option<DateTime<Utc>>,

    pub granted_by: Option<UserId>,
    pub granted_at: DateTime<Utc>,
    /// Administrative note recorded when the grant was issued.
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub revoked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub revoked_by: Option<UserId>,
    #[serde(default)]
    pub revoke_reason: Option<String>,
    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub usage_count: u64,
}

fn default_active() -> bool {
    true
}

impl AccessGrant {
    pub fn new(user_id: UserId, role_id: impl Into<RoleId>, scope_type: ScopeType) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            role_id: role_id.into(),
            scope_type,
            scope: ScopeLimit::Unrestricted,
            depth_limit: None,
            overrides: HashMap::new(),
            restrictions: HashMap::new(),
            is_active: true,
            valid_from: now,
            valid_until: None,
            granted_by: None,
            granted_at: now,
            reason: None,
            revoked_at: None,
            revoked_by: None,
            revoke_reason: None,
            last_used_at: None,
            usage_count: 0,
        }
    }

    pub fn scoped_to(mut self, path: TreePath) -> Self {
        self.scope = ScopeLimit::Within(path);
        self
    }

    pub fn with_depth_limit(mut self, levels: u32) -> Self {
        self.depth_limit = Some(levels);
        self
    }

    pub fn with_override(mut self, permission: Permission, granted: bool) -> Self {
        self.overrides.insert(permission, granted);
        self
    }

    pub fn with_restriction(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.restrictions.insert(key.into(), value);
        self
    }

    pub fn valid_between(
        mut self,
        from: DateTime<Utc>,
        until: Option<DateTime<Utc>>,
    ) -> Self {
        self.valid_from = from;
        self.valid_until = until;
        self
    }

    /// Active means the switch is on, the grant is unrevoked, and `at`
    /// falls inside `[valid_from, valid_until]` (both ends inclusive).
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        if !self.is_active || self.revoked_at.is_some() {
            return false;
        }
        if at < self.valid_from {
            return false;
        }
        match self.valid_until {
            Some(until) => at <= until,
            None => true,
        }
    }

    /// Whether this grant reaches `resource` in the tree named by
    /// `scope_type`. A `None` resource only matches unrestricted grants.
    pub fn covers(&self, resource: Option<&TreePath>) -> bool {
        match (resource, &self.scope) {
            (_, ScopeLimit::Unrestricted) => true,
            (Some(path), _) => self.scope.contains(path, self.depth_limit),
            (None, ScopeLimit::Within(_)) => false,
        }
    }

    /// Deactivates the grant in place; it is retained for audit, never
    /// deleted. The first revocation wins.
    pub fn revoke(&mut self, by: Option<UserId>, reason: Option<String>, at: DateTime<Utc>) {
        if self.revoked_at.is_none() {
            self.is_active = false;
            self.revoked_at = Some(at);
            self.revoked_by = by;
            self.revoke_reason = reason;
        }
    }
}
