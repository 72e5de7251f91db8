use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lattice_core::{GrantId, Permission, ScopeType, UserId};
use lattice_hierarchy::TreePath;

/// A single authorization question: may `user_id` exercise `permission`
/// on the resource at `resource_path` in the `scope` dimension, at `at`?
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessRequest {
    pub user_id: UserId,
    pub permission: Permission,
    pub scope: ScopeType,
    /// `None` for dimension-wide questions ("may this user manage any
    /// department?"); only unrestricted grants answer those.
    #[serde(default)]
    pub resource_path: Option<TreePath>,
    pub at: DateTime<Utc>,
}

impl AccessRequest {
    pub fn new(user_id: UserId, permission: Permission, scope: ScopeType) -> Self {
        Self {
            user_id,
            permission,
            scope,
            resource_path: None,
            at: Utc::now(),
        }
    }

    pub fn on_path(mut self, path: TreePath) -> Self {
        self.resource_path = Some(path);
        self
    }

    pub fn at(mut self, at: DateTime<Utc>) -> Self {
        self.at = at;
        self
    }
}

/// Why a request was allowed or denied. Surfaced in audit logs, so the
/// variants distinguish "no grants at all" from "grants exist but none
/// reach this resource" from "in scope but the role lacks the permission".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    Allowed,
    NoActiveGrants,
    NoGrantInScope,
    PermissionNotGranted,
}

/// The resolver's answer. `restrictions` and `matched_grants` are only
/// populated on allow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessDecision {
    pub allowed: bool,
    pub reason: DecisionReason,
    /// Every active in-scope grant that supplied the permission, for audit.
    pub matched_grants: Vec<GrantId>,
    /// Constraint payloads from the matched grants, merged most-permissive.
    pub restrictions: HashMap<String, serde_json::Value>,
}

impl AccessDecision {
    pub fn deny(reason: DecisionReason) -> Self {
        Self {
            allowed: false,
            reason,
            matched_grants: Vec::new(),
            restrictions: HashMap::new(),
        }
    }

    pub fn allow(
        matched_grants: Vec<GrantId>,
        restrictions: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            allowed: true,
            reason: DecisionReason::Allowed,
            matched_grants,
            restrictions,
        }
    }
}
