//! The permission resolution engine.
//!
//! [`PermissionResolver::resolve`] answers an [`AccessRequest`] by walking
//! the user's active grants and OR-merging: any single grant that is in
//! scope and whose role (after overrides) carries the permission allows the
//! request. Resolution never mutates anything; [`PermissionResolver::authorize`]
//! wraps it and stamps usage on the grants that carried an allow.

mod decision;

pub use decision::{AccessDecision, AccessRequest, DecisionReason};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, instrument, warn};

use lattice_core::{Permission, RoleId};

use crate::error::Result;
use crate::grant::{AccessGrant, GrantStore};
use crate::role::RoleCatalog;

pub struct PermissionResolver {
    grants: Arc<dyn GrantStore>,
    roles: Arc<RoleCatalog>,
}

impl PermissionResolver {
    pub fn new(grants: Arc<dyn GrantStore>, roles: Arc<RoleCatalog>) -> Self {
        Self { grants, roles }
    }

    /// Decides the request. Pure: no usage stamping, no cache writes
    /// outside the role catalog's own memo.
    #[instrument(skip(self, request), fields(user = %request.user_id, permission = %request.permission, scope = %request.scope))]
    pub async fn resolve(&self, request: &AccessRequest) -> Result<AccessDecision> {
        let active = self
            .grants
            .active_grants_for(request.user_id, request.at)
            .await?;
        if active.is_empty() {
            debug!("deny: no active grants");
            return Ok(AccessDecision::deny(DecisionReason::NoActiveGrants));
        }

        let in_scope: Vec<&AccessGrant> = active
            .iter()
            .filter(|g| g.scope_type.applies_to(request.scope))
            .filter(|g| g.covers(request.resource_path.as_ref()))
            .collect();
        if in_scope.is_empty() {
            debug!(candidates = active.len(), "deny: no grant reaches the resource");
            return Ok(AccessDecision::deny(DecisionReason::NoGrantInScope));
        }

        // Flattened role sets are memoized per evaluation so a user with
        // many grants of the same role costs one catalog lookup.
        let mut role_memo: HashMap<RoleId, Arc<HashSet<Permission>>> = HashMap::new();
        let mut matched = Vec::new();
        let mut restrictions: HashMap<String, Value> = HashMap::new();

        for grant in in_scope {
            let effective = match role_memo.get(&grant.role_id) {
                Some(set) => set.clone(),
                None => {
                    // A grant pointing at a deleted role contributes
                    // nothing; the user's other grants still count.
                    let set = match self.roles.effective_permissions(&grant.role_id).await {
                        Ok(set) => set,
                        Err(crate::error::AuthzError::RoleNotFound(role_id)) => {
                            warn!(grant = %grant.id, role = %role_id, "grant references missing role");
                            Arc::new(HashSet::new())
                        }
                        Err(other) => return Err(other),
                    };
                    role_memo.insert(grant.role_id.clone(), set.clone());
                    set
                }
            };

            let granted = match grant.overrides.get(&request.permission) {
                Some(setting) => *setting,
                None => effective.contains(&request.permission),
            };
            if !granted {
                continue;
            }

            matched.push(grant.id);
            for (key, value) in &grant.restrictions {
                merge_restriction(&mut restrictions, key, value);
            }
        }

        if matched.is_empty() {
            debug!("deny: in-scope grants lack the permission");
            return Ok(AccessDecision::deny(DecisionReason::PermissionNotGranted));
        }

        debug!(grants = matched.len(), "allow");
        Ok(AccessDecision::allow(matched, restrictions))
    }

    /// Resolves and, on allow, stamps `last_used_at` on every matched
    /// grant. Stamping failures are logged and swallowed; they must not
    /// turn an allow into an error.
    pub async fn authorize(&self, request: &AccessRequest) -> Result<AccessDecision> {
        let decision = self.resolve(request).await?;
        if decision.allowed {
            for grant_id in &decision.matched_grants {
                if let Err(error) = self.grants.record_usage(*grant_id, request.at).await {
                    warn!(grant = %grant_id, %error, "failed to stamp grant usage");
                }
            }
        }
        Ok(decision)
    }
}

/// Merges one restriction entry, keeping the most permissive value when two
/// grants constrain the same key: numbers take the max, booleans OR, arrays
/// union. Mismatched shapes keep the first value seen.
fn merge_restriction(into: &mut HashMap<String, Value>, key: &str, value: &Value) {
    match into.get_mut(key) {
        None => {
            into.insert(key.to_string(), value.clone());
        }
        Some(existing) => match (&*existing, value) {
            (Value::Number(a), Value::Number(b)) => {
                let keep_new = match (a.as_f64(), b.as_f64()) {
                    (Some(a), Some(b)) => b > a,
                    _ => false,
                };
                if keep_new {
                    *existing = value.clone();
                }
            }
            (Value::Bool(a), Value::Bool(b)) => {
                *existing = Value::Bool(*a || *b);
            }
            (Value::Array(_), Value::Array(b)) => {
                if let Value::Array(items) = existing {
                    for item in b {
                        if !items.contains(item) {
                            items.push(item.clone());
                        }
                    }
                }
            }
            _ => {
                warn!(key, "conflicting restriction shapes; keeping first value");
            }
        },
    }
}
