//! Role catalog, scoped access grants, and the permission resolution engine.
//!
//! The authorization model is org-scoped RBAC: a user holds any number of
//! [`AccessGrant`]s, each binding a role to a position in one of the
//! organizational trees. At decision time the [`PermissionResolver`] finds
//! the grants whose scope contains the requested resource, flattens each
//! grant's role through its inheritance chain, applies per-grant overrides,
//! and OR-merges the results. Access is denied only when no grant allows it.

pub mod engine;
pub mod error;
pub mod grant;
pub mod role;

pub use engine::{AccessDecision, AccessRequest, DecisionReason, PermissionResolver};
pub use error::{AuthzError, Result};
pub use grant::{AccessGrant, GrantStore, InMemoryGrantStore, ScopeLimit};
pub use role::{InMemoryRoleStore, Role, RoleCatalog, RoleStore};
