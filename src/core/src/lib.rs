//! # Lattice Core
//!
//! Shared identifiers and the closed permission vocabulary used by the
//! hierarchy and authorization crates. This package exists so that
//! `lattice-hierarchy` and `lattice-authz` agree on ids and permission keys
//! without depending on each other.

pub mod id;
pub mod permission;
pub mod scope;

// Re-export commonly used types
pub use id::{GrantId, NodeId, UserId};
pub use permission::{Permission, PermissionParseError};
pub use scope::ScopeType;

/// Role identifier: an uppercase role code such as `"DEPT_MGR"`.
///
/// Roles are referenced by code rather than surrogate id so that grants stay
/// readable in stored form.
pub type RoleId = String;
