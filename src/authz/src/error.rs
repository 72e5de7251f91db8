use lattice_core::{GrantId, RoleId};
use lattice_hierarchy::PathError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuthzError>;

#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("role '{0}' not found")]
    RoleNotFound(RoleId),

    #[error("grant {0} not found")]
    GrantNotFound(GrantId),

    #[error("invalid role hierarchy: {0}")]
    InvalidRoleHierarchy(String),

    #[error("invalid scope '{0}': {1}")]
    InvalidScopeFormat(String, PathError),

    #[error("hierarchy error: {0}")]
    Hierarchy(#[from] lattice_hierarchy::HierarchyError),

    #[error("lock poisoned: {0}")]
    Lock(String),
}
