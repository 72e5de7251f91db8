//! Role definitions, storage, and inheritance flattening.

mod catalog;
mod store;
mod types;


pub use catalog::{RoleCatalog, MAX_INHERITANCE_DEPTH};
pub use store::{InMemoryRoleStore, RoleStore};
pub use types::Role;
