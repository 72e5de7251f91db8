//! Time-bounded, tree-scoped role grants.

mod store;
mod types;


pub use store::{GrantStore, InMemoryGrantStore};
pub use types::{AccessGrant, ScopeLimit};
