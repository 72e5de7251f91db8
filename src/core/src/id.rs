//! Identifier aliases shared across the workspace.
//!
//! All entity identifiers are UUIDs. They stay as plain aliases (rather than
//! newtypes) because every id crosses the storage boundary as a UUID string
//! and the call sites never mix id kinds within one collection.

use uuid::Uuid;

/// Identifier of a node in any of the organizational trees.
pub type NodeId = Uuid;

/// Identifier of a user (the authenticated principal).
pub type UserId = Uuid;

/// Identifier of an access grant.
pub type GrantId = Uuid;
