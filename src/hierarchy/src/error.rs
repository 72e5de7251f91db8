//! Error types for the hierarchy crate.

use lattice_core::NodeId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HierarchyError>;

/// Errors from parsing or combining materialized paths.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    /// The text does not match the `(\d{3})(\.\d{3})*` grammar.
    #[error("invalid path format: {0}")]
    InvalidFormat(String),
}

/// Errors from tree mutations and queries.
///
/// Structural errors are rejected at the mutation boundary; the tree never
/// reaches an invalid state.
#[derive(Debug, Error)]
pub enum HierarchyError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("parent not found: {0}")]
    ParentNotFound(NodeId),

    #[error("parent {0} is a leaf node and cannot take children")]
    ParentIsLeaf(NodeId),

    #[error("moving {0} under {1} would create a cycle")]
    CycleDetected(NodeId, NodeId),

    #[error("node {0} has active descendants; delete with cascade or remove them first")]
    HasActiveDescendants(NodeId),

    /// An in-flight move overlaps this one; the caller should retry with
    /// backoff once the other move has settled.
    #[error("concurrent move conflict: {0}")]
    ConcurrentMoveConflict(String),

    /// Sibling segments are 3 digits wide and never reused, so a parent can
    /// exhaust them after 1000 inserts.
    #[error("sibling segment space exhausted under parent {0:?}")]
    SegmentSpaceExhausted(Option<NodeId>),

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("lock poisoned: {0}")]
    Lock(String),
}
