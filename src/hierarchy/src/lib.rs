//! # Lattice Hierarchy
//!
//! Materialized-path organization trees. One generic [`HierarchyTree`] is
//! instantiated per organizational dimension (legal entities, functional
//! units, locations) instead of maintaining three near-identical copies.
//!
//! A node's position is encoded as a [`TreePath`] — dot-joined, fixed-width
//! 3-digit segments (`"001.002.003"`). Subtree and ancestor queries are
//! prefix operations over an ordered path index, never recursive walks, which
//! is what makes every downstream scope check O(path length).

pub mod error;
pub mod node;
pub mod path;
pub mod tree;

pub use error::{HierarchyError, PathError, Result};
pub use node::{HierarchyNode, NodeAttrs, TreeKind};
pub use path::TreePath;
pub use tree::HierarchyTree;
