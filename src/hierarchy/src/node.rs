//! Node types shared by all organizational trees.

use chrono::{DateTime, Utc};
use lattice_core::{NodeId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::{HierarchyError, Result};
use crate::path::TreePath;

/// Which organizational dimension a tree models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeKind {
    /// Legal entities (holding groups, parents, subsidiaries).
    Company,
    /// Functional units.
    Department,
    /// Physical locations.
    Branch,
}

impl TreeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TreeKind::Company => "company",
            TreeKind::Department => "department",
            TreeKind::Branch => "branch",
        }
    }
}

impl std::fmt::Display for TreeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied attributes for a new node.
///
/// Only the fields the hierarchy itself cares about live here; contact info,
/// compensation and the like are plain records owned by other services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAttrs {
    /// Display name.
    pub name: String,
    /// Business short code (normalized to uppercase on insert).
    pub code: String,
    /// Whether children may attach to this node.
    pub is_group: bool,
}

impl NodeAttrs {
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
            is_group: true,
        }
    }

    /// Marks the node as a leaf (no children allowed).
    pub fn leaf(mut self) -> Self {
        self.is_group = false;
        self
    }
}

/// A node in one of the organizational trees.
///
/// Structural invariants (enforced by [`crate::HierarchyTree`], checkable via
/// [`HierarchyNode::check_invariants`]):
///
/// - `parent_id == None ⇔ path == None ⇔ depth == 0` (root nodes);
/// - a non-root's path is its parent's path plus one segment, and its depth
///   is the parent's plus one;
/// - `root_id` points at the topmost ancestor; a root points at itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyNode {
    pub id: NodeId,
    pub parent_id: Option<NodeId>,
    pub path: Option<TreePath>,
    pub depth: u32,
    pub root_id: NodeId,
    pub is_group: bool,

    pub name: String,
    pub code: String,

    // Soft delete: nodes are marked, never physically removed, so paths in
    // already-issued grants stay resolvable.
    pub is_deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_by: Option<UserId>,
}

impl HierarchyNode {
    /// Whether this node is a tree root.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Verifies the root/path/depth agreement invariants.
    pub fn check_invariants(&self) -> Result<()> {
        let consistent = match (&self.parent_id, &self.path) {
            (None, None) => self.depth == 0 && self.root_id == self.id,
            (Some(_), Some(path)) => self.depth == path.depth() && self.depth > 0,
            _ => false,
        };

        if consistent {
            Ok(())
        } else {
            Err(HierarchyError::InvariantViolation(format!(
                "node {} violates path/depth/root invariants",
                self.id
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn root_node() -> HierarchyNode {
        let id = Uuid::new_v4();
        HierarchyNode {
            id,
            parent_id: None,
            path: None,
            depth: 0,
            root_id: id,
            is_group: true,
            name: "Acme Holdings".to_string(),
            code: "ACME".to_string(),
            is_deleted: false,
            deleted_at: None,
            deleted_by: None,
        }
    }

    #[test]
    fn root_invariants_hold() {
        let node = root_node();
        assert!(node.is_root());
        assert!(node.check_invariants().is_ok());
    }

    #[test]
    fn detects_depth_path_mismatch() {
        let mut node = root_node();
        node.parent_id = Some(Uuid::new_v4());
        node.path = Some(TreePath::parse("001.002").unwrap());
        node.depth = 1; // disagrees with the 2-segment path
        assert!(node.check_invariants().is_err());
    }

    #[test]
    fn detects_half_root() {
        let mut node = root_node();
        node.parent_id = Some(Uuid::new_v4()); // parent set but no path
        assert!(node.check_invariants().is_err());
    }
}
