//! Materialized-path tree with atomic mutations.
//!
//! All mutation (`insert`, `move_node`, `delete`) runs under a single write
//! lock per tree, so readers observe either the pre- or post-mutation path
//! set, never a mix. Subtree queries are a single range scan over the
//! path-ordered index; ancestor queries peel path prefixes. Neither recurses.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use lattice_core::{NodeId, UserId};
use uuid::Uuid;

use crate::error::{HierarchyError, Result};
use crate::node::{HierarchyNode, NodeAttrs, TreeKind};
use crate::path::{TreePath, MAX_SEGMENT};

/// Everything guarded by the tree's lock. Keeping the maps in one struct is
/// what makes a multi-node rewrite (a subtree move) atomic.
#[derive(Debug, Default)]
struct TreeState {
    /// All nodes, including soft-deleted ones.
    nodes: HashMap<NodeId, HierarchyNode>,

    /// Path string → node id, ordered so subtree queries are range scans.
    /// Root nodes (no path) are not indexed here.
    path_index: BTreeMap<String, NodeId>,

    /// Per-parent sibling segment allocator. Counters only ever increase;
    /// segments are never reused, even after deletion or a move, so a path
    /// stays unique over the node's whole lifetime.
    next_segment: HashMap<SegmentKey, u16>,
}

/// Allocator key for sibling segments. Keyed by the parent's id, which is
/// stable across moves (a path-based key would reset after a move and
/// re-issue segments the rerooted children already hold). All roots share
/// one first-level key so single-segment paths are unique tree-wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum SegmentKey {
    FirstLevel,
    Under(NodeId),
}

impl SegmentKey {
    fn for_parent(parent: &HierarchyNode) -> Self {
        if parent.is_root() {
            Self::FirstLevel
        } else {
            Self::Under(parent.id)
        }
    }
}

/// An in-flight move, registered before the write lock is taken so that
/// overlapping moves fail fast instead of queueing in ambiguous order.
#[derive(Debug, Clone)]
struct MoveIntent {
    source: TreePath,
    target: Option<TreePath>,
}

impl MoveIntent {
    fn overlaps(&self, other: &MoveIntent) -> bool {
        let mine = [Some(&self.source), self.target.as_ref()];
        let theirs = [Some(&other.source), other.target.as_ref()];

        mine.iter().flatten().any(|a| {
            theirs
                .iter()
                .flatten()
                .any(|b| a.is_ancestor_or_self(b) || b.is_ancestor_or_self(a))
        })
    }
}

/// Removes the registered intent when the move finishes (or fails).
struct IntentGuard<'a> {
    intents: &'a Mutex<HashMap<NodeId, MoveIntent>>,
    node_id: NodeId,
}

impl Drop for IntentGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut intents) = self.intents.lock() {
            intents.remove(&self.node_id);
        }
    }
}

/// One organizational tree (companies, departments, or branches).
///
/// Cheap to clone and share: clones reference the same underlying state.
#[derive(Clone)]
pub struct HierarchyTree {
    kind: TreeKind,
    state: Arc<RwLock<TreeState>>,
    move_intents: Arc<Mutex<HashMap<NodeId, MoveIntent>>>,
}

impl HierarchyTree {
    /// Creates an empty tree for the given dimension.
    pub fn new(kind: TreeKind) -> Self {
        Self {
            kind,
            state: Arc::new(RwLock::new(TreeState::default())),
            move_intents: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn kind(&self) -> TreeKind {
        self.kind
    }

    /// Inserts a node under `parent_id` (`None` creates a new root).
    ///
    /// The new node's path is the parent's path plus the next sibling
    /// segment; depth and `root_id` are derived, never supplied.
    pub fn insert(&self, parent_id: Option<NodeId>, attrs: NodeAttrs) -> Result<HierarchyNode> {
        let mut state = self
            .state
            .write()
            .map_err(|e| HierarchyError::Lock(e.to_string()))?;

        let id = Uuid::new_v4();
        let code = attrs.code.trim().to_uppercase();

        let node = match parent_id {
            None => HierarchyNode {
                id,
                parent_id: None,
                path: None,
                depth: 0,
                root_id: id,
                is_group: attrs.is_group,
                name: attrs.name,
                code,
                is_deleted: false,
                deleted_at: None,
                deleted_by: None,
            },
            Some(parent_id) => {
                let parent = state
                    .nodes
                    .get(&parent_id)
                    .filter(|p| !p.is_deleted)
                    .ok_or(HierarchyError::ParentNotFound(parent_id))?
                    .clone();

                if !parent.is_group {
                    return Err(HierarchyError::ParentIsLeaf(parent_id));
                }

                let segment = Self::allocate_segment(&mut state, &parent)?;
                let path = match &parent.path {
                    Some(parent_path) => parent_path.child(segment)?,
                    None => TreePath::single(segment)?,
                };

                HierarchyNode {
                    id,
                    parent_id: Some(parent_id),
                    path: Some(path),
                    depth: parent.depth + 1,
                    root_id: parent.root_id,
                    is_group: attrs.is_group,
                    name: attrs.name,
                    code,
                    is_deleted: false,
                    deleted_at: None,
                    deleted_by: None,
                }
            }
        };

        if let Some(path) = &node.path {
            state.path_index.insert(path.as_str().to_string(), id);
        }
        state.nodes.insert(id, node.clone());

        debug!(
            tree = %self.kind,
            node = %id,
            path = node.path.as_ref().map(|p| p.as_str()).unwrap_or("<root>"),
            "inserted node"
        );

        Ok(node)
    }

    /// Next sibling segment under `parent`. Counters are monotonic per
    /// parent and survive the parent being moved.
    fn allocate_segment(state: &mut TreeState, parent: &HierarchyNode) -> Result<u16> {
        let counter = state
            .next_segment
            .entry(SegmentKey::for_parent(parent))
            .or_insert(0);
        if *counter >= MAX_SEGMENT {
            return Err(HierarchyError::SegmentSpaceExhausted(Some(parent.id)));
        }
        *counter += 1;
        Ok(*counter)
    }

    /// Fetches a node by id, soft-deleted ones included: already-issued
    /// grants may still reference their paths.
    pub fn get(&self, node_id: NodeId) -> Result<HierarchyNode> {
        let state = self
            .state
            .read()
            .map_err(|e| HierarchyError::Lock(e.to_string()))?;
        state
            .nodes
            .get(&node_id)
            .cloned()
            .ok_or(HierarchyError::NodeNotFound(node_id))
    }

    /// All live root nodes, ordered by code.
    pub fn roots(&self) -> Result<Vec<HierarchyNode>> {
        let state = self
            .state
            .read()
            .map_err(|e| HierarchyError::Lock(e.to_string()))?;
        let mut roots: Vec<_> = state
            .nodes
            .values()
            .filter(|n| n.is_root() && !n.is_deleted)
            .cloned()
            .collect();
        roots.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(roots)
    }

    /// Live direct children of a node, in path order.
    pub fn children(&self, node_id: NodeId) -> Result<Vec<HierarchyNode>> {
        let state = self
            .state
            .read()
            .map_err(|e| HierarchyError::Lock(e.to_string()))?;
        if !state.nodes.contains_key(&node_id) {
            return Err(HierarchyError::NodeNotFound(node_id));
        }

        let mut children: Vec<_> = state
            .nodes
            .values()
            .filter(|n| n.parent_id == Some(node_id) && !n.is_deleted)
            .cloned()
            .collect();
        children.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(children)
    }

    /// The node plus every live descendant, in path order.
    ///
    /// For pathed nodes this is one range scan over the path index
    /// (`[path, path + '/')`); for roots it falls back to a `root_id` scan
    /// since roots carry no path.
    pub fn subtree(&self, node_id: NodeId) -> Result<Vec<HierarchyNode>> {
        let state = self
            .state
            .read()
            .map_err(|e| HierarchyError::Lock(e.to_string()))?;
        let node = state
            .nodes
            .get(&node_id)
            .ok_or(HierarchyError::NodeNotFound(node_id))?;

        let mut result = Vec::new();
        if !node.is_deleted {
            result.push(node.clone());
        }

        match &node.path {
            Some(path) => {
                let start = path.as_str().to_string();
                let end = path.range_bound();
                for (_, id) in state.path_index.range(start..end) {
                    if *id == node_id {
                        continue;
                    }
                    if let Some(descendant) = state.nodes.get(id) {
                        if !descendant.is_deleted {
                            result.push(descendant.clone());
                        }
                    }
                }
            }
            None => {
                let mut descendants: Vec<_> = state
                    .nodes
                    .values()
                    .filter(|n| n.root_id == node_id && n.id != node_id && !n.is_deleted)
                    .cloned()
                    .collect();
                descendants.sort_by(|a, b| a.path.cmp(&b.path));
                result.extend(descendants);
            }
        }

        Ok(result)
    }

    /// Ancestors from the root down to the immediate parent, derived by
    /// peeling path prefixes (the root itself is resolved via `root_id`).
    pub fn ancestors(&self, node_id: NodeId) -> Result<Vec<HierarchyNode>> {
        let state = self
            .state
            .read()
            .map_err(|e| HierarchyError::Lock(e.to_string()))?;
        let node = state
            .nodes
            .get(&node_id)
            .ok_or(HierarchyError::NodeNotFound(node_id))?;

        let mut ancestors = Vec::new();
        if node.is_root() {
            return Ok(ancestors);
        }

        let root = state
            .nodes
            .get(&node.root_id)
            .ok_or(HierarchyError::NodeNotFound(node.root_id))?;
        ancestors.push(root.clone());

        if let Some(path) = &node.path {
            for prefix in path.chain() {
                if &prefix == path {
                    break;
                }
                if let Some(id) = state.path_index.get(prefix.as_str()) {
                    if let Some(ancestor) = state.nodes.get(id) {
                        ancestors.push(ancestor.clone());
                    }
                }
            }
        }

        Ok(ancestors)
    }

    /// Re-parents `node_id` under `new_parent_id`, rewriting the path and
    /// depth of the node and every descendant in one atomic step.
    ///
    /// Overlap with another in-flight move is rejected with
    /// [`HierarchyError::ConcurrentMoveConflict`] before any lock is taken;
    /// the caller retries with backoff.
    pub fn move_node(&self, node_id: NodeId, new_parent_id: NodeId) -> Result<()> {
        if node_id == new_parent_id {
            return Err(HierarchyError::CycleDetected(node_id, new_parent_id));
        }

        // Snapshot the paths involved and register the intent. The write
        // lock below re-validates against current state; the intent only
        // exists to order overlapping movers deterministically.
        let (source, target) = {
            let state = self
                .state
                .read()
                .map_err(|e| HierarchyError::Lock(e.to_string()))?;
            let node = state
                .nodes
                .get(&node_id)
                .filter(|n| !n.is_deleted)
                .ok_or(HierarchyError::NodeNotFound(node_id))?;
            let parent = state
                .nodes
                .get(&new_parent_id)
                .filter(|n| !n.is_deleted)
                .ok_or(HierarchyError::ParentNotFound(new_parent_id))?;

            let source = node
                .path
                .clone()
                .ok_or_else(|| HierarchyError::InvariantViolation(format!(
                    "root node {} cannot be moved",
                    node_id
                )))?;
            (source, parent.path.clone())
        };

        let intent = MoveIntent { source, target };
        let _guard = self.register_intent(node_id, intent)?;

        let mut state = self
            .state
            .write()
            .map_err(|e| HierarchyError::Lock(e.to_string()))?;

        // Re-fetch under the write lock; the snapshot above may be stale.
        let node = state
            .nodes
            .get(&node_id)
            .filter(|n| !n.is_deleted)
            .ok_or(HierarchyError::NodeNotFound(node_id))?
            .clone();
        let parent = state
            .nodes
            .get(&new_parent_id)
            .filter(|n| !n.is_deleted)
            .ok_or(HierarchyError::ParentNotFound(new_parent_id))?
            .clone();

        if !parent.is_group {
            return Err(HierarchyError::ParentIsLeaf(new_parent_id));
        }

        let old_path = node
            .path
            .clone()
            .ok_or_else(|| HierarchyError::InvariantViolation(format!(
                "root node {} cannot be moved",
                node_id
            )))?;

        // Cycle check: the new parent must not sit inside the moved subtree.
        if let Some(parent_path) = &parent.path {
            if old_path.is_ancestor_or_self(parent_path) {
                return Err(HierarchyError::CycleDetected(node_id, new_parent_id));
            }
        }

        if node.parent_id == Some(new_parent_id) {
            return Ok(()); // already there
        }

        let segment = Self::allocate_segment(&mut state, &parent)?;
        let new_path = match &parent.path {
            Some(parent_path) => parent_path.child(segment)?,
            None => TreePath::single(segment)?,
        };

        // Collect the subtree's ids via the old prefix before touching the
        // index; the rewrite below must see a consistent snapshot.
        let descendant_ids: Vec<NodeId> = state
            .path_index
            .range(old_path.as_str().to_string()..old_path.range_bound())
            .filter(|(_, id)| **id != node_id)
            .map(|(_, id)| *id)
            .collect();

        let depth_delta = parent.depth as i64 + 1 - node.depth as i64;
        let new_root_id = parent.root_id;

        // Rewrite the moved node.
        {
            state.path_index.remove(old_path.as_str());
            state
                .path_index
                .insert(new_path.as_str().to_string(), node_id);
            let entry = state
                .nodes
                .get_mut(&node_id)
                .ok_or(HierarchyError::NodeNotFound(node_id))?;
            entry.parent_id = Some(new_parent_id);
            entry.path = Some(new_path.clone());
            entry.depth = parent.depth + 1;
            entry.root_id = new_root_id;
        }

        // Rewrite every descendant by prefix substitution.
        for descendant_id in &descendant_ids {
            let descendant = state
                .nodes
                .get(descendant_id)
                .ok_or(HierarchyError::NodeNotFound(*descendant_id))?;
            let descendant_path = descendant
                .path
                .clone()
                .ok_or_else(|| HierarchyError::InvariantViolation(format!(
                    "indexed node {} has no path",
                    descendant_id
                )))?;

            let rewritten = descendant_path.reroot(&old_path, &new_path)?;
            state.path_index.remove(descendant_path.as_str());
            state
                .path_index
                .insert(rewritten.as_str().to_string(), *descendant_id);

            let entry = state
                .nodes
                .get_mut(descendant_id)
                .ok_or(HierarchyError::NodeNotFound(*descendant_id))?;
            entry.depth = (entry.depth as i64 + depth_delta) as u32;
            entry.path = Some(rewritten);
            entry.root_id = new_root_id;
        }

        info!(
            tree = %self.kind,
            node = %node_id,
            new_parent = %new_parent_id,
            descendants = descendant_ids.len(),
            old_path = %old_path,
            new_path = %new_path,
            "moved subtree"
        );

        Ok(())
    }

    fn register_intent(&self, node_id: NodeId, intent: MoveIntent) -> Result<IntentGuard<'_>> {
        let mut intents = self
            .move_intents
            .lock()
            .map_err(|e| HierarchyError::Lock(e.to_string()))?;

        for (other_id, other) in intents.iter() {
            if intent.overlaps(other) {
                return Err(HierarchyError::ConcurrentMoveConflict(format!(
                    "move of {} overlaps in-flight move of {}",
                    node_id, other_id
                )));
            }
        }

        intents.insert(node_id, intent);
        Ok(IntentGuard {
            intents: &self.move_intents,
            node_id,
        })
    }

    /// Soft-deletes a node. With `cascade` the whole live subtree is marked
    /// in one atomic write; without it, live descendants abort the delete.
    /// Paths are preserved so historical grants keep resolving.
    pub fn delete(
        &self,
        node_id: NodeId,
        deleted_by: Option<UserId>,
        cascade: bool,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut state = self
            .state
            .write()
            .map_err(|e| HierarchyError::Lock(e.to_string()))?;

        let node = state
            .nodes
            .get(&node_id)
            .ok_or(HierarchyError::NodeNotFound(node_id))?
            .clone();
        if node.is_deleted {
            return Ok(()); // idempotent
        }

        let live_descendants: Vec<NodeId> = match &node.path {
            Some(path) => state
                .path_index
                .range(path.as_str().to_string()..path.range_bound())
                .filter(|(_, id)| **id != node_id)
                .filter_map(|(_, id)| state.nodes.get(id))
                .filter(|n| !n.is_deleted)
                .map(|n| n.id)
                .collect(),
            None => state
                .nodes
                .values()
                .filter(|n| n.root_id == node_id && n.id != node_id && !n.is_deleted)
                .map(|n| n.id)
                .collect(),
        };

        if !live_descendants.is_empty() && !cascade {
            return Err(HierarchyError::HasActiveDescendants(node_id));
        }

        for id in live_descendants.iter().chain(std::iter::once(&node_id)) {
            if let Some(entry) = state.nodes.get_mut(id) {
                entry.is_deleted = true;
                entry.deleted_at = Some(at);
                entry.deleted_by = deleted_by;
            }
        }

        info!(
            tree = %self.kind,
            node = %node_id,
            cascaded = live_descendants.len(),
            "soft-deleted node"
        );

        Ok(())
    }

    /// Number of live nodes.
    pub fn len(&self) -> Result<usize> {
        let state = self
            .state
            .read()
            .map_err(|e| HierarchyError::Lock(e.to_string()))?;
        Ok(state.nodes.values().filter(|n| !n.is_deleted).count())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_with_root() -> (HierarchyTree, HierarchyNode) {
        let tree = HierarchyTree::new(TreeKind::Company);
        let root = tree
            .insert(None, NodeAttrs::new("Acme Holdings", "acme"))
            .unwrap();
        (tree, root)
    }

    #[test]
    fn root_has_no_path_and_points_at_itself() {
        let (_, root) = tree_with_root();
        assert!(root.is_root());
        assert_eq!(root.depth, 0);
        assert!(root.path.is_none());
        assert_eq!(root.root_id, root.id);
        assert_eq!(root.code, "ACME"); // normalized
        root.check_invariants().unwrap();
    }

    #[test]
    fn children_get_sequential_never_reused_segments() {
        let (tree, root) = tree_with_root();

        let a = tree.insert(Some(root.id), NodeAttrs::new("A", "A")).unwrap();
        let b = tree.insert(Some(root.id), NodeAttrs::new("B", "B")).unwrap();
        assert_eq!(a.path.as_ref().unwrap().as_str(), "001");
        assert_eq!(b.path.as_ref().unwrap().as_str(), "002");

        tree.delete(b.id, None, false, Utc::now()).unwrap();
        let c = tree.insert(Some(root.id), NodeAttrs::new("C", "C")).unwrap();
        // b's segment is not recycled
        assert_eq!(c.path.as_ref().unwrap().as_str(), "003");
    }

    #[test]
    fn first_level_paths_are_unique_across_roots() {
        let tree = HierarchyTree::new(TreeKind::Company);
        let root_a = tree.insert(None, NodeAttrs::new("A", "A")).unwrap();
        let root_b = tree.insert(None, NodeAttrs::new("B", "B")).unwrap();

        let child_a = tree.insert(Some(root_a.id), NodeAttrs::new("A1", "A1")).unwrap();
        let child_b = tree.insert(Some(root_b.id), NodeAttrs::new("B1", "B1")).unwrap();

        assert_ne!(child_a.path, child_b.path);
    }

    #[test]
    fn depth_and_root_id_derive_from_parent() {
        let (tree, root) = tree_with_root();
        let child = tree.insert(Some(root.id), NodeAttrs::new("Child", "C")).unwrap();
        let grandchild = tree
            .insert(Some(child.id), NodeAttrs::new("Grandchild", "GC"))
            .unwrap();

        assert_eq!(grandchild.depth, 2);
        assert_eq!(grandchild.root_id, root.id);
        assert_eq!(
            grandchild.path.as_ref().unwrap().depth(),
            grandchild.depth
        );
        grandchild.check_invariants().unwrap();
    }

    #[test]
    fn insert_rejects_missing_and_leaf_parents() {
        let (tree, root) = tree_with_root();

        let err = tree
            .insert(Some(Uuid::new_v4()), NodeAttrs::new("X", "X"))
            .unwrap_err();
        assert!(matches!(err, HierarchyError::ParentNotFound(_)));

        let leaf = tree
            .insert(Some(root.id), NodeAttrs::new("Leaf", "L").leaf())
            .unwrap();
        let err = tree
            .insert(Some(leaf.id), NodeAttrs::new("Y", "Y"))
            .unwrap_err();
        assert!(matches!(err, HierarchyError::ParentIsLeaf(_)));
    }

    #[test]
    fn subtree_is_prefix_exact() {
        let (tree, root) = tree_with_root();
        let a = tree.insert(Some(root.id), NodeAttrs::new("A", "A")).unwrap(); // 001
        let b = tree.insert(Some(root.id), NodeAttrs::new("B", "B")).unwrap(); // 002
        let a1 = tree.insert(Some(a.id), NodeAttrs::new("A1", "A1")).unwrap(); // 001.001
        let b1 = tree.insert(Some(b.id), NodeAttrs::new("B1", "B1")).unwrap(); // 002.001

        let subtree = tree.subtree(a.id).unwrap();
        let ids: Vec<NodeId> = subtree.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![a.id, a1.id]);
        assert!(!ids.contains(&b.id));
        assert!(!ids.contains(&b1.id));

        // Root subtree spans everything live in the tree.
        let whole = tree.subtree(root.id).unwrap();
        assert_eq!(whole.len(), 5);
    }

    #[test]
    fn subtree_excludes_soft_deleted_nodes() {
        let (tree, root) = tree_with_root();
        let a = tree.insert(Some(root.id), NodeAttrs::new("A", "A")).unwrap();
        let a1 = tree.insert(Some(a.id), NodeAttrs::new("A1", "A1")).unwrap();

        tree.delete(a1.id, None, false, Utc::now()).unwrap();
        let subtree = tree.subtree(a.id).unwrap();
        assert_eq!(subtree.len(), 1);
        assert_eq!(subtree[0].id, a.id);
    }

    #[test]
    fn ancestors_run_root_to_parent() {
        let (tree, root) = tree_with_root();
        let a = tree.insert(Some(root.id), NodeAttrs::new("A", "A")).unwrap();
        let a1 = tree.insert(Some(a.id), NodeAttrs::new("A1", "A1")).unwrap();
        let a2 = tree.insert(Some(a1.id), NodeAttrs::new("A2", "A2")).unwrap();

        let ancestors = tree.ancestors(a2.id).unwrap();
        let ids: Vec<NodeId> = ancestors.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![root.id, a.id, a1.id]);

        assert!(tree.ancestors(root.id).unwrap().is_empty());
    }

    #[test]
    fn move_rewrites_node_and_descendants() {
        let (tree, root) = tree_with_root();
        let a = tree.insert(Some(root.id), NodeAttrs::new("A", "A")).unwrap(); // 001
        let b = tree.insert(Some(root.id), NodeAttrs::new("B", "B")).unwrap(); // 002
        let a1 = tree.insert(Some(a.id), NodeAttrs::new("A1", "A1")).unwrap(); // 001.001
        let a1x = tree.insert(Some(a1.id), NodeAttrs::new("A1X", "A1X")).unwrap();

        tree.move_node(a.id, b.id).unwrap();

        let moved = tree.get(a.id).unwrap();
        let b_now = tree.get(b.id).unwrap();
        assert_eq!(moved.parent_id, Some(b.id));
        assert!(b_now
            .path
            .as_ref()
            .unwrap()
            .is_ancestor_or_self(moved.path.as_ref().unwrap()));
        assert_eq!(moved.depth, b_now.depth + 1);

        // Descendants keep their relationship to the moved node.
        let a1_now = tree.get(a1.id).unwrap();
        let a1x_now = tree.get(a1x.id).unwrap();
        assert!(moved
            .path
            .as_ref()
            .unwrap()
            .is_ancestor_or_self(a1_now.path.as_ref().unwrap()));
        assert!(a1_now
            .path
            .as_ref()
            .unwrap()
            .is_ancestor_or_self(a1x_now.path.as_ref().unwrap()));
        assert_eq!(a1_now.depth, moved.depth + 1);
        assert_eq!(a1x_now.depth, moved.depth + 2);

        // Subtree query follows the new paths.
        let subtree = tree.subtree(b.id).unwrap();
        let ids: Vec<NodeId> = subtree.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![b.id, moved.id, a1.id, a1x.id]);
    }

    #[test]
    fn insert_after_move_does_not_reissue_descendant_segments() {
        let (tree, root) = tree_with_root();
        let a = tree.insert(Some(root.id), NodeAttrs::new("A", "A")).unwrap(); // 001
        let b = tree.insert(Some(root.id), NodeAttrs::new("B", "B")).unwrap(); // 002
        let a1 = tree.insert(Some(a.id), NodeAttrs::new("A1", "A1")).unwrap(); // 001.001

        // A becomes 002.001, A1 is rerooted to 002.001.001.
        tree.move_node(a.id, b.id).unwrap();
        let a1_now = tree.get(a1.id).unwrap();

        // A fresh child of the moved node must not collide with A1.
        let a2 = tree.insert(Some(a.id), NodeAttrs::new("A2", "A2")).unwrap();
        assert_ne!(a2.path, a1_now.path);
        assert_eq!(a2.path.as_ref().unwrap().last_segment(), 2);

        // Both children stay individually indexed.
        let subtree = tree.subtree(a.id).unwrap();
        assert_eq!(subtree.len(), 3);
    }

    #[test]
    fn move_into_own_subtree_fails_and_leaves_tree_unchanged() {
        let (tree, root) = tree_with_root();
        let a = tree.insert(Some(root.id), NodeAttrs::new("A", "A")).unwrap();
        let a1 = tree.insert(Some(a.id), NodeAttrs::new("A1", "A1")).unwrap();
        let before_a = tree.get(a.id).unwrap();
        let before_a1 = tree.get(a1.id).unwrap();

        let err = tree.move_node(a.id, a1.id).unwrap_err();
        assert!(matches!(err, HierarchyError::CycleDetected(_, _)));
        let err = tree.move_node(a.id, a.id).unwrap_err();
        assert!(matches!(err, HierarchyError::CycleDetected(_, _)));

        assert_eq!(tree.get(a.id).unwrap(), before_a);
        assert_eq!(tree.get(a1.id).unwrap(), before_a1);
    }

    #[test]
    fn move_to_missing_parent_fails() {
        let (tree, root) = tree_with_root();
        let a = tree.insert(Some(root.id), NodeAttrs::new("A", "A")).unwrap();
        let err = tree.move_node(a.id, Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, HierarchyError::ParentNotFound(_)));
    }

    #[test]
    fn overlapping_intents_conflict() {
        let (tree, root) = tree_with_root();
        let a = tree.insert(Some(root.id), NodeAttrs::new("A", "A")).unwrap();
        let b = tree.insert(Some(root.id), NodeAttrs::new("B", "B")).unwrap();
        let a1 = tree.insert(Some(a.id), NodeAttrs::new("A1", "A1")).unwrap();

        let a_path = tree.get(a.id).unwrap().path.unwrap();
        let b_path = tree.get(b.id).unwrap().path.unwrap();
        let a1_path = tree.get(a1.id).unwrap().path.unwrap();

        // Hold an intent as if a move of `a` under `b` were in flight.
        let intent = MoveIntent {
            source: a_path,
            target: Some(b_path),
        };
        let _guard = tree.register_intent(a.id, intent).unwrap();

        // Moving a1 (inside a's subtree) conflicts while a's move is pending.
        let err = tree.move_node(a1.id, b.id).unwrap_err();
        assert!(matches!(err, HierarchyError::ConcurrentMoveConflict(_)));
        drop(_guard);

        // Disjoint after the guard is released.
        tree.move_node(a1.id, b.id).unwrap();
        let a1_now = tree.get(a1.id).unwrap();
        assert_ne!(a1_now.path.unwrap(), a1_path);
    }

    #[test]
    fn delete_requires_cascade_for_descendants() {
        let (tree, root) = tree_with_root();
        let a = tree.insert(Some(root.id), NodeAttrs::new("A", "A")).unwrap();
        let _a1 = tree.insert(Some(a.id), NodeAttrs::new("A1", "A1")).unwrap();

        let err = tree.delete(a.id, None, false, Utc::now()).unwrap_err();
        assert!(matches!(err, HierarchyError::HasActiveDescendants(_)));

        tree.delete(a.id, None, true, Utc::now()).unwrap();
        assert_eq!(tree.subtree(root.id).unwrap().len(), 1);

        // Soft delete keeps the record (and its path) fetchable.
        let deleted = tree.get(a.id).unwrap();
        assert!(deleted.is_deleted);
        assert!(deleted.deleted_at.is_some());
        assert!(deleted.path.is_some());
    }

    #[test]
    fn concurrent_readers_see_consistent_paths() {
        use std::thread;

        let (tree, root) = tree_with_root();
        let a = tree.insert(Some(root.id), NodeAttrs::new("A", "A")).unwrap();
        let b = tree.insert(Some(root.id), NodeAttrs::new("B", "B")).unwrap();
        for i in 0..20 {
            let parent = if i % 2 == 0 { a.id } else { b.id };
            tree.insert(Some(parent), NodeAttrs::new(format!("N{i}"), format!("N{i}")))
                .unwrap();
        }

        let reader = {
            let tree = tree.clone();
            let a_id = a.id;
            thread::spawn(move || {
                for _ in 0..200 {
                    let subtree = tree.subtree(a_id).unwrap();
                    // Every returned node is inside the claimed subtree.
                    let head = subtree[0].clone();
                    for n in &subtree[1..] {
                        assert!(head
                            .path
                            .as_ref()
                            .unwrap()
                            .is_ancestor_or_self(n.path.as_ref().unwrap()));
                    }
                }
            })
        };

        for _ in 0..10 {
            tree.move_node(a.id, b.id).unwrap();
            tree.move_node(a.id, root.id).unwrap();
        }

        reader.join().unwrap();
    }
}
