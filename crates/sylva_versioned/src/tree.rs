//! The versioned tree model.
//!
//! A versioned tree superimposes every recorded state of a syntax tree.
//! Nodes are never physically removed: a removal stamps the node with the
//! version at which it stopped existing, and an insertion stamps the version
//! at which it appeared. The physical children of a node are the union over
//! all versions, kept in an order of which every version's child list is a
//! subsequence.

use crate::error::{VersionedError, VersionedResult};
use crate::ids::VNodeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use sylva_common::{Label, Type, Version};
use sylva_tree::{Arena, NodeId, NodeStore, TreeView};

/// One node of a [`VersionedTree`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedNode {
    /// Syntactic category, a symbol of the store the tree was built from.
    pub ty: Type,
    /// Label, a symbol of the store the tree was built from.
    pub label: Option<Label>,
    /// Byte offset in the source of the version that inserted the node.
    pub pos: u32,
    /// Byte length in that source.
    pub length: u32,
    /// First version at which the node exists; `None` means "always".
    pub insert_version: Option<Version>,
    /// First version at which the node no longer exists; `None` means
    /// "still present".
    pub remove_version: Option<Version>,
    pub(crate) children: Vec<VNodeId>,
    pub(crate) parent: Option<VNodeId>,
}

impl VersionedNode {
    pub(crate) fn new(ty: Type, label: Option<Label>, pos: u32, length: u32, insert_version: Option<Version>) -> Self {
        Self {
            ty,
            label,
            pos,
            length,
            insert_version,
            remove_version: None,
            children: Vec::new(),
            parent: None,
        }
    }

    /// Returns `true` if the node is part of the tree at `version`, i.e.
    /// `insert <= version < remove` with missing bounds left open.
    pub fn exists_at(&self, version: Version) -> bool {
        self.insert_version.is_none_or(|insert| version >= insert)
            && self.remove_version.is_none_or(|remove| version < remove)
    }

    /// Visibility under an optional version: an unversioned query only sees
    /// nodes that were never stamped with an insert version.
    pub(crate) fn visible_at(&self, version: Option<Version>) -> bool {
        match version {
            Some(version) => self.exists_at(version),
            None => self.insert_version.is_none(),
        }
    }

    /// Returns `true` if the node has not been removed.
    pub fn is_current(&self) -> bool {
        self.remove_version.is_none()
    }

    /// Every physical child, in physical order.
    pub fn all_children(&self) -> &[VNodeId] {
        &self.children
    }

    /// The parent, or `None` for the root and for detached subtrees.
    pub fn parent(&self) -> Option<VNodeId> {
        self.parent
    }
}

/// A syntax tree holding all of its recorded versions at once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionedTree {
    nodes: Arena<VNodeId, VersionedNode>,
    root: VNodeId,
    versions: BTreeSet<Version>,
}

impl VersionedTree {
    /// Creates a versioned tree from a stored plain tree, stamping every
    /// node as inserted at `version`.
    pub fn from_plain(store: &NodeStore, root: NodeId, pos: u32, version: Version) -> VersionedResult<Self> {
        let mut tree = Self {
            nodes: Arena::new(),
            root: VNodeId::from_raw(0),
            versions: BTreeSet::from([version]),
        };
        tree.root = tree.materialize(store, root, pos, Some(version))?;
        Ok(tree)
    }

    /// Creates a versioned tree from the subtree under a view.
    pub fn from_view(view: &impl TreeView, version: Version) -> VersionedResult<Self> {
        Self::from_plain(view.store(), view.node_id(), view.pos(), version)
    }

    /// Reassembles a tree from its parts, as read back from a snapshot.
    pub(crate) fn from_parts(nodes: Arena<VNodeId, VersionedNode>, root: VNodeId, versions: BTreeSet<Version>) -> Self {
        Self { nodes, root, versions }
    }

    pub(crate) fn nodes(&self) -> &Arena<VNodeId, VersionedNode> {
        &self.nodes
    }

    /// The root node.
    pub fn root(&self) -> VNodeId {
        self.root
    }

    /// Number of physical nodes, over all versions.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always `false`: a tree has at least its root.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the node with the given ID.
    pub fn node(&self, id: VNodeId) -> VersionedResult<&VersionedNode> {
        self.nodes.get(id).ok_or(VersionedError::NoStorage { node: id })
    }

    fn node_mut(&mut self, id: VNodeId) -> VersionedResult<&mut VersionedNode> {
        self.nodes.get_mut(id).ok_or(VersionedError::NoStorage { node: id })
    }

    /// Recorded versions in increasing order.
    pub fn versions(&self) -> impl Iterator<Item = Version> + '_ {
        self.versions.iter().copied()
    }

    /// Returns `true` if `version` was recorded.
    pub fn has_version(&self, version: Version) -> bool {
        self.versions.contains(&version)
    }

    /// The latest recorded version.
    pub fn latest_version(&self) -> Option<Version> {
        self.versions.last().copied()
    }

    pub(crate) fn record_version(&mut self, version: Version) {
        self.versions.insert(version);
    }

    /// Copies a stored plain subtree into this tree as a detached subtree
    /// whose nodes are all stamped with `version`. Returns its root.
    pub fn materialize(
        &mut self,
        store: &NodeStore,
        plain: NodeId,
        pos: u32,
        version: Option<Version>,
    ) -> VersionedResult<VNodeId> {
        let mut stack = vec![(plain, pos, None::<VNodeId>)];
        let mut root = None;
        while let Some((id, pos, parent)) = stack.pop() {
            let node = store.node(id)?;
            let length = store.length(id)?;
            let created = self
                .nodes
                .alloc(VersionedNode::new(node.ty(), node.label(), pos, length, version));
            match parent {
                Some(parent) => self.attach_last(parent, created),
                None => root = Some(created),
            }
            let mut child_pos = pos;
            let mut pending = Vec::with_capacity(node.child_count());
            for &child in node.children() {
                pending.push((child, child_pos, Some(created)));
                child_pos += store.length(child)?;
            }
            stack.extend(pending.into_iter().rev());
        }
        root.ok_or(VersionedError::Tree(sylva_tree::TreeError::UnknownNode { node: plain }))
    }

    fn attach_last(&mut self, parent: VNodeId, child: VNodeId) {
        self.nodes[parent].children.push(child);
        self.nodes[child].parent = Some(parent);
    }

    /// Returns `true` if the node exists at `version`.
    pub fn exists_at(&self, id: VNodeId, version: Version) -> VersionedResult<bool> {
        Ok(self.node(id)?.exists_at(version))
    }

    /// Children that have not been removed.
    pub fn children(&self, id: VNodeId) -> VersionedResult<Vec<VNodeId>> {
        let node = self.node(id)?;
        Ok(node
            .children
            .iter()
            .copied()
            .filter(|&child| self.nodes[child].is_current())
            .collect())
    }

    /// Children that exist at `version`.
    pub fn children_at(&self, id: VNodeId, version: Version) -> VersionedResult<Vec<VNodeId>> {
        let node = self.node(id)?;
        Ok(node
            .children
            .iter()
            .copied()
            .filter(|&child| self.nodes[child].exists_at(version))
            .collect())
    }

    /// Every physical child, whatever its stamps.
    pub fn all_children(&self, id: VNodeId) -> VersionedResult<&[VNodeId]> {
        Ok(self.node(id)?.all_children())
    }

    /// The parent of a node.
    pub fn parent(&self, id: VNodeId) -> VersionedResult<Option<VNodeId>> {
        Ok(self.node(id)?.parent)
    }

    /// Index of `child` among the children of `parent` visible at `version`
    /// (see [`VersionedNode::exists_at`]; `None` sees only unstamped nodes).
    /// Returns `None` if `child` is not a physical child of `parent`.
    pub fn child_position(
        &self,
        parent: VNodeId,
        child: VNodeId,
        version: Option<Version>,
    ) -> VersionedResult<Option<usize>> {
        let mut index = 0;
        for &current in &self.node(parent)?.children {
            if current == child {
                return Ok(Some(index));
            }
            if self.nodes[current].visible_at(version) {
                index += 1;
            }
        }
        Ok(None)
    }

    /// Splices a detached subtree under `parent`.
    ///
    /// `position` counts the children visible at the child's insert version.
    /// The child is placed physically right before the first child reached
    /// once `position` visible children have been passed, or last.
    pub fn insert_child(&mut self, parent: VNodeId, child: VNodeId, position: usize) -> VersionedResult<()> {
        let child_node = self.node(child)?;
        if child_node.parent.is_some() || child == self.root {
            return Err(VersionedError::AlreadyAttached { node: child });
        }
        let version = child_node.insert_version;
        self.node(parent)?;

        let mut ancestor = Some(parent);
        while let Some(id) = ancestor {
            if id == child {
                return Err(VersionedError::WouldCycle { node: child, parent });
            }
            ancestor = self.nodes[id].parent;
        }

        let siblings = &self.nodes[parent].children;
        let mut visible = 0;
        let mut slot = None;
        for (index, &sibling) in siblings.iter().enumerate() {
            if visible == position {
                slot = Some(index);
                break;
            }
            if self.nodes[sibling].visible_at(version) {
                visible += 1;
            }
        }
        let slot = match slot {
            Some(slot) => slot,
            None if visible == position => siblings.len(),
            None => {
                return Err(VersionedError::PositionOutOfRange {
                    parent,
                    position,
                    available: visible,
                })
            }
        };
        self.node_mut(parent)?.children.insert(slot, child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// Tombstones `id` at `version`, together with every descendant that is
    /// still present. Nodes removed earlier keep their stamp. Returns how
    /// many nodes were tombstoned.
    pub fn delete(&mut self, id: VNodeId, version: Version) -> VersionedResult<usize> {
        self.node(id)?;
        let mut removed = 0;
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = &mut self.nodes[current];
            if node.remove_version.is_some() {
                continue;
            }
            node.remove_version = Some(version);
            removed += 1;
            stack.extend(node.children.iter().copied());
        }
        Ok(removed)
    }

    /// Every physical descendant of `id` in pre-order, excluding `id`.
    pub fn descendants(&self, id: VNodeId) -> VersionedResult<Vec<VNodeId>> {
        let mut out = Vec::new();
        let mut stack: Vec<VNodeId> = self.node(id)?.children.iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.nodes[current].children.iter().rev().copied());
        }
        Ok(out)
    }

    /// Copies the subtree under `id`, stamps included, as a detached subtree.
    pub fn deep_copy(&mut self, id: VNodeId) -> VersionedResult<VNodeId> {
        self.copy_subtree(id, |_| true, |node| node.clone())
    }

    /// Copies the present part of the subtree under `id` as a detached
    /// subtree stamped as inserted at `version`, giving the copy of `id`
    /// the label `label`. Returns the copy's root and the pairs
    /// (original, copy) of every copied node.
    pub(crate) fn relabeled_copy(
        &mut self,
        id: VNodeId,
        label: Option<Label>,
        version: Version,
    ) -> VersionedResult<(VNodeId, Vec<(VNodeId, VNodeId)>)> {
        let mut pairs = Vec::new();
        let root = self.copy_subtree_tracked(
            id,
            VersionedNode::is_current,
            |node| VersionedNode::new(node.ty, node.label, node.pos, node.length, Some(version)),
            &mut pairs,
        )?;
        self.nodes[root].label = label;
        Ok((root, pairs))
    }

    pub(crate) fn relabel(&mut self, id: VNodeId, label: Option<Label>) -> VersionedResult<()> {
        self.node_mut(id)?.label = label;
        Ok(())
    }

    fn copy_subtree(
        &mut self,
        id: VNodeId,
        keep: fn(&VersionedNode) -> bool,
        copy: impl Fn(&VersionedNode) -> VersionedNode,
    ) -> VersionedResult<VNodeId> {
        let mut pairs = Vec::new();
        self.copy_subtree_tracked(id, keep, copy, &mut pairs)
    }

    fn copy_subtree_tracked(
        &mut self,
        id: VNodeId,
        keep: fn(&VersionedNode) -> bool,
        copy: impl Fn(&VersionedNode) -> VersionedNode,
        pairs: &mut Vec<(VNodeId, VNodeId)>,
    ) -> VersionedResult<VNodeId> {
        self.node(id)?;
        let mut root = None;
        let mut stack = vec![(id, None::<VNodeId>)];
        while let Some((original, parent)) = stack.pop() {
            let source = &self.nodes[original];
            let mut fresh = copy(source);
            fresh.children = Vec::new();
            fresh.parent = None;
            let kept: Vec<VNodeId> = source
                .children
                .iter()
                .rev()
                .copied()
                .filter(|&child| keep(&self.nodes[child]))
                .collect();
            let created = self.nodes.alloc(fresh);
            pairs.push((original, created));
            match parent {
                Some(parent) => self.attach_last(parent, created),
                None => root = Some(created),
            }
            stack.extend(kept.into_iter().map(|child| (child, Some(created))));
        }
        root.ok_or(VersionedError::NoStorage { node: id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sylva_tree::{ParsedNode, TreeBuilder};

    fn store_with_block() -> (NodeStore, NodeId) {
        // {a b}
        let source = "{a b}";
        let parsed = ParsedNode::branch(
            "block",
            0,
            5,
            vec![
                ParsedNode::token("{", 0),
                ParsedNode::labeled("identifier", "a", 1),
                ParsedNode::labeled("identifier", "b", 3),
                ParsedNode::token("}", 4),
            ],
        );
        let mut store = NodeStore::new();
        let root = TreeBuilder::new(&mut store, source).build(&parsed).unwrap().node;
        (store, root)
    }

    fn labels(tree: &VersionedTree, store: &NodeStore, ids: &[VNodeId]) -> Vec<String> {
        ids.iter()
            .map(|&id| {
                let node = tree.node(id).unwrap();
                match node.label {
                    Some(label) => store.label_text(label).to_string(),
                    None => store.type_name(node.ty).to_string(),
                }
            })
            .collect()
    }

    #[test]
    fn existence_is_half_open() {
        let mut node = VersionedNode::new(Type::from_raw(0), None, 0, 0, Some(Version::new(2)));
        node.remove_version = Some(Version::new(5));
        let at = |v| node.exists_at(Version::new(v));
        assert_eq!((at(1), at(2), at(4), at(5)), (false, true, true, false));
    }

    #[test]
    fn unstamped_node_always_exists() {
        let node = VersionedNode::new(Type::from_raw(0), None, 0, 0, None);
        assert!(node.exists_at(Version::new(0)));
        assert!(node.visible_at(None));
        assert!(node.visible_at(Some(Version::new(9))));
    }

    #[test]
    fn from_plain_copies_structure() {
        let (store, root) = store_with_block();
        let tree = VersionedTree::from_plain(&store, root, 0, Version::new(1)).unwrap();
        let children = tree.children(tree.root()).unwrap();
        assert_eq!(labels(&tree, &store, &children), vec!["{", "a", " ", "b", "}"]);
        let b = tree.node(children[3]).unwrap();
        assert_eq!((b.pos, b.length), (3, 1));
        assert_eq!(b.insert_version, Some(Version::new(1)));
        assert_eq!(tree.parent(children[3]).unwrap(), Some(tree.root()));
        assert_eq!(tree.versions().collect::<Vec<_>>(), vec![Version::new(1)]);
        assert_eq!(tree.len(), 6);
    }

    #[test]
    fn insert_counts_children_visible_at_insert_version() {
        let (mut store, root) = store_with_block();
        let mut tree = VersionedTree::from_plain(&store, root, 0, Version::new(1)).unwrap();
        let v2 = Version::new(2);
        let a = tree.children(tree.root()).unwrap()[1];
        tree.delete(a, v2).unwrap();

        let c = store.intern_leaf("identifier", "c").unwrap().node;
        let created = tree.materialize(&store, c, 1, Some(v2)).unwrap();
        // At version 2 the children are "{", " ", "b", "}": position 1 is after "{".
        tree.insert_child(tree.root(), created, 1).unwrap();

        let at2 = tree.children_at(tree.root(), v2).unwrap();
        assert_eq!(labels(&tree, &store, &at2), vec!["{", "c", " ", "b", "}"]);
        let at1 = tree.children_at(tree.root(), Version::new(1)).unwrap();
        assert_eq!(labels(&tree, &store, &at1), vec!["{", "a", " ", "b", "}"]);
        assert_eq!(tree.child_position(tree.root(), created, Some(v2)).unwrap(), Some(1));
    }

    #[test]
    fn insert_at_end_and_out_of_range() {
        let (mut store, root) = store_with_block();
        let mut tree = VersionedTree::from_plain(&store, root, 0, Version::new(1)).unwrap();
        let c = store.intern_leaf("identifier", "c").unwrap().node;
        let first = tree.materialize(&store, c, 5, Some(Version::new(2))).unwrap();
        tree.insert_child(tree.root(), first, 5).unwrap();
        assert_eq!(tree.all_children(tree.root()).unwrap().last(), Some(&first));

        let second = tree.materialize(&store, c, 5, Some(Version::new(2))).unwrap();
        assert_eq!(
            tree.insert_child(tree.root(), second, 9).unwrap_err(),
            VersionedError::PositionOutOfRange {
                parent: tree.root(),
                position: 9,
                available: 6,
            }
        );
    }

    #[test]
    fn insert_rejects_attached_nodes_and_cycles() {
        let (store, root) = store_with_block();
        let mut tree = VersionedTree::from_plain(&store, root, 0, Version::new(1)).unwrap();
        let a = tree.children(tree.root()).unwrap()[1];
        assert_eq!(
            tree.insert_child(tree.root(), a, 0).unwrap_err(),
            VersionedError::AlreadyAttached { node: a }
        );

        let copy = tree.deep_copy(tree.root()).unwrap();
        let inner = tree.all_children(copy).unwrap()[0];
        assert_eq!(
            tree.insert_child(inner, copy, 0).unwrap_err(),
            VersionedError::WouldCycle {
                node: copy,
                parent: inner
            }
        );
    }

    #[test]
    fn delete_cascades_to_present_descendants() {
        let (store, root) = store_with_block();
        let mut tree = VersionedTree::from_plain(&store, root, 0, Version::new(1)).unwrap();
        let b = tree.children(tree.root()).unwrap()[3];
        tree.delete(b, Version::new(2)).unwrap();
        let removed = tree.delete(tree.root(), Version::new(3)).unwrap();
        assert_eq!(removed, 5);
        // "b" keeps the stamp of its own removal.
        assert_eq!(tree.node(b).unwrap().remove_version, Some(Version::new(2)));
        assert!(!tree.exists_at(tree.root(), Version::new(3)).unwrap());
        assert!(tree.exists_at(tree.root(), Version::new(2)).unwrap());
        assert!(tree.children(tree.root()).unwrap().is_empty());
        assert_eq!(tree.all_children(tree.root()).unwrap().len(), 5);
    }

    #[test]
    fn descendants_in_pre_order() {
        let (store, root) = store_with_block();
        let tree = VersionedTree::from_plain(&store, root, 0, Version::new(1)).unwrap();
        let all = tree.descendants(tree.root()).unwrap();
        assert_eq!(labels(&tree, &store, &all), vec!["{", "a", " ", "b", "}"]);
    }

    #[test]
    fn deep_copy_keeps_stamps() {
        let (store, root) = store_with_block();
        let mut tree = VersionedTree::from_plain(&store, root, 0, Version::new(1)).unwrap();
        let a = tree.children(tree.root()).unwrap()[1];
        tree.delete(a, Version::new(2)).unwrap();
        let copy = tree.deep_copy(tree.root()).unwrap();
        assert_eq!(tree.parent(copy).unwrap(), None);
        let copied = tree.all_children(copy).unwrap().to_vec();
        assert_eq!(copied.len(), 5);
        assert_eq!(tree.node(copied[1]).unwrap().remove_version, Some(Version::new(2)));
        assert_eq!(tree.parent(copied[1]).unwrap(), Some(copy));
    }

    #[test]
    fn relabeled_copy_skips_removed_nodes() {
        let (mut store, root) = store_with_block();
        let mut tree = VersionedTree::from_plain(&store, root, 0, Version::new(1)).unwrap();
        let a = tree.children(tree.root()).unwrap()[1];
        tree.delete(a, Version::new(2)).unwrap();
        let label = store.label_symbol("main");
        let (copy, pairs) = tree.relabeled_copy(tree.root(), label, Version::new(3)).unwrap();
        assert_eq!(tree.node(copy).unwrap().label, label);
        assert_eq!(tree.node(copy).unwrap().insert_version, Some(Version::new(3)));
        assert_eq!(tree.all_children(copy).unwrap().len(), 4);
        assert_eq!(pairs.len(), 5);
        assert_eq!(pairs[0], (tree.root(), copy));
    }

    #[test]
    fn unknown_node_has_no_storage() {
        let (store, root) = store_with_block();
        let tree = VersionedTree::from_plain(&store, root, 0, Version::new(1)).unwrap();
        let ghost = VNodeId::from_raw(99);
        assert_eq!(
            tree.children(ghost).unwrap_err(),
            VersionedError::NoStorage { node: ghost }
        );
        assert!(tree.exists_at(ghost, Version::new(1)).is_err());
    }
}
