//! Decompressed views over shared nodes.
//!
//! A compressed node may occur at many places in a tree, so it knows neither
//! its parent nor its offset in the source. A [`DecompressedTree`] gives one
//! occurrence that context: it borrows the node from the store and links to
//! the view of its parent. Offsets and positions are derived from the
//! parent chain on first use and memoized in the view.

use crate::error::{TreeError, TreeResult};
use crate::ids::NodeId;
use crate::metrics::{SubtreeMetrics, TreeMetrics};
use crate::node::CompressedNode;
use crate::partial::PartiallyDecompressedTree;
use crate::path::NodePath;
use crate::print::debug_string;
use crate::store::NodeStore;
use std::cell::OnceCell;
use sylva_config::DebugConfig;

/// Navigation shared by direct and path-addressed views.
pub trait TreeView {
    /// The store owning the viewed node.
    fn store(&self) -> &NodeStore;

    /// The viewed node.
    fn node_id(&self) -> NodeId;

    /// Distance from the root of the view; the root has depth 0.
    fn depth(&self) -> u32;

    /// Index among the parent's children, or `None` at the root.
    fn position_in_parent(&self) -> Option<usize>;

    /// Byte offset of the first covered byte.
    fn pos(&self) -> u32;

    /// Post-order index of the first node of this subtree. See
    /// [`TreeMetrics::position`].
    fn position(&self) -> u32;

    /// The compressed node.
    fn compressed(&self) -> &CompressedNode {
        &self.store().stored(self.node_id()).node
    }

    /// Type name of the node.
    fn type_name(&self) -> &str {
        self.store().type_name(self.compressed().ty())
    }

    /// Label text, if any.
    fn label(&self) -> Option<&str> {
        self.compressed()
            .label()
            .map(|label| self.store().label_text(label))
    }

    /// Byte length of the covered text.
    fn length(&self) -> u32 {
        self.store().stored(self.node_id()).length
    }

    /// Offset one past the last covered byte.
    fn end_pos(&self) -> u32 {
        self.pos() + self.length()
    }

    /// Number of children.
    fn child_count(&self) -> usize {
        self.compressed().child_count()
    }

    /// Returns `true` if the node has no children.
    fn is_leaf(&self) -> bool {
        self.compressed().is_leaf()
    }

    /// Content metrics located at this occurrence.
    fn metrics(&self) -> TreeMetrics {
        self.subtree_metrics().located(self.depth(), self.position())
    }

    /// Content metrics of the viewed subtree.
    fn subtree_metrics(&self) -> SubtreeMetrics {
        self.store().stored(self.node_id()).metrics
    }

    /// Debug rendering of the viewed subtree with the default settings.
    fn to_tree_string(&self) -> String {
        debug_string(self.store(), self.node_id(), self.pos(), &DebugConfig::default())
            .unwrap_or_default()
    }
}

/// A view of one occurrence of a compressed node, linked to its parent view.
#[derive(Debug)]
pub struct DecompressedTree<'a> {
    store: &'a NodeStore,
    node: NodeId,
    parent: Option<&'a DecompressedTree<'a>>,
    index: usize,
    depth: u32,
    pos: OnceCell<u32>,
    position: OnceCell<u32>,
}

impl<'a> DecompressedTree<'a> {
    /// Views `node` as a root starting at offset 0.
    pub fn root(store: &'a NodeStore, node: NodeId) -> TreeResult<Self> {
        Self::root_at(store, node, 0)
    }

    /// Views `node` as a root starting at offset `pos`.
    pub fn root_at(store: &'a NodeStore, node: NodeId, pos: u32) -> TreeResult<Self> {
        store.node(node)?;
        Ok(Self {
            store,
            node,
            parent: None,
            index: 0,
            depth: 0,
            pos: OnceCell::from(pos),
            position: OnceCell::from(0),
        })
    }

    /// The parent view, or `None` at the root.
    pub fn parent(&self) -> Option<&'a DecompressedTree<'a>> {
        self.parent
    }

    /// The view of child `index`.
    pub fn child(&self, index: usize) -> TreeResult<DecompressedTree<'_>> {
        let node = self.compressed();
        let child = node.child(index).ok_or(TreeError::ChildOutOfRange {
            node: self.node,
            index,
            count: node.child_count(),
        })?;
        Ok(self.child_view(child, index))
    }

    /// Views of all children, in order.
    pub fn children(&self) -> impl Iterator<Item = DecompressedTree<'_>> + '_ {
        self.compressed()
            .children()
            .iter()
            .enumerate()
            .map(move |(index, &child)| self.child_view(child, index))
    }

    /// The node reached by following `offsets` down from this view,
    /// addressed by a packed path instead of a chain of views.
    pub fn descendant(&self, offsets: &[usize]) -> TreeResult<PartiallyDecompressedTree<'_>> {
        PartiallyDecompressedTree::new(self, NodePath::encode(offsets))
    }

    /// Like [`descendant`](Self::descendant) with an already encoded path.
    pub fn at_path(&self, path: NodePath) -> TreeResult<PartiallyDecompressedTree<'_>> {
        PartiallyDecompressedTree::new(self, path)
    }

    /// Child offsets from the root of the view down to this node.
    pub fn path_from_root(&self) -> NodePath {
        let mut offsets = Vec::with_capacity(self.depth as usize);
        let mut current = self;
        while let Some(parent) = current.parent {
            offsets.push(current.index);
            current = parent;
        }
        offsets.reverse();
        NodePath::encode(&offsets)
    }

    fn child_view(&self, node: NodeId, index: usize) -> DecompressedTree<'_> {
        DecompressedTree {
            store: self.store,
            node,
            parent: Some(self),
            index,
            depth: self.depth + 1,
            pos: OnceCell::new(),
            position: OnceCell::new(),
        }
    }

    /// Resolves a memoized value by walking up to the nearest ancestor that
    /// has it and adding each level's left-sibling contribution on the way
    /// back down.
    fn resolve(&self, cell: fn(&Self) -> &OnceCell<u32>, left_sibling: fn(&NodeStore, NodeId) -> u32) -> u32 {
        let mut pending = Vec::new();
        let mut current = self;
        let mut value = loop {
            if let Some(&value) = cell(current).get() {
                break value;
            }
            match current.parent {
                Some(parent) => {
                    pending.push(current);
                    current = parent;
                }
                None => break 0,
            }
        };
        while let Some(view) = pending.pop() {
            if let Some(parent) = view.parent {
                let siblings = &parent.compressed().children()[..view.index];
                value += siblings
                    .iter()
                    .map(|&sibling| left_sibling(view.store, sibling))
                    .sum::<u32>();
            }
            let _ = cell(view).set(value);
        }
        value
    }
}

impl TreeView for DecompressedTree<'_> {
    fn store(&self) -> &NodeStore {
        self.store
    }

    fn node_id(&self) -> NodeId {
        self.node
    }

    fn depth(&self) -> u32 {
        self.depth
    }

    fn position_in_parent(&self) -> Option<usize> {
        self.parent.map(|_| self.index)
    }

    fn pos(&self) -> u32 {
        self.resolve(|view| &view.pos, |store, id| store.stored(id).length)
    }

    fn position(&self) -> u32 {
        self.resolve(|view| &view.position, |store, id| store.stored(id).metrics.size)
    }
}
