//! Path-addressed views.
//!
//! A [`PartiallyDecompressedTree`] does not keep a view for every level
//! between itself and the root. It remembers one distant ascendant view and
//! the packed child offsets leading down from it; parent, offset and
//! position queries replay that path.

use crate::error::{TreeError, TreeResult};
use crate::ids::NodeId;
use crate::path::NodePath;
use crate::store::NodeStore;
use crate::view::{DecompressedTree, TreeView};
use std::cell::OnceCell;

/// A view addressed by an ascendant view and a packed path.
#[derive(Debug)]
pub struct PartiallyDecompressedTree<'a> {
    ascendant: &'a DecompressedTree<'a>,
    path: NodePath,
    node: NodeId,
    depth: u32,
    pos: OnceCell<u32>,
    position: OnceCell<u32>,
}

impl<'a> PartiallyDecompressedTree<'a> {
    /// Resolves `path` below `ascendant`.
    pub fn new(ascendant: &'a DecompressedTree<'a>, path: NodePath) -> TreeResult<Self> {
        let store = ascendant.store();
        let mut node = ascendant.node_id();
        let mut depth = ascendant.depth();
        for offset in path.offsets() {
            let compressed = store.node(node)?;
            node = compressed.child(offset).ok_or(TreeError::ChildOutOfRange {
                node,
                index: offset,
                count: compressed.child_count(),
            })?;
            depth += 1;
        }
        Ok(Self {
            ascendant,
            path,
            node,
            depth,
            pos: OnceCell::new(),
            position: OnceCell::new(),
        })
    }

    /// The ascendant the path starts from.
    pub fn ascendant(&self) -> &'a DecompressedTree<'a> {
        self.ascendant
    }

    /// Offsets from the ascendant down to this node.
    pub fn path(&self) -> &NodePath {
        &self.path
    }

    /// The parent, or `None` when this is the root of the whole view.
    ///
    /// With an empty path the parent is the ascendant's parent, itself
    /// wrapped with an empty path.
    pub fn parent(&self) -> Option<PartiallyDecompressedTree<'a>> {
        match self.path.parent() {
            Some(path) => Self::new(self.ascendant, path).ok(),
            None => self
                .ascendant
                .parent()
                .and_then(|parent| Self::new(parent, NodePath::root()).ok()),
        }
    }

    /// The view of child `index`.
    pub fn child(&self, index: usize) -> TreeResult<PartiallyDecompressedTree<'a>> {
        let compressed = self.compressed();
        let node = compressed.child(index).ok_or(TreeError::ChildOutOfRange {
            node: self.node,
            index,
            count: compressed.child_count(),
        })?;
        Ok(Self {
            ascendant: self.ascendant,
            path: self.path.child(index),
            node,
            depth: self.depth + 1,
            pos: OnceCell::new(),
            position: OnceCell::new(),
        })
    }

    /// Views of all children, in order.
    pub fn children(&self) -> impl Iterator<Item = PartiallyDecompressedTree<'a>> + '_ {
        (0..self.child_count()).filter_map(move |index| self.child(index).ok())
    }

    /// Every ancestor, nearest first, up to the root of the whole view.
    pub fn ancestors(&self) -> Vec<PartiallyDecompressedTree<'a>> {
        let mut ancestors = Vec::with_capacity(self.depth as usize);
        let mut current = self.parent();
        while let Some(ancestor) = current {
            current = ancestor.parent();
            ancestors.push(ancestor);
        }
        ancestors
    }

    /// Replays the path from the ascendant, adding up `weight` over the left
    /// siblings at every level.
    fn replay(&self, start: u32, weight: fn(&NodeStore, NodeId) -> u32) -> u32 {
        let store = self.ascendant.store();
        let mut node = self.ascendant.node_id();
        let mut value = start;
        for offset in self.path.offsets() {
            let children = store.stored(node).node.children();
            value += children[..offset]
                .iter()
                .map(|&sibling| weight(store, sibling))
                .sum::<u32>();
            node = children[offset];
        }
        value
    }
}

impl TreeView for PartiallyDecompressedTree<'_> {
    fn store(&self) -> &NodeStore {
        self.ascendant.store()
    }

    fn node_id(&self) -> NodeId {
        self.node
    }

    fn depth(&self) -> u32 {
        self.depth
    }

    fn position_in_parent(&self) -> Option<usize> {
        self.path
            .last_position()
            .or_else(|| self.ascendant.position_in_parent())
    }

    fn pos(&self) -> u32 {
        *self.pos.get_or_init(|| {
            self.replay(self.ascendant.pos(), |store, id| store.stored(id).length)
        })
    }

    fn position(&self) -> u32 {
        *self.position.get_or_init(|| {
            self.replay(self.ascendant.position(), |store, id| {
                store.stored(id).metrics.size
            })
        })
    }
}
