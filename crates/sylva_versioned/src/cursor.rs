//! Zipper-style tree cursors.
//!
//! A cursor sits on one node and moves one step at a time: to the first
//! child, to the next sibling or to the parent. Cursors do not borrow the
//! tree they walk; every move takes it as an argument, so the tree can be
//! modified between moves as long as the modification does not affect the
//! part of the tree the cursor can see.

use crate::ids::VNodeId;
use crate::tree::VersionedTree;
use sylva_common::Version;
use sylva_tree::{NodeId, NodePath, NodeStore};

/// One cursor move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// To the first child.
    DownLeft,
    /// To the next sibling.
    Right,
    /// To the parent.
    Up,
}

/// A cursor over a tree of type `T`.
///
/// A move that is not possible returns `false` and leaves the cursor
/// where it was.
pub trait TreeCursor<T: ?Sized> {
    /// The node handle type.
    type Node: Copy;

    /// The node under the cursor.
    fn node(&self) -> Self::Node;

    /// Moves to the first child.
    fn down_left(&mut self, tree: &T) -> bool;

    /// Moves to the next sibling.
    fn right(&mut self, tree: &T) -> bool;

    /// Moves to the parent.
    fn up(&mut self, tree: &T) -> bool;

    /// Performs `step`.
    fn step(&mut self, step: Step, tree: &T) -> bool {
        match step {
            Step::DownLeft => self.down_left(tree),
            Step::Right => self.right(tree),
            Step::Up => self.up(tree),
        }
    }
}

/// A cursor over a stored plain tree.
#[derive(Debug, Clone)]
pub struct PlainCursor {
    // (node, index in parent, byte offset)
    stack: Vec<(NodeId, usize, u32)>,
}

impl PlainCursor {
    /// Places a cursor on `root`, which starts at byte offset `pos`.
    pub fn new(root: NodeId, pos: u32) -> Self {
        Self {
            stack: vec![(root, 0, pos)],
        }
    }

    /// Child offsets from the root to the current node.
    pub fn path(&self) -> NodePath {
        let offsets: Vec<usize> = self.stack[1..].iter().map(|&(_, index, _)| index).collect();
        NodePath::encode(&offsets)
    }

    /// Distance from the root; the root has depth 0.
    pub fn depth(&self) -> usize {
        self.stack.len() - 1
    }

    /// Byte offset of the current node.
    pub fn pos(&self) -> u32 {
        self.stack.last().map_or(0, |&(_, _, pos)| pos)
    }
}

impl TreeCursor<NodeStore> for PlainCursor {
    type Node = NodeId;

    fn node(&self) -> NodeId {
        self.stack[self.stack.len() - 1].0
    }

    fn down_left(&mut self, store: &NodeStore) -> bool {
        let pos = self.pos();
        match store.try_node(self.node()).and_then(|node| node.child(0)) {
            Some(child) => {
                self.stack.push((child, 0, pos));
                true
            }
            None => false,
        }
    }

    fn right(&mut self, store: &NodeStore) -> bool {
        let depth = self.stack.len();
        if depth < 2 {
            return false;
        }
        let (current, index, pos) = self.stack[depth - 1];
        let parent = self.stack[depth - 2].0;
        let sibling = store.try_node(parent).and_then(|node| node.child(index + 1));
        match (sibling, store.length(current)) {
            (Some(sibling), Ok(length)) => {
                self.stack[depth - 1] = (sibling, index + 1, pos + length);
                true
            }
            _ => false,
        }
    }

    fn up(&mut self, _store: &NodeStore) -> bool {
        if self.stack.len() < 2 {
            return false;
        }
        self.stack.pop();
        true
    }
}

/// A cursor over the view of a versioned tree at one version.
#[derive(Debug, Clone)]
pub struct VersionedCursor {
    version: Version,
    stack: Vec<VNodeId>,
}

impl VersionedCursor {
    /// Places a cursor on `root`, seeing only nodes that exist at `version`.
    pub fn new(root: VNodeId, version: Version) -> Self {
        Self {
            version,
            stack: vec![root],
        }
    }

    /// The version the cursor sees.
    pub fn version(&self) -> Version {
        self.version
    }

    fn first_visible_from(&self, tree: &VersionedTree, siblings: &[VNodeId]) -> Option<VNodeId> {
        siblings
            .iter()
            .copied()
            .find(|&id| tree.exists_at(id, self.version).unwrap_or(false))
    }
}

impl TreeCursor<VersionedTree> for VersionedCursor {
    type Node = VNodeId;

    fn node(&self) -> VNodeId {
        self.stack[self.stack.len() - 1]
    }

    fn down_left(&mut self, tree: &VersionedTree) -> bool {
        let Ok(children) = tree.all_children(self.node()) else {
            return false;
        };
        match self.first_visible_from(tree, children) {
            Some(child) => {
                self.stack.push(child);
                true
            }
            None => false,
        }
    }

    fn right(&mut self, tree: &VersionedTree) -> bool {
        let depth = self.stack.len();
        if depth < 2 {
            return false;
        }
        let current = self.stack[depth - 1];
        let Ok(siblings) = tree.all_children(self.stack[depth - 2]) else {
            return false;
        };
        let Some(index) = siblings.iter().position(|&id| id == current) else {
            return false;
        };
        match self.first_visible_from(tree, &siblings[index + 1..]) {
            Some(sibling) => {
                self.stack[depth - 1] = sibling;
                true
            }
            None => false,
        }
    }

    fn up(&mut self, _tree: &VersionedTree) -> bool {
        if self.stack.len() < 2 {
            return false;
        }
        self.stack.pop();
        true
    }
}

/// Two cursors moved in lockstep.
///
/// Every move is attempted on both sides. If exactly one side succeeds the
/// pair is invalid from then on and no further move succeeds.
#[derive(Debug, Clone)]
pub struct BiCursor<A, B> {
    left: A,
    right: B,
    invalid: bool,
}

impl<A, B> BiCursor<A, B> {
    /// Pairs two cursors positioned on corresponding nodes.
    pub fn new(left: A, right: B) -> Self {
        Self {
            left,
            right,
            invalid: false,
        }
    }

    /// The left cursor.
    pub fn left(&self) -> &A {
        &self.left
    }

    /// The right cursor.
    pub fn right(&self) -> &B {
        &self.right
    }

    /// Returns `true` once the two sides have diverged.
    pub fn is_invalid(&self) -> bool {
        self.invalid
    }

    /// Moves both cursors.
    pub fn step<TA, TB>(&mut self, step: Step, left_tree: &TA, right_tree: &TB) -> bool
    where
        TA: ?Sized,
        TB: ?Sized,
        A: TreeCursor<TA>,
        B: TreeCursor<TB>,
    {
        if self.invalid {
            return false;
        }
        let moved_left = self.left.step(step, left_tree);
        let moved_right = self.right.step(step, right_tree);
        if moved_left != moved_right {
            self.invalid = true;
            return false;
        }
        moved_left
    }
}

/// Drives a cursor through a pre-order traversal.
///
/// The walker owns no cursor; each call is given the move function, which
/// lets the caller touch the walked trees between calls.
#[derive(Debug, Clone, Default)]
pub struct PreOrderWalker {
    skip_children: bool,
    finished: bool,
}

impl PreOrderWalker {
    /// Creates a walker positioned on the root.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next call to [`next`](Self::next) skip the descendants of
    /// the current node.
    pub fn skip(&mut self) {
        self.skip_children = true;
    }

    /// Returns `true` once the traversal is over.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Advances to the next node in pre-order. Returns `false` when the
    /// traversal is over.
    pub fn next(&mut self, mut step: impl FnMut(Step) -> bool) -> bool {
        if self.finished {
            return false;
        }
        let skip = std::mem::take(&mut self.skip_children);
        if !skip && step(Step::DownLeft) {
            return true;
        }
        loop {
            if step(Step::Right) {
                return true;
            }
            if !step(Step::Up) {
                self.finished = true;
                return false;
            }
        }
    }
}
