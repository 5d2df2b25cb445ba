//! Content-derived subtree metrics.
//!
//! Hashes are positional polynomials over the pre-order sequence of
//! enter/leave events of a subtree, evaluated with `BASE = 33` in wrapping
//! 32-bit arithmetic. A child's hash is shifted by `BASE^(2·sizeBefore + 1)`
//! where `sizeBefore` is the summed size of its left siblings, so the whole
//! subtree hash can be accumulated child by child without revisiting
//! descendants.

use crate::error::{TreeError, TreeResult};
use crate::ids::NodeId;
use crate::store::{Interned, NodeStore};
use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::Xxh3;

/// Base of the positional hash polynomial.
pub const BASE: u32 = 33;

/// Returns `BASE^exponent` in wrapping arithmetic.
pub fn hash_factor(exponent: u32) -> u32 {
    BASE.wrapping_pow(exponent)
}

/// The two events a node contributes to its subtree hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Emitted before the children.
    Enter,
    /// Emitted after the children.
    Leave,
}

impl Event {
    fn tag(self) -> u8 {
        match self {
            Self::Enter => b'[',
            Self::Leave => b']',
        }
    }
}

/// Hashes one event of a node. `label` is `None` for the structure hash and
/// for unlabeled nodes, which therefore hash alike.
pub fn event_hash(type_name: &str, label: Option<&str>, event: Event) -> u32 {
    let mut hasher = Xxh3::new();
    hasher.update(type_name.as_bytes());
    hasher.update(&[0]);
    if let Some(label) = label {
        hasher.update(&[1]);
        hasher.update(label.as_bytes());
    }
    hasher.update(&[event.tag()]);
    let digest = hasher.digest();
    (digest ^ (digest >> 32)) as u32
}

/// Metrics of a subtree that depend only on its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubtreeMetrics {
    /// Number of nodes in the subtree.
    pub size: u32,
    /// Length of the longest root-to-leaf path, counted in nodes.
    pub height: u32,
    /// Label- and order-sensitive hash. Zero for whitespace padding leaves
    /// when the store hashes whitespace insensitively.
    pub hash: u32,
    /// Like `hash`, but whitespace padding is always hashed.
    pub syntax_hash: u32,
    /// Label-insensitive hash.
    pub structure_hash: u32,
}

impl SubtreeMetrics {
    /// Attaches the contextual part of the metrics.
    pub fn located(self, depth: u32, position: u32) -> TreeMetrics {
        TreeMetrics {
            size: self.size,
            height: self.height,
            hash: self.hash,
            syntax_hash: self.syntax_hash,
            structure_hash: self.structure_hash,
            depth,
            position,
        }
    }
}

/// Metrics of a node located in a decompressed tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TreeMetrics {
    /// Number of nodes in the subtree.
    pub size: u32,
    /// Length of the longest root-to-leaf path, counted in nodes.
    pub height: u32,
    /// Label- and order-sensitive hash.
    pub hash: u32,
    /// Whitespace-sensitive hash.
    pub syntax_hash: u32,
    /// Label-insensitive hash.
    pub structure_hash: u32,
    /// Distance from the root of the view (the root has depth 0).
    pub depth: u32,
    /// Number of nodes that finish before this subtree starts in a post-order
    /// walk of the view: the left siblings' subtrees at every level above.
    /// The node's own descendants are not counted, so its post-order index is
    /// `position + size - 1` and a first child shares its parent's position.
    pub position: u32,
}

impl TreeMetrics {
    /// Drops the contextual part.
    pub fn subtree(&self) -> SubtreeMetrics {
        SubtreeMetrics {
            size: self.size,
            height: self.height,
            hash: self.hash,
            syntax_hash: self.syntax_hash,
            structure_hash: self.structure_hash,
        }
    }
}

/// Collects the children of a node under construction together with the
/// partial sums needed for its metrics.
///
/// Children are pushed in order; each push folds the child's hashes into
/// the polynomial at the offset given by the children pushed so far.
#[derive(Debug, Clone, Default)]
pub struct ChildAccumulator {
    sum_size: u32,
    max_height: u32,
    hash: u32,
    syntax_hash: u32,
    structure_hash: u32,
    children: Vec<NodeId>,
}

impl ChildAccumulator {
    /// Creates an empty accumulator, i.e. the accumulator of a leaf.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty accumulator with room for `capacity` children.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            children: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Appends the next child.
    pub fn push(&mut self, child: Interned) {
        let factor = hash_factor(2 * self.sum_size + 1);
        let metrics = child.metrics;
        self.hash = self.hash.wrapping_add(metrics.hash.wrapping_mul(factor));
        self.syntax_hash = self
            .syntax_hash
            .wrapping_add(metrics.syntax_hash.wrapping_mul(factor));
        self.structure_hash = self
            .structure_hash
            .wrapping_add(metrics.structure_hash.wrapping_mul(factor));
        self.sum_size += metrics.size;
        self.max_height = self.max_height.max(metrics.height);
        self.children.push(child.node);
    }

    /// Children pushed so far, in order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Number of children pushed so far.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Returns `true` if no child was pushed.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Summed size of the children pushed so far.
    pub fn sum_size(&self) -> u32 {
        self.sum_size
    }

    pub(crate) fn into_children(self) -> Vec<NodeId> {
        self.children
    }

    /// Closes the polynomial with the node's own enter and leave events.
    ///
    /// `zero_hash` replaces the label-sensitive hash by zero; it is set for
    /// whitespace padding under whitespace-insensitive hashing.
    pub fn finish(&self, type_name: &str, label: Option<&str>, zero_hash: bool) -> SubtreeMetrics {
        let factor = hash_factor(2 * self.sum_size + 1);
        let enter = event_hash(type_name, label, Event::Enter);
        let leave = event_hash(type_name, label, Event::Leave);
        let syntax_hash = enter
            .wrapping_add(self.syntax_hash)
            .wrapping_add(leave.wrapping_mul(factor));
        let hash = if zero_hash {
            0
        } else {
            enter
                .wrapping_add(self.hash)
                .wrapping_add(leave.wrapping_mul(factor))
        };
        let structure_hash = event_hash(type_name, None, Event::Enter)
            .wrapping_add(self.structure_hash)
            .wrapping_add(event_hash(type_name, None, Event::Leave).wrapping_mul(factor));
        SubtreeMetrics {
            size: 1 + self.sum_size,
            height: 1 + self.max_height,
            hash,
            syntax_hash,
            structure_hash,
        }
    }
}

/// Recomputes the metrics of a stored subtree from scratch, bottom-up.
///
/// The store computes metrics incrementally while interning; this walks the
/// subtree again with an explicit stack and is used to check that the
/// recorded values are consistent.
pub fn recompute(store: &NodeStore, root: NodeId) -> TreeResult<SubtreeMetrics> {
    struct Frame {
        node: NodeId,
        next: usize,
        acc: ChildAccumulator,
    }

    let new_frame = |node| Frame {
        node,
        next: 0,
        acc: ChildAccumulator::new(),
    };

    let mut stack = vec![new_frame(root)];
    let mut finished = None;
    while let Some(top) = stack.last_mut() {
        let node = store.node(top.node)?;
        if let Some(child) = node.child(top.next) {
            top.next += 1;
            stack.push(new_frame(child));
            continue;
        }
        let Some(frame) = stack.pop() else { break };
        let metrics = store.compute_metrics(node.ty(), node.label(), &frame.acc);
        let interned = Interned {
            node: frame.node,
            metrics,
        };
        match stack.last_mut() {
            Some(parent) => parent.acc.push(interned),
            None => finished = Some(metrics),
        }
    }
    finished.ok_or(TreeError::UnknownNode { node: root })
}
