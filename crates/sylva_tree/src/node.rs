//! The immutable node vocabulary of the compressed tree store.
//!
//! A compressed node is one of four closed shapes. What a node can do is
//! decided by which shape it is, and the comparison predicates are free
//! functions over the shapes rather than methods of a capability hierarchy.

use crate::ids::NodeId;
use crate::store::NodeStore;
use serde::{Deserialize, Serialize};
use sylva_common::{Label, Type};

/// An immutable, shareable syntax tree node.
///
/// Children are referenced by ID and shared between every parent that
/// contains structurally identical content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressedNode {
    /// A token whose text is its type name, e.g. `class` or `{`.
    Leaf {
        /// Syntactic category.
        ty: Type,
    },
    /// A token carrying text, e.g. an identifier, a literal or a whitespace run.
    LabeledLeaf {
        /// Syntactic category.
        ty: Type,
        /// Text of the token.
        label: Label,
    },
    /// An inner node.
    Branch {
        /// Syntactic category.
        ty: Type,
        /// Ordered children.
        children: Box<[NodeId]>,
        /// Byte length of the covered source text.
        length: u32,
    },
    /// An inner node with a label promoted from its content, e.g. a file name.
    LabeledBranch {
        /// Syntactic category.
        ty: Type,
        /// Label of the node.
        label: Label,
        /// Ordered children.
        children: Box<[NodeId]>,
        /// Byte length of the covered source text.
        length: u32,
    },
}

impl CompressedNode {
    /// Returns the syntactic category of the node.
    pub fn ty(&self) -> Type {
        match self {
            Self::Leaf { ty }
            | Self::LabeledLeaf { ty, .. }
            | Self::Branch { ty, .. }
            | Self::LabeledBranch { ty, .. } => *ty,
        }
    }

    /// Returns the label, or `None` for unlabeled shapes.
    pub fn label(&self) -> Option<Label> {
        match self {
            Self::LabeledLeaf { label, .. } | Self::LabeledBranch { label, .. } => Some(*label),
            Self::Leaf { .. } | Self::Branch { .. } => None,
        }
    }

    /// Returns the ordered children; empty for leaves.
    pub fn children(&self) -> &[NodeId] {
        match self {
            Self::Branch { children, .. } | Self::LabeledBranch { children, .. } => children,
            Self::Leaf { .. } | Self::LabeledLeaf { .. } => &[],
        }
    }

    /// Returns the child at `index`, if any.
    pub fn child(&self, index: usize) -> Option<NodeId> {
        self.children().get(index).copied()
    }

    /// Returns the number of children.
    pub fn child_count(&self) -> usize {
        self.children().len()
    }

    /// Returns `true` for the two leaf shapes.
    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf { .. } | Self::LabeledLeaf { .. })
    }

    /// Returns `true` for the two labeled shapes.
    pub fn is_labeled(&self) -> bool {
        self.label().is_some()
    }

    /// Returns the declared length of branch shapes; leaf lengths are derived
    /// from their text by the store.
    pub(crate) fn declared_length(&self) -> Option<u32> {
        match self {
            Self::Branch { length, .. } | Self::LabeledBranch { length, .. } => Some(*length),
            Self::Leaf { .. } | Self::LabeledLeaf { .. } => None,
        }
    }
}

/// Returns `true` if both nodes have the same type.
///
/// Both nodes must come from the same store.
pub fn same_type(a: &CompressedNode, b: &CompressedNode) -> bool {
    a.ty() == b.ty()
}

/// Returns `true` if both nodes have the same type and the same label (or
/// are both unlabeled).
///
/// Both nodes must come from the same store.
pub fn same_type_and_label(a: &CompressedNode, b: &CompressedNode) -> bool {
    same_type(a, b) && a.label() == b.label()
}

/// Returns `true` if the two subtrees are isomorphic: same types, same labels
/// and isomorphic children in the same order.
///
/// Within a single store hash-consing makes this an ID comparison. Across
/// stores the syntax hashes are compared first (they are context-free and do
/// not depend on interning order) and matching candidates are then compared
/// node by node.
pub fn is_isomorphic(a_store: &NodeStore, a: NodeId, b_store: &NodeStore, b: NodeId) -> bool {
    if std::ptr::eq(a_store, b_store) {
        return a == b;
    }
    compare_across(a_store, a, b_store, b, true)
}

/// Returns `true` if the two subtrees have the same shape and types,
/// ignoring labels.
pub fn is_iso_structural(a_store: &NodeStore, a: NodeId, b_store: &NodeStore, b: NodeId) -> bool {
    if std::ptr::eq(a_store, b_store) && a == b {
        return true;
    }
    compare_across(a_store, a, b_store, b, false)
}

fn compare_across(
    a_store: &NodeStore,
    a: NodeId,
    b_store: &NodeStore,
    b: NodeId,
    with_labels: bool,
) -> bool {
    let (Some(a_metrics), Some(b_metrics)) = (a_store.try_metrics(a), b_store.try_metrics(b))
    else {
        return false;
    };
    let prefilter = if with_labels {
        a_metrics.syntax_hash == b_metrics.syntax_hash
    } else {
        a_metrics.structure_hash == b_metrics.structure_hash
    };
    if !prefilter || a_metrics.size != b_metrics.size {
        return false;
    }

    let mut stack = vec![(a, b)];
    while let Some((left, right)) = stack.pop() {
        let (Some(l), Some(r)) = (a_store.try_node(left), b_store.try_node(right)) else {
            return false;
        };
        if a_store.type_name(l.ty()) != b_store.type_name(r.ty()) {
            return false;
        }
        if with_labels {
            let l_label = l.label().map(|label| a_store.label_text(label));
            let r_label = r.label().map(|label| b_store.label_text(label));
            if l_label != r_label {
                return false;
            }
        }
        if l.child_count() != r.child_count() {
            return false;
        }
        stack.extend(l.children().iter().copied().zip(r.children().iter().copied()));
    }
    true
}
