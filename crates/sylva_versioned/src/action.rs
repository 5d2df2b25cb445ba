//! Edit actions produced by a matcher.
//!
//! Actions reference nodes of the old plain tree by their [`NodePath`] from
//! its root; inserted content is a subtree of the same [`NodeStore`](sylva_tree::NodeStore).

use serde::{Deserialize, Serialize};
use std::fmt;
use sylva_common::Label;
use sylva_tree::{NodeId, NodePath};

/// A stored subtree to be inserted, with the source offset it starts at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSubtree {
    /// Root of the inserted content.
    pub root: NodeId,
    /// Byte offset of the content in the new source.
    pub pos: u32,
}

/// One edit between an old and a new version of a tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Insert a single node (with whatever children it carries).
    Insert {
        /// Parent in the old tree.
        parent: NodePath,
        /// Inserted content.
        subtree: NewSubtree,
        /// Index among the parent's children at the new version.
        position: usize,
    },
    /// Insert a whole subtree.
    TreeInsert {
        /// Parent in the old tree.
        parent: NodePath,
        /// Inserted content.
        subtree: NewSubtree,
        /// Index among the parent's children at the new version.
        position: usize,
    },
    /// Remove a node and its descendants.
    Delete {
        /// Node of the old tree.
        node: NodePath,
    },
    /// Remove a whole subtree.
    TreeDelete {
        /// Root of the removed subtree in the old tree.
        node: NodePath,
    },
    /// Change the label of a node.
    Update {
        /// Node of the old tree.
        node: NodePath,
        /// New label; `None` removes it.
        label: Option<Label>,
    },
}

impl Action {
    /// The old-tree node the action is attached to: the parent for
    /// insertions, the node itself otherwise.
    pub fn anchor(&self) -> &NodePath {
        match self {
            Self::Insert { parent, .. } | Self::TreeInsert { parent, .. } => parent,
            Self::Delete { node } | Self::TreeDelete { node } | Self::Update { node, .. } => node,
        }
    }

    /// Returns `true` for `Insert` and `TreeInsert`.
    pub fn is_insert(&self) -> bool {
        matches!(self, Self::Insert { .. } | Self::TreeInsert { .. })
    }

    /// Returns `true` for `Delete` and `TreeDelete`.
    pub fn is_delete(&self) -> bool {
        matches!(self, Self::Delete { .. } | Self::TreeDelete { .. })
    }

    /// Short name of the action kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Insert { .. } => "insert",
            Self::TreeInsert { .. } => "tree-insert",
            Self::Delete { .. } => "delete",
            Self::TreeDelete { .. } => "tree-delete",
            Self::Update { .. } => "update",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insert { subtree, position, .. } | Self::TreeInsert { subtree, position, .. } => {
                write!(f, "{} {} at {} of {}", self.name(), subtree.root, position, self.anchor())
            }
            Self::Delete { .. } | Self::TreeDelete { .. } | Self::Update { .. } => {
                write!(f, "{} {}", self.name(), self.anchor())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchors() {
        let insert = Action::Insert {
            parent: NodePath::encode(&[0, 4]),
            subtree: NewSubtree {
                root: NodeId::from_raw(3),
                pos: 11,
            },
            position: 1,
        };
        assert_eq!(insert.anchor().to_vec(), vec![0, 4]);
        assert!(insert.is_insert());
        assert_eq!(insert.to_string(), "insert #3 at 1 of [0,4]");

        let delete = Action::TreeDelete {
            node: NodePath::encode(&[2]),
        };
        assert!(delete.is_delete());
        assert_eq!(delete.to_string(), "tree-delete [2]");
    }

    #[test]
    fn serde_round_trip() {
        let update = Action::Update {
            node: NodePath::encode(&[0, 2]),
            label: Some(Label::from_raw(1)),
        };
        let json = serde_json::to_string(&update).unwrap();
        let restored: Action = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, update);
    }
}
