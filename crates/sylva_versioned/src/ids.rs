//! IDs of versioned tree nodes.

use sylva_tree::define_id;

define_id!(
    /// Handle of a node in a [`VersionedTree`](crate::VersionedTree).
    VNodeId
);
