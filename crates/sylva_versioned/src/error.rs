//! Error types for versioned trees, merging and snapshots.

use crate::ids::VNodeId;
use sylva_common::Version;
use sylva_tree::TreeError;

/// Result alias for fallible versioned tree operations.
pub type VersionedResult<T> = Result<T, VersionedError>;

/// Errors raised by the versioned tree model and the merge engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionedError {
    /// A node ID that was not allocated by this tree.
    #[error("versioned node {node} has no storage in this tree")]
    NoStorage {
        /// The foreign or placeholder ID.
        node: VNodeId,
    },

    /// An insertion position beyond the children visible at the child's
    /// insert version.
    #[error("cannot insert at position {position} under {parent}: only {available} children exist at that version")]
    PositionOutOfRange {
        /// The parent node.
        parent: VNodeId,
        /// Requested position.
        position: usize,
        /// Number of children visible at the child's insert version.
        available: usize,
    },

    /// Inserting a node that already has a parent, or the root.
    #[error("node {node} is already attached to the tree")]
    AlreadyAttached {
        /// The attached node.
        node: VNodeId,
    },

    /// Inserting a subtree below one of its own nodes.
    #[error("inserting {node} under {parent} would create a cycle")]
    WouldCycle {
        /// The subtree root being inserted.
        node: VNodeId,
        /// The requested parent, a descendant of `node`.
        parent: VNodeId,
    },

    /// A merge against a version the tree never recorded.
    #[error("version {version} is not recorded in this tree")]
    UnknownVersion {
        /// The requested old version.
        version: Version,
    },

    /// A merge whose new version does not follow every recorded version.
    #[error("new version {version} must be newer than the latest recorded version {latest}")]
    VersionNotNewer {
        /// The requested new version.
        version: Version,
        /// The latest recorded version.
        latest: Version,
    },

    /// The plain tree given to a merge does not match the versioned tree at
    /// the old version.
    #[error("old tree does not match the versioned tree at {path}: {reason}")]
    Desynchronized {
        /// Path of the plain node where the walks diverged.
        path: String,
        /// What differed.
        reason: String,
    },

    /// A strict merge in which some actions could not be applied.
    #[error("{count} actions could not be applied (first: action {first})")]
    UnappliedActions {
        /// Number of unapplied actions.
        count: usize,
        /// Index of the first unapplied action in the input list.
        first: usize,
    },

    /// A snapshot that cannot be read or written.
    #[error("snapshot error: {reason}")]
    Snapshot {
        /// What went wrong.
        reason: String,
    },

    /// An error of the underlying node store.
    #[error(transparent)]
    Tree(#[from] TreeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_version_display() {
        let err = VersionedError::UnknownVersion {
            version: Version::new(4),
        };
        assert_eq!(err.to_string(), "version 4 is not recorded in this tree");
    }

    #[test]
    fn position_out_of_range_display() {
        let err = VersionedError::PositionOutOfRange {
            parent: VNodeId::from_raw(2),
            position: 5,
            available: 3,
        };
        assert_eq!(
            err.to_string(),
            "cannot insert at position 5 under #2: only 3 children exist at that version"
        );
    }

    #[test]
    fn tree_errors_convert() {
        let err: VersionedError = TreeError::MalformedPath {
            reason: "dangling continuation".to_string(),
        }
        .into();
        assert!(err.to_string().contains("malformed path"));
    }
}
