//! Error types for tree construction and navigation.

use crate::ids::NodeId;

/// Result alias for fallible tree store operations.
pub type TreeResult<T> = Result<T, TreeError>;

/// Errors raised by the tree store, the builder and the views.
///
/// Every variant is an invariant violation: the operation is aborted and
/// the store is left as it was before the call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    /// A leaf's declared byte length disagrees with its text.
    #[error("length mismatch for leaf `{ty}`: declared {declared}, text has {actual} bytes")]
    LengthMismatch {
        /// Type name of the offending leaf.
        ty: String,
        /// Length given by the caller.
        declared: u32,
        /// Length of the label (or of the type name for unlabeled leaves).
        actual: u32,
    },

    /// A node ID that was not allocated by this store.
    #[error("node {node} has no storage in this store")]
    UnknownNode {
        /// The foreign or stale ID.
        node: NodeId,
    },

    /// A type or label symbol that was not interned by this store.
    #[error("symbol {symbol} was not interned by this store")]
    UnknownSymbol {
        /// Display form of the symbol.
        symbol: String,
    },

    /// A child index beyond a node's fan-out.
    #[error("child index {index} out of range for node {node} with {count} children")]
    ChildOutOfRange {
        /// The parent node.
        node: NodeId,
        /// Requested index.
        index: usize,
        /// Number of children the node has.
        count: usize,
    },

    /// A packed path that does not decode to a sequence of offsets.
    #[error("malformed path encoding: {reason}")]
    MalformedPath {
        /// What was wrong with the bytes.
        reason: String,
    },

    /// A parsed node whose span is not nested inside its parent or overlaps
    /// its left sibling.
    #[error("span [{start},{end}) of `{kind}` is outside its parent or overlaps a sibling")]
    InvalidSpan {
        /// Type name of the parsed node.
        kind: String,
        /// Start offset of the node.
        start: u32,
        /// End offset of the node.
        end: u32,
    },

    /// A padding gap that does not address valid text of the source.
    #[error("source range [{start},{end}) is not valid text of the parsed source")]
    SourceOutOfRange {
        /// Start of the gap.
        start: u32,
        /// End of the gap.
        end: u32,
    },
}
