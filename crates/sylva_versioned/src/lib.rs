//! Versioned syntax trees for the Sylva workspace.
//!
//! A [`VersionedTree`] keeps every recorded state of a tree in one
//! structure, with insert and remove version stamps on each node. New
//! versions are added by [`merge`], which replays a list of edit
//! [`Action`]s computed against the plain tree of an earlier version.

#![warn(missing_docs)]

pub mod action;
pub mod cursor;
pub mod error;
pub mod ids;
pub mod merge;
pub mod print;
pub mod snapshot;
pub mod tree;

pub use action::{Action, NewSubtree};
pub use cursor::{BiCursor, PlainCursor, PreOrderWalker, Step, TreeCursor, VersionedCursor};
pub use error::{VersionedError, VersionedResult};
pub use ids::VNodeId;
pub use merge::{merge, MergeReport};
pub use print::{debug_string_at, to_history_string};
pub use tree::{VersionedNode, VersionedTree};
