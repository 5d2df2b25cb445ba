//! Hash-consed syntax trees for the Sylva workspace.
//!
//! Parsed trees are interned into a [`NodeStore`] by a [`TreeBuilder`]:
//! structurally identical subtrees become one shared [`CompressedNode`]
//! annotated with content [`SubtreeMetrics`]. Shared nodes are navigated
//! through [`DecompressedTree`] views, or through
//! [`PartiallyDecompressedTree`] views that address a node by a packed
//! [`NodePath`] from a distant ascendant.

#![warn(missing_docs)]

pub mod arena;
pub mod builder;
pub mod error;
pub mod ids;
pub mod metrics;
pub mod node;
pub mod partial;
pub mod path;
pub mod print;
pub mod store;
pub mod view;

pub use arena::{Arena, ArenaId};
pub use builder::{ParsedNode, TreeBuilder};
pub use error::{TreeError, TreeResult};
pub use ids::{ChainId, NodeId};
pub use metrics::{ChildAccumulator, SubtreeMetrics, TreeMetrics};
pub use node::{is_iso_structural, is_isomorphic, same_type, same_type_and_label, CompressedNode};
pub use partial::PartiallyDecompressedTree;
pub use path::NodePath;
pub use store::{Interned, NodeStore, StoreStats};
pub use view::{DecompressedTree, TreeView};
