//! Configuration types deserialized from `sylva.toml`.

use serde::{Deserialize, Serialize};

/// The top-level configuration parsed from `sylva.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SylvaConfig {
    /// Hash-consing store settings.
    #[serde(default)]
    pub store: StoreConfig,
    /// Versioned merge settings.
    #[serde(default)]
    pub merge: MergeConfig,
    /// Debug serialization settings.
    #[serde(default)]
    pub debug: DebugConfig,
}

/// Settings of the hash-consing tree store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Node type given to the whitespace padding leaves inserted between tokens.
    pub spaces_type: String,
    /// When set, padding leaves contribute a zero content hash, so subtrees
    /// that differ only in whitespace share a hash bucket.
    pub whitespace_insensitive_hash: bool,
    /// Capacity hint for the node arena.
    pub expected_nodes: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            spaces_type: "gumtree_spaces".to_string(),
            whitespace_insensitive_hash: true,
            expected_nodes: 0,
        }
    }
}

/// Settings of the versioned merge engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Treat paired nodes of different types as a desynchronization.
    pub check_types: bool,
    /// Fail the merge when some actions could not be applied.
    pub strict: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            check_types: true,
            strict: false,
        }
    }
}

/// Settings of the indented debug serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Indentation added per tree level.
    pub indent: String,
    /// Render whitespace labels as `\n`, `\t` and `\s` escapes.
    pub escape_spaces: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            indent: "  ".to_string(),
            escape_spaces: true,
        }
    }
}
