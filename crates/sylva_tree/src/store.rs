//! The hash-consing node store.
//!
//! Every node is interned bottom-up: its children must already be in the
//! store, so two subtrees with equal content are detected by comparing the
//! node's own type and label plus its children's IDs. Nodes are bucketed by
//! their content hash; entries sharing a hash form a singly linked collision
//! chain that is scanned on lookup. A second, label-insensitive index keyed
//! by structure hash only keeps statistics.

use crate::arena::Arena;
use crate::error::{TreeError, TreeResult};
use crate::ids::{ChainId, NodeId};
use crate::metrics::{ChildAccumulator, SubtreeMetrics};
use crate::node::CompressedNode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use sylva_common::{Interner, Label, Type};
use sylva_config::StoreConfig;
use tracing::{debug, trace};

/// A node handed out by the store together with its content metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interned {
    /// The shared node.
    pub node: NodeId,
    /// Its context-free metrics.
    pub metrics: SubtreeMetrics,
}

/// Counters describing how much sharing the store achieved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    /// Distinct nodes allocated.
    pub nodes: usize,
    /// Distinct content hashes, i.e. collision chains.
    pub chains: usize,
    /// Chain entries skipped because their content differed.
    pub collisions: u64,
    /// Interning calls answered with an existing node.
    pub duplicates: u64,
    /// Distinct structure hashes.
    pub structure_buckets: usize,
}

#[derive(Debug)]
pub(crate) struct StoredNode {
    pub(crate) node: CompressedNode,
    pub(crate) metrics: SubtreeMetrics,
    pub(crate) length: u32,
    entry: ChainId,
}

#[derive(Debug)]
struct ChainEntry {
    node: NodeId,
    duplicates: u32,
    next: Option<ChainId>,
}

#[derive(Debug)]
struct StructureBucket {
    first: NodeId,
    count: u32,
}

/// Owner of all compressed nodes and of the type and label tables.
///
/// Interning takes `&mut self`; every query takes `&self`, so a store that
/// is done being built can be shared by any number of readers.
#[derive(Debug)]
pub struct NodeStore {
    nodes: Arena<NodeId, StoredNode>,
    chains: Arena<ChainId, ChainEntry>,
    by_hash: HashMap<u32, ChainId>,
    by_structure: HashMap<u32, StructureBucket>,
    types: Interner<Type>,
    labels: Interner<Label>,
    spaces: Type,
    whitespace_insensitive: bool,
    collisions: u64,
    duplicates: u64,
}

impl Default for NodeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeStore {
    /// Creates a store with the default settings.
    pub fn new() -> Self {
        Self::with_config(&StoreConfig::default())
    }

    /// Creates a store from the `[store]` configuration section.
    pub fn with_config(config: &StoreConfig) -> Self {
        let mut types = Interner::new();
        let spaces = types.get_or_intern(&config.spaces_type);
        debug!(
            spaces_type = %config.spaces_type,
            whitespace_insensitive = config.whitespace_insensitive_hash,
            capacity = config.expected_nodes,
            "creating node store"
        );
        Self {
            nodes: Arena::with_capacity(config.expected_nodes),
            chains: Arena::with_capacity(config.expected_nodes),
            by_hash: HashMap::with_capacity(config.expected_nodes),
            by_structure: HashMap::new(),
            types,
            labels: Interner::new(),
            spaces,
            whitespace_insensitive: config.whitespace_insensitive_hash,
            collisions: 0,
            duplicates: 0,
        }
    }

    /// Interns a type name.
    pub fn type_symbol(&mut self, name: &str) -> Type {
        self.types.get_or_intern(name)
    }

    /// Interns a label. The empty string is "no label" and yields `None`.
    pub fn label_symbol(&mut self, text: &str) -> Option<Label> {
        if text.is_empty() {
            None
        } else {
            Some(self.labels.get_or_intern(text))
        }
    }

    /// Looks up a type name without interning it.
    pub fn find_type(&self, name: &str) -> Option<Type> {
        self.types.get(name)
    }

    /// Resolves a type symbol of this store.
    ///
    /// # Panics
    ///
    /// Panics if the symbol was not interned by this store.
    pub fn type_name(&self, ty: Type) -> &str {
        self.types.resolve(ty)
    }

    /// Resolves a label symbol of this store.
    ///
    /// # Panics
    ///
    /// Panics if the symbol was not interned by this store.
    pub fn label_text(&self, label: Label) -> &str {
        self.labels.resolve(label)
    }

    /// Resolves a type symbol, returning `None` for foreign symbols.
    pub fn try_type_name(&self, ty: Type) -> Option<&str> {
        self.types.try_resolve(ty)
    }

    /// Resolves a label symbol, returning `None` for foreign symbols.
    pub fn try_label_text(&self, label: Label) -> Option<&str> {
        self.labels.try_resolve(label)
    }

    /// The type of whitespace padding leaves.
    pub fn spaces_type(&self) -> Type {
        self.spaces
    }

    /// Returns `true` if `ty` is the whitespace padding type.
    pub fn is_spaces(&self, ty: Type) -> bool {
        ty == self.spaces
    }

    /// Interns a node built from `acc`'s children.
    ///
    /// Returns the existing node when an identical one was interned before,
    /// bumping its duplicate counter. For leaves, `length` must equal the
    /// byte length of the label (or of the type name when unlabeled).
    pub fn intern(
        &mut self,
        ty: Type,
        label: Option<Label>,
        acc: ChildAccumulator,
        length: u32,
    ) -> TreeResult<Interned> {
        let type_name = self
            .types
            .try_resolve(ty)
            .ok_or_else(|| TreeError::UnknownSymbol {
                symbol: ty.to_string(),
            })?;
        let label_text = match label {
            Some(label) => Some(self.labels.try_resolve(label).ok_or_else(|| {
                TreeError::UnknownSymbol {
                    symbol: label.to_string(),
                }
            })?),
            None => None,
        };
        if let Some(&node) = acc.children().iter().find(|&&c| !self.nodes.contains(c)) {
            return Err(TreeError::UnknownNode { node });
        }
        if acc.is_empty() {
            let actual = label_text.unwrap_or(type_name).len() as u32;
            if actual != length {
                return Err(TreeError::LengthMismatch {
                    ty: type_name.to_string(),
                    declared: length,
                    actual,
                });
            }
        }

        let metrics = self.compute_metrics(ty, label, &acc);

        let mut cursor = self.by_hash.get(&metrics.hash).copied();
        let mut tail = None;
        while let Some(chain_id) = cursor {
            let entry = &self.chains[chain_id];
            let stored = &self.nodes[entry.node];
            if stored.node.ty() == ty
                && stored.node.label() == label
                && stored.node.children() == acc.children()
                && stored.length == length
            {
                let node = entry.node;
                let stored_metrics = stored.metrics;
                self.chains[chain_id].duplicates += 1;
                self.duplicates += 1;
                return Ok(Interned {
                    node,
                    metrics: stored_metrics,
                });
            }
            trace!(hash = metrics.hash, candidate = %entry.node, "hash collision");
            self.collisions += 1;
            tail = Some(chain_id);
            cursor = entry.next;
        }

        let node = self.nodes.next_id();
        let entry = self.chains.alloc(ChainEntry {
            node,
            duplicates: 0,
            next: None,
        });
        match tail {
            Some(tail) => self.chains[tail].next = Some(entry),
            None => {
                self.by_hash.insert(metrics.hash, entry);
            }
        }
        self.by_structure
            .entry(metrics.structure_hash)
            .and_modify(|bucket| bucket.count += 1)
            .or_insert(StructureBucket {
                first: node,
                count: 0,
            });

        let compressed = match (label, acc.is_empty()) {
            (None, true) => CompressedNode::Leaf { ty },
            (Some(label), true) => CompressedNode::LabeledLeaf { ty, label },
            (None, false) => CompressedNode::Branch {
                ty,
                children: acc.into_children().into_boxed_slice(),
                length,
            },
            (Some(label), false) => CompressedNode::LabeledBranch {
                ty,
                label,
                children: acc.into_children().into_boxed_slice(),
                length,
            },
        };
        self.nodes.alloc(StoredNode {
            node: compressed,
            metrics,
            length,
            entry,
        });
        Ok(Interned { node, metrics })
    }

    /// Interns a leaf from its type name and text. An empty `label` makes an
    /// unlabeled token whose text is the type name.
    pub fn intern_leaf(&mut self, ty: &str, label: &str) -> TreeResult<Interned> {
        let length = if label.is_empty() { ty.len() } else { label.len() } as u32;
        let ty = self.type_symbol(ty);
        let label = self.label_symbol(label);
        self.intern(ty, label, ChildAccumulator::new(), length)
    }

    pub(crate) fn compute_metrics(
        &self,
        ty: Type,
        label: Option<Label>,
        acc: &ChildAccumulator,
    ) -> SubtreeMetrics {
        let type_name = self.types.try_resolve(ty).unwrap_or_default();
        let label_text = label.and_then(|label| self.labels.try_resolve(label));
        let zero_hash = self.whitespace_insensitive && self.is_spaces(ty);
        acc.finish(type_name, label_text, zero_hash)
    }

    pub(crate) fn stored(&self, id: NodeId) -> &StoredNode {
        &self.nodes[id]
    }

    /// Returns the node with the given ID.
    pub fn node(&self, id: NodeId) -> TreeResult<&CompressedNode> {
        self.try_node(id).ok_or(TreeError::UnknownNode { node: id })
    }

    /// Returns the node with the given ID, or `None` for foreign IDs.
    pub fn try_node(&self, id: NodeId) -> Option<&CompressedNode> {
        self.nodes.get(id).map(|stored| &stored.node)
    }

    /// Returns the node together with its metrics.
    pub fn interned(&self, id: NodeId) -> TreeResult<Interned> {
        Ok(Interned {
            node: id,
            metrics: self.metrics(id)?,
        })
    }

    /// Returns the context-free metrics of a node.
    pub fn metrics(&self, id: NodeId) -> TreeResult<SubtreeMetrics> {
        self.try_metrics(id).ok_or(TreeError::UnknownNode { node: id })
    }

    /// Returns the metrics of a node, or `None` for foreign IDs.
    pub fn try_metrics(&self, id: NodeId) -> Option<SubtreeMetrics> {
        self.nodes.get(id).map(|stored| stored.metrics)
    }

    /// Returns the byte length of the text covered by a node.
    pub fn length(&self, id: NodeId) -> TreeResult<u32> {
        self.nodes
            .get(id)
            .map(|stored| stored.length)
            .ok_or(TreeError::UnknownNode { node: id })
    }

    /// Returns how many interning calls were answered with this node after
    /// it was first allocated.
    pub fn duplicate_count(&self, id: NodeId) -> TreeResult<u32> {
        let stored = self
            .nodes
            .get(id)
            .ok_or(TreeError::UnknownNode { node: id })?;
        Ok(self.chains[stored.entry].duplicates)
    }

    /// Returns how many other distinct nodes share this node's structure
    /// hash, and the first node allocated with it.
    pub fn structure_duplicates(&self, id: NodeId) -> TreeResult<(NodeId, u32)> {
        let metrics = self.metrics(id)?;
        Ok(self
            .by_structure
            .get(&metrics.structure_hash)
            .map_or((id, 0), |bucket| (bucket.first, bucket.count)))
    }

    /// Number of distinct nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if nothing was interned yet.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Sharing statistics.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            nodes: self.nodes.len(),
            chains: self.by_hash.len(),
            collisions: self.collisions,
            duplicates: self.duplicates,
            structure_buckets: self.by_structure.len(),
        }
    }
}
