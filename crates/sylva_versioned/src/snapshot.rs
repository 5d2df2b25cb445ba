//! Binary snapshots of versioned trees.
//!
//! A snapshot is a 4-byte little-endian header length, a bincode header
//! (magic bytes, format version and a checksum of the payload), then the
//! bincode payload. Type and label symbols are written as strings so a
//! snapshot can be loaded into any [`NodeStore`].

use crate::error::{VersionedError, VersionedResult};
use crate::ids::VNodeId;
use crate::tree::{VersionedNode, VersionedTree};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use sylva_common::{ContentHash, Label, Type, Version};
use sylva_tree::{Arena, NodeStore};
use tracing::debug;

/// Magic bytes identifying a versioned tree snapshot.
const SNAPSHOT_MAGIC: [u8; 4] = *b"SYLV";

/// Current snapshot format version.
const SNAPSHOT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotHeader {
    magic: [u8; 4],
    format_version: u32,
    checksum: ContentHash,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NodeRecord {
    ty: u32,
    label: Option<u32>,
    pos: u32,
    length: u32,
    insert_version: Option<Version>,
    remove_version: Option<Version>,
    children: Vec<VNodeId>,
    parent: Option<VNodeId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotPayload {
    types: Vec<String>,
    labels: Vec<String>,
    nodes: Vec<NodeRecord>,
    root: VNodeId,
    versions: Vec<Version>,
}

fn snapshot_error(reason: impl Into<String>) -> VersionedError {
    VersionedError::Snapshot { reason: reason.into() }
}

/// Assigns dense indices to symbols in first-seen order.
struct SymbolTable<S> {
    index: HashMap<S, u32>,
    names: Vec<String>,
}

impl<S: Copy + Eq + std::hash::Hash> SymbolTable<S> {
    fn new() -> Self {
        Self {
            index: HashMap::new(),
            names: Vec::new(),
        }
    }

    fn slot(&mut self, symbol: S, name: impl FnOnce() -> Option<String>) -> VersionedResult<u32> {
        if let Some(&slot) = self.index.get(&symbol) {
            return Ok(slot);
        }
        let name = name().ok_or_else(|| snapshot_error("symbol does not belong to the store"))?;
        let slot = self.names.len() as u32;
        self.names.push(name);
        self.index.insert(symbol, slot);
        Ok(slot)
    }
}

impl VersionedTree {
    /// Serializes the tree, resolving its symbols against `store`.
    pub fn to_snapshot(&self, store: &NodeStore) -> VersionedResult<Vec<u8>> {
        let mut types = SymbolTable::<Type>::new();
        let mut labels = SymbolTable::<Label>::new();
        let mut nodes = Vec::with_capacity(self.len());
        for (_, node) in self.nodes().iter() {
            let ty = types.slot(node.ty, || store.try_type_name(node.ty).map(str::to_string))?;
            let label = match node.label {
                Some(label) => Some(labels.slot(label, || store.try_label_text(label).map(str::to_string))?),
                None => None,
            };
            nodes.push(NodeRecord {
                ty,
                label,
                pos: node.pos,
                length: node.length,
                insert_version: node.insert_version,
                remove_version: node.remove_version,
                children: node.children.clone(),
                parent: node.parent,
            });
        }
        let payload = SnapshotPayload {
            types: types.names,
            labels: labels.names,
            nodes,
            root: self.root(),
            versions: self.versions().collect(),
        };

        let data = bincode::serde::encode_to_vec(&payload, bincode::config::standard())
            .map_err(|e| snapshot_error(e.to_string()))?;
        let header = SnapshotHeader {
            magic: SNAPSHOT_MAGIC,
            format_version: SNAPSHOT_FORMAT_VERSION,
            checksum: ContentHash::from_bytes(&data),
        };
        let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard())
            .map_err(|e| snapshot_error(e.to_string()))?;

        let header_len = header_bytes.len() as u32;
        let mut output = Vec::with_capacity(4 + header_bytes.len() + data.len());
        output.extend_from_slice(&header_len.to_le_bytes());
        output.extend_from_slice(&header_bytes);
        output.extend_from_slice(&data);
        debug!(nodes = self.len(), bytes = output.len(), "wrote snapshot");
        Ok(output)
    }

    /// Reads a tree written by [`to_snapshot`](Self::to_snapshot), interning
    /// its symbols into `store`.
    pub fn from_snapshot(bytes: &[u8], store: &mut NodeStore) -> VersionedResult<Self> {
        if bytes.len() < 4 {
            return Err(snapshot_error("truncated header length"));
        }
        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&bytes[..4]);
        let header_len = u32::from_le_bytes(len_bytes) as usize;
        if bytes.len() < 4 + header_len {
            return Err(snapshot_error("truncated header"));
        }

        let (header, _): (SnapshotHeader, _) =
            bincode::serde::decode_from_slice(&bytes[4..4 + header_len], bincode::config::standard())
                .map_err(|e| snapshot_error(e.to_string()))?;
        if header.magic != SNAPSHOT_MAGIC {
            return Err(snapshot_error("bad magic bytes"));
        }
        if header.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(snapshot_error(format!(
                "unsupported format version {}",
                header.format_version
            )));
        }
        let data = &bytes[4 + header_len..];
        if ContentHash::from_bytes(data) != header.checksum {
            return Err(snapshot_error("checksum mismatch"));
        }

        let (payload, _): (SnapshotPayload, _) =
            bincode::serde::decode_from_slice(data, bincode::config::standard())
                .map_err(|e| snapshot_error(e.to_string()))?;

        let types: Vec<Type> = payload.types.iter().map(|name| store.type_symbol(name)).collect();
        let labels: Vec<Option<Label>> = payload.labels.iter().map(|text| store.label_symbol(text)).collect();
        let count = payload.nodes.len();
        let in_range = |id: VNodeId| (id.as_raw() as usize) < count;

        let mut nodes = Arena::with_capacity(count);
        for record in payload.nodes {
            let ty = *types
                .get(record.ty as usize)
                .ok_or_else(|| snapshot_error(format!("type index {} out of range", record.ty)))?;
            let label = match record.label {
                Some(index) => *labels
                    .get(index as usize)
                    .ok_or_else(|| snapshot_error(format!("label index {index} out of range")))?,
                None => None,
            };
            if !record.children.iter().copied().all(in_range) || !record.parent.is_none_or(in_range) {
                return Err(snapshot_error("node reference out of range"));
            }
            let mut node = VersionedNode::new(ty, label, record.pos, record.length, record.insert_version);
            node.remove_version = record.remove_version;
            node.children = record.children;
            node.parent = record.parent;
            let _: VNodeId = nodes.alloc(node);
        }
        if !in_range(payload.root) {
            return Err(snapshot_error("root out of range"));
        }
        let versions: BTreeSet<Version> = payload.versions.into_iter().collect();
        debug!(nodes = count, versions = versions.len(), "read snapshot");
        Ok(Self::from_parts(nodes, payload.root, versions))
    }
}
