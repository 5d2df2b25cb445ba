//! Text renderings of versioned trees.

use crate::error::VersionedResult;
use crate::tree::{VersionedNode, VersionedTree};
use std::fmt::Write as _;
use sylva_common::Version;
use sylva_config::DebugConfig;
use sylva_tree::print::{escape_spaces, write_line};
use sylva_tree::{NodeStore, TreeError};

/// Resolves a node's type name and label text, escaping padding labels when
/// `config` asks for it.
fn resolve<'s>(
    store: &'s NodeStore,
    node: &VersionedNode,
    config: &DebugConfig,
) -> VersionedResult<(&'s str, Option<String>)> {
    let ty = store.try_type_name(node.ty).ok_or_else(|| TreeError::UnknownSymbol {
        symbol: node.ty.to_string(),
    })?;
    let label = match node.label {
        Some(label) => {
            let text = store.try_label_text(label).ok_or_else(|| TreeError::UnknownSymbol {
                symbol: label.to_string(),
            })?;
            if config.escape_spaces && store.is_spaces(node.ty) {
                Some(escape_spaces(text))
            } else {
                Some(text.to_string())
            }
        }
        None => None,
    };
    Ok((ty, label))
}

/// Renders the tree as it is at `version`, in the same line format as
/// [`sylva_tree::print::debug_string`]. Offsets are those recorded when each
/// node was inserted.
pub fn debug_string_at(
    tree: &VersionedTree,
    store: &NodeStore,
    version: Version,
    config: &DebugConfig,
) -> VersionedResult<String> {
    let mut out = String::new();
    if !tree.exists_at(tree.root(), version)? {
        return Ok(out);
    }
    let mut stack = vec![(tree.root(), 0usize)];
    while let Some((id, depth)) = stack.pop() {
        let node = tree.node(id)?;
        let (ty, label) = resolve(store, node, config)?;
        out.push_str(&config.indent.repeat(depth));
        write_line(&mut out, ty, label.as_deref(), node.pos, node.pos + node.length);
        let children = tree.children_at(id, version)?;
        stack.extend(children.into_iter().rev().map(|child| (child, depth + 1)));
    }
    Ok(out)
}

/// Dumps every physical node with its stamps, one per line:
/// `"<ins>-<rem> <type>@@<label>"`, where missing stamps are left blank and
/// the stamp column is dropped for nodes that have neither.
pub fn to_history_string(tree: &VersionedTree, store: &NodeStore, config: &DebugConfig) -> VersionedResult<String> {
    let mut out = String::new();
    let mut stack = vec![(tree.root(), 0usize)];
    while let Some((id, depth)) = stack.pop() {
        let node = tree.node(id)?;
        let (ty, label) = resolve(store, node, config)?;
        out.push_str(&config.indent.repeat(depth));
        if let Some(insert) = node.insert_version {
            let _ = write!(out, "{insert}");
        }
        let stamped = node.insert_version.is_some() || node.remove_version.is_some();
        if stamped {
            out.push('-');
        }
        if let Some(remove) = node.remove_version {
            let _ = write!(out, "{remove}");
        }
        if stamped {
            out.push(' ');
        }
        out.push_str(ty);
        out.push_str("@@");
        if let Some(label) = label {
            out.push_str(&label);
        }
        out.push('\n');
        let children = node.all_children();
        stack.extend(children.iter().rev().map(|&child| (child, depth + 1)));
    }
    Ok(out)
}
