//! Text renderings of stored trees.

use crate::error::TreeResult;
use crate::ids::NodeId;
use crate::store::NodeStore;
use std::fmt::Write as _;
use sylva_config::DebugConfig;

/// Appends one debug line, `"<type>: <label> [<pos>,<end>]"`, without the
/// label part for unlabeled nodes.
pub fn write_line(out: &mut String, type_name: &str, label: Option<&str>, pos: u32, end: u32) {
    out.push_str(type_name);
    if let Some(label) = label {
        out.push_str(": ");
        out.push_str(label);
    }
    let _ = writeln!(out, " [{pos},{end}]");
}

/// Makes whitespace visible: newline, tab and space become `\n`, `\t`, `\s`.
pub fn escape_spaces(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() * 2);
    for c in text.chars() {
        match c {
            '\n' => escaped.push_str("\\n"),
            '\t' => escaped.push_str("\\t"),
            ' ' => escaped.push_str("\\s"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Renders the subtree at `root`, starting at byte offset `pos`, in
/// pre-order with one node per line and one indent per level.
pub fn debug_string(
    store: &NodeStore,
    root: NodeId,
    pos: u32,
    config: &DebugConfig,
) -> TreeResult<String> {
    let mut out = String::new();
    let mut stack = vec![(root, 0usize, pos)];
    while let Some((id, depth, pos)) = stack.pop() {
        let node = store.node(id)?;
        let end = pos + store.length(id)?;
        let label = node.label().map(|label| {
            let text = store.label_text(label);
            if config.escape_spaces && store.is_spaces(node.ty()) {
                escape_spaces(text)
            } else {
                text.to_string()
            }
        });
        out.push_str(&config.indent.repeat(depth));
        write_line(&mut out, store.type_name(node.ty()), label.as_deref(), pos, end);

        let mut child_pos = pos;
        let mut children = Vec::with_capacity(node.child_count());
        for &child in node.children() {
            children.push((child, depth + 1, child_pos));
            child_pos += store.length(child)?;
        }
        stack.extend(children.into_iter().rev());
    }
    Ok(out)
}

/// Concatenates the text of every leaf under `root`, in order.
///
/// A leaf contributes its label, or its type name when unlabeled. For trees
/// built by [`TreeBuilder`](crate::TreeBuilder) this is the source text.
pub fn reserialize(store: &NodeStore, root: NodeId) -> TreeResult<String> {
    let mut out = String::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        let node = store.node(id)?;
        if node.is_leaf() {
            match node.label() {
                Some(label) => out.push_str(store.label_text(label)),
                None => out.push_str(store.type_name(node.ty())),
            }
        } else {
            stack.extend(node.children().iter().rev());
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{ParsedNode, TreeBuilder};

    #[test]
    fn escapes_whitespace() {
        assert_eq!(escape_spaces(" \n\tx"), "\\s\\n\\tx");
    }

    #[test]
    fn line_format() {
        let mut out = String::new();
        write_line(&mut out, "identifier", Some("Foo"), 6, 9);
        write_line(&mut out, "class", None, 0, 5);
        assert_eq!(out, "identifier: Foo [6,9]\nclass [0,5]\n");
    }

    #[test]
    fn debug_string_is_indented_pre_order() {
        let source = "a = 1";
        let parsed = ParsedNode::branch(
            "assignment",
            0,
            5,
            vec![
                ParsedNode::labeled("identifier", "a", 0),
                ParsedNode::token("=", 2),
                ParsedNode::labeled("number", "1", 4),
            ],
        );
        let mut store = NodeStore::new();
        let root = TreeBuilder::new(&mut store, source).build(&parsed).unwrap();
        let text = debug_string(&store, root.node, 0, &DebugConfig::default()).unwrap();
        assert_eq!(
            text,
            "assignment [0,5]\n\
             \x20\x20identifier: a [0,1]\n\
             \x20\x20gumtree_spaces: \\s [1,2]\n\
             \x20\x20= [2,3]\n\
             \x20\x20gumtree_spaces: \\s [3,4]\n\
             \x20\x20number: 1 [4,5]\n"
        );
    }

    #[test]
    fn unescaped_spaces_on_request() {
        let mut store = NodeStore::new();
        let pad = store.intern_leaf("gumtree_spaces", "\n").unwrap();
        let config = DebugConfig {
            escape_spaces: false,
            ..DebugConfig::default()
        };
        let text = debug_string(&store, pad.node, 3, &config).unwrap();
        assert_eq!(text, "gumtree_spaces: \n [3,4]\n");
    }

    #[test]
    fn reserialize_unknown_node_errors() {
        let store = NodeStore::new();
        assert!(reserialize(&store, NodeId::from_raw(0)).is_err());
    }
}
