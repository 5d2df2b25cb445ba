//! Building hash-consed trees from parser output.
//!
//! The builder interns a [`ParsedNode`] tree bottom-up and makes it
//! lossless: every byte of a node's span that none of its children covers
//! becomes a padding leaf of the store's spaces type, labeled with the
//! source text of the gap.

use crate::error::{TreeError, TreeResult};
use crate::metrics::ChildAccumulator;
use crate::store::{Interned, NodeStore};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A syntax tree node as produced by a parser adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedNode {
    /// Type name, e.g. `class_declaration`.
    pub kind: String,
    /// Text payload of identifier or literal tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Byte offset of the first covered byte.
    pub pos: u32,
    /// Number of covered bytes.
    pub length: u32,
    /// Ordered children, nested inside `[pos, pos + length)`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ParsedNode>,
}

impl ParsedNode {
    /// A token whose text is its type name.
    pub fn token(kind: impl Into<String>, pos: u32) -> Self {
        let kind = kind.into();
        let length = kind.len() as u32;
        Self {
            kind,
            label: None,
            pos,
            length,
            children: Vec::new(),
        }
    }

    /// A token carrying text.
    pub fn labeled(kind: impl Into<String>, label: impl Into<String>, pos: u32) -> Self {
        let label = label.into();
        let length = label.len() as u32;
        Self {
            kind: kind.into(),
            label: Some(label),
            pos,
            length,
            children: Vec::new(),
        }
    }

    /// An inner node.
    pub fn branch(kind: impl Into<String>, pos: u32, length: u32, children: Vec<ParsedNode>) -> Self {
        Self {
            kind: kind.into(),
            label: None,
            pos,
            length,
            children,
        }
    }

    /// Sets the label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Offset one past the last covered byte.
    pub fn end(&self) -> u32 {
        self.pos.saturating_add(self.length)
    }
}

/// Interns parsed trees into a [`NodeStore`].
pub struct TreeBuilder<'s> {
    store: &'s mut NodeStore,
    source: &'s str,
}

struct Frame<'p> {
    parsed: &'p ParsedNode,
    next: usize,
    cursor: u32,
    acc: ChildAccumulator,
}

impl<'p> Frame<'p> {
    fn new(parsed: &'p ParsedNode) -> Self {
        Self {
            parsed,
            next: 0,
            cursor: parsed.pos,
            acc: ChildAccumulator::with_capacity(parsed.children.len()),
        }
    }
}

impl<'s> TreeBuilder<'s> {
    /// Creates a builder for trees parsed from `source`.
    pub fn new(store: &'s mut NodeStore, source: &'s str) -> Self {
        Self { store, source }
    }

    /// Interns `root` and all its descendants, children before parents.
    pub fn build(&mut self, root: &ParsedNode) -> TreeResult<Interned> {
        let nodes_before = self.store.len();
        let mut stack = vec![Frame::new(root)];
        let mut built = None;

        while let Some(frame) = stack.last_mut() {
            let parsed = frame.parsed;
            if let Some(child) = parsed.children.get(frame.next) {
                if child.pos < frame.cursor || child.pos.checked_add(child.length).is_none() || child.end() > parsed.end() {
                    return Err(TreeError::InvalidSpan {
                        kind: child.kind.clone(),
                        start: child.pos,
                        end: child.end(),
                    });
                }
                if child.pos > frame.cursor {
                    let padding = self.padding(frame.cursor, child.pos)?;
                    frame.acc.push(padding);
                }
                frame.next += 1;
                frame.cursor = child.end();
                stack.push(Frame::new(child));
                continue;
            }

            if !parsed.children.is_empty() && frame.cursor < parsed.end() {
                let padding = self.padding(frame.cursor, parsed.end())?;
                frame.acc.push(padding);
            }
            let Some(frame) = stack.pop() else { break };
            let ty = self.store.type_symbol(&parsed.kind);
            let label = parsed
                .label
                .as_deref()
                .and_then(|label| self.store.label_symbol(label));
            let interned = self.store.intern(ty, label, frame.acc, parsed.length)?;
            match stack.last_mut() {
                Some(parent) => parent.acc.push(interned),
                None => built = Some(interned),
            }
        }

        let interned = built.ok_or_else(|| TreeError::InvalidSpan {
            kind: root.kind.clone(),
            start: root.pos,
            end: root.end(),
        })?;
        debug!(
            root = %interned.node,
            size = interned.metrics.size,
            new_nodes = self.store.len() - nodes_before,
            "built tree"
        );
        Ok(interned)
    }

    fn padding(&mut self, start: u32, end: u32) -> TreeResult<Interned> {
        let text = self
            .source
            .get(start as usize..end as usize)
            .ok_or(TreeError::SourceOutOfRange { start, end })?;
        let ty = self.store.spaces_type();
        let label = self.store.label_symbol(text);
        self.store
            .intern(ty, label, ChildAccumulator::new(), end - start)
    }
}
