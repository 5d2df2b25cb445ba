//! Conformance fixtures for the Sylva workspace.
//!
//! Provides small parsed Java-like trees, with their source text, that the
//! integration tests intern, version and merge.

#![warn(missing_docs)]

use sylva_tree::{Interned, NodeId, NodeStore, ParsedNode, TreeBuilder, TreeResult};
use tracing_subscriber::EnvFilter;

/// Source of the base fixture.
pub const CLASS_FOO: &str = "class Foo {}";

/// [`CLASS_FOO`] after adding the field `int x;`.
pub const CLASS_FOO_WITH_FIELD: &str = "class Foo {int x;}";

/// A class whose body holds the method `m()`.
pub const CLASS_FOO_WITH_METHOD: &str = "class Foo {m()}";

/// Byte offset of the class body's content, right after `{`.
pub const BODY_START: u32 = 11;

/// Installs a test subscriber honoring `RUST_LOG`. Safe to call from every
/// test; only the first call has an effect.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Interns `parsed`, whose offsets refer to `source`, into `store`.
pub fn intern(store: &mut NodeStore, source: &str, parsed: &ParsedNode) -> TreeResult<Interned> {
    TreeBuilder::new(store, source).build(parsed)
}

fn program(body: Vec<ParsedNode>, length: u32) -> ParsedNode {
    let body_len = length - 10;
    let mut members = vec![ParsedNode::token("{", 10)];
    members.extend(body);
    members.push(ParsedNode::token("}", length - 1));
    ParsedNode::branch(
        "program",
        0,
        length,
        vec![ParsedNode::branch(
            "class_declaration",
            0,
            length,
            vec![
                ParsedNode::token("class", 0),
                ParsedNode::labeled("identifier", "Foo", 6),
                ParsedNode::branch("class_body", 10, body_len, members),
            ],
        )],
    )
}

/// `class Foo {}`: the class body is at path `[0, 4]`, after the `class`
/// keyword, a space, the name and another space.
pub fn class_foo() -> ParsedNode {
    program(Vec::new(), CLASS_FOO.len() as u32)
}

/// The field declaration `int x;` starting at `pos`.
pub fn field_int_x(pos: u32) -> ParsedNode {
    ParsedNode::branch(
        "field_declaration",
        pos,
        6,
        vec![
            ParsedNode::labeled("integral_type", "int", pos),
            ParsedNode::labeled("identifier", "x", pos + 4),
            ParsedNode::token(";", pos + 5),
        ],
    )
}

/// `class Foo {int x;}`.
pub fn class_foo_with_field() -> ParsedNode {
    program(vec![field_int_x(BODY_START)], CLASS_FOO_WITH_FIELD.len() as u32)
}

/// `class Foo {m()}`: the method has three descendants.
pub fn class_foo_with_method() -> ParsedNode {
    let method = ParsedNode::branch(
        "method_declaration",
        BODY_START,
        3,
        vec![
            ParsedNode::labeled("identifier", "m", BODY_START),
            ParsedNode::token("(", BODY_START + 1),
            ParsedNode::token(")", BODY_START + 2),
        ],
    );
    program(vec![method], CLASS_FOO_WITH_METHOD.len() as u32)
}

/// Follows child indices from `root` in a stored tree.
pub fn node_at(store: &NodeStore, root: NodeId, offsets: &[usize]) -> Option<NodeId> {
    offsets
        .iter()
        .try_fold(root, |id, &offset| store.try_node(id)?.child(offset))
}
