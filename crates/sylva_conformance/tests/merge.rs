//! End-to-end merges of matcher actions into versioned trees.

use sylva_common::Version;
use sylva_conformance::{
    class_foo, class_foo_with_field, class_foo_with_method, init_tracing, intern, node_at, BODY_START, CLASS_FOO,
    CLASS_FOO_WITH_FIELD, CLASS_FOO_WITH_METHOD,
};
use sylva_config::{DebugConfig, MergeConfig};
use sylva_tree::{NodeId, NodePath, NodeStore};
use sylva_versioned::{
    debug_string_at, merge, to_history_string, Action, NewSubtree, VNodeId, VersionedError, VersionedTree,
};

struct Scenario {
    store: NodeStore,
    old: NodeId,
    new: NodeId,
    tree: VersionedTree,
}

fn scenario() -> Scenario {
    init_tracing();
    let mut store = NodeStore::new();
    let old = intern(&mut store, CLASS_FOO, &class_foo()).unwrap().node;
    let new = intern(&mut store, CLASS_FOO_WITH_FIELD, &class_foo_with_field()).unwrap().node;
    let tree = VersionedTree::from_plain(&store, old, 0, Version::new(1)).unwrap();
    Scenario { store, old, new, tree }
}

fn insert_field(s: &Scenario) -> Action {
    let field = node_at(&s.store, s.new, &[0, 4, 1]).unwrap();
    Action::TreeInsert {
        parent: NodePath::encode(&[0, 4]),
        subtree: NewSubtree {
            root: field,
            pos: BODY_START,
        },
        position: 1,
    }
}

fn body(tree: &VersionedTree) -> VNodeId {
    let class = tree.children(tree.root()).unwrap()[0];
    tree.children(class).unwrap()[4]
}

fn type_names(s: &Scenario, ids: &[VNodeId]) -> Vec<String> {
    ids.iter()
        .map(|&id| s.store.type_name(s.tree.node(id).unwrap().ty).to_string())
        .collect()
}

#[test]
fn inserted_field_is_visible_from_its_version_on() {
    let mut s = scenario();
    let actions = [insert_field(&s)];
    let report = merge(
        &mut s.tree,
        &s.store,
        Version::new(1),
        s.old,
        Version::new(2),
        &actions,
        &MergeConfig::default(),
    )
    .unwrap();
    assert_eq!(report.applied, 1);
    assert!(report.unapplied.is_empty());
    assert_eq!(report.inserted_nodes, 5);

    let body = body(&s.tree);
    let at1 = s.tree.children_at(body, Version::new(1)).unwrap();
    let at2 = s.tree.children_at(body, Version::new(2)).unwrap();
    let current = s.tree.children(body).unwrap();
    assert_eq!(type_names(&s, &at1), vec!["{", "}"]);
    assert_eq!(type_names(&s, &at2), vec!["{", "field_declaration", "}"]);
    assert_eq!(current, at2);

    let field = s.tree.node(at2[1]).unwrap();
    assert_eq!(field.insert_version, Some(Version::new(2)));
    assert_eq!((field.pos, field.length), (11, 6));
}

#[test]
fn debug_strings_per_version() {
    let mut s = scenario();
    let actions = [insert_field(&s)];
    merge(&mut s.tree, &s.store, Version::new(1), s.old, Version::new(2), &actions, &MergeConfig::default())
        .unwrap();
    let config = DebugConfig::default();

    let v1 = debug_string_at(&s.tree, &s.store, Version::new(1), &config).unwrap();
    assert!(!v1.contains("field_declaration"));
    assert!(v1.starts_with("program [0,12]\n  class_declaration [0,12]\n    class [0,5]\n"));

    let v2 = debug_string_at(&s.tree, &s.store, Version::new(2), &config).unwrap();
    assert!(v2.contains("      field_declaration [11,17]\n        integral_type: int [11,14]\n"));
    assert!(v2.contains("        identifier: x [15,16]\n"));

    let history = to_history_string(&s.tree, &s.store, &config).unwrap();
    assert!(history.contains("2- field_declaration@@\n"));
    assert!(history.contains("1- identifier@@Foo\n"));
}

#[test]
fn next_merge_starts_from_the_merged_version() {
    let mut s = scenario();
    let config = MergeConfig::default();
    let actions = [insert_field(&s)];
    merge(&mut s.tree, &s.store, Version::new(1), s.old, Version::new(2), &actions, &config).unwrap();

    // Back to the original text: delete the field, rename the class.
    let label = s.store.label_symbol("Bar");
    let actions = [
        Action::TreeDelete {
            node: NodePath::encode(&[0, 4, 1]),
        },
        Action::Update {
            node: NodePath::encode(&[0, 2]),
            label,
        },
    ];
    let report = merge(&mut s.tree, &s.store, Version::new(2), s.new, Version::new(3), &actions, &config).unwrap();
    assert_eq!(report.applied, 2);

    let body = body(&s.tree);
    assert_eq!(s.tree.children_at(body, Version::new(3)).unwrap().len(), 2);
    assert_eq!(s.tree.children_at(body, Version::new(2)).unwrap().len(), 3);
    assert_eq!(s.tree.children_at(body, Version::new(1)).unwrap().len(), 2);

    let class = s.tree.children(s.tree.root()).unwrap()[0];
    let name_at = |v: u64| {
        let id = s.tree.children_at(class, Version::new(v)).unwrap()[2];
        let label = s.tree.node(id).unwrap().label.unwrap();
        s.store.label_text(label).to_string()
    };
    assert_eq!((name_at(1), name_at(2), name_at(3)), ("Foo".to_string(), "Foo".to_string(), "Bar".to_string()));

    // The field is gone at version 3, so the version 2 tree no longer matches.
    let err = merge(&mut s.tree, &s.store, Version::new(3), s.new, Version::new(4), &[], &config).unwrap_err();
    assert!(matches!(err, VersionedError::Desynchronized { .. }));
}

#[test]
fn replacing_a_member_keeps_the_closing_brace_last() {
    init_tracing();
    let mut store = NodeStore::new();
    let old = intern(&mut store, CLASS_FOO_WITH_METHOD, &class_foo_with_method()).unwrap().node;
    let new = intern(&mut store, CLASS_FOO_WITH_FIELD, &class_foo_with_field()).unwrap().node;
    let field = node_at(&store, new, &[0, 4, 1]).unwrap();
    let mut tree = VersionedTree::from_plain(&store, old, 0, Version::new(1)).unwrap();
    // Position 2 is after the method in version 1, before "}".
    let actions = [
        Action::TreeInsert {
            parent: NodePath::encode(&[0, 4]),
            subtree: NewSubtree {
                root: field,
                pos: BODY_START,
            },
            position: 2,
        },
        Action::TreeDelete {
            node: NodePath::encode(&[0, 4, 1]),
        },
    ];
    let config = MergeConfig {
        strict: true,
        ..MergeConfig::default()
    };
    let report = merge(&mut tree, &store, Version::new(1), old, Version::new(2), &actions, &config).unwrap();
    assert_eq!((report.inserted_nodes, report.removed_nodes), (5, 4));

    let body = body(&tree);
    let names = |version| -> Vec<String> {
        tree.children_at(body, Version::new(version))
            .unwrap()
            .iter()
            .map(|&id| store.type_name(tree.node(id).unwrap().ty).to_string())
            .collect()
    };
    assert_eq!(names(1), vec!["{", "method_declaration", "}"]);
    assert_eq!(names(2), vec!["{", "field_declaration", "}"]);
}

#[test]
fn mismatching_old_tree_is_rejected_without_changes() {
    let mut s = scenario();
    let before = to_history_string(&s.tree, &s.store, &DebugConfig::default()).unwrap();
    // The class body of the new tree has one child more than version 1.
    for check_types in [true, false] {
        let config = MergeConfig {
            check_types,
            ..MergeConfig::default()
        };
        let actions = [Action::Delete {
            node: NodePath::encode(&[0, 0]),
        }];
        let err = merge(&mut s.tree, &s.store, Version::new(1), s.new, Version::new(2), &actions, &config)
            .unwrap_err();
        assert!(matches!(err, VersionedError::Desynchronized { .. }), "{err}");
    }
    assert!(!s.tree.has_version(Version::new(2)));
    assert_eq!(to_history_string(&s.tree, &s.store, &DebugConfig::default()).unwrap(), before);
}

#[test]
fn unrecorded_old_version_is_rejected() {
    let mut s = scenario();
    let err = merge(&mut s.tree, &s.store, Version::new(5), s.old, Version::new(6), &[], &MergeConfig::default())
        .unwrap_err();
    assert_eq!(err, VersionedError::UnknownVersion { version: Version::new(5) });
}

#[test]
fn snapshot_preserves_history() {
    let mut s = scenario();
    let actions = [insert_field(&s)];
    merge(&mut s.tree, &s.store, Version::new(1), s.old, Version::new(2), &actions, &MergeConfig::default())
        .unwrap();
    let bytes = s.tree.to_snapshot(&s.store).unwrap();

    let mut store = NodeStore::new();
    let restored = VersionedTree::from_snapshot(&bytes, &mut store).unwrap();
    let config = DebugConfig::default();
    for v in 1..=2 {
        assert_eq!(
            debug_string_at(&restored, &store, Version::new(v), &config).unwrap(),
            debug_string_at(&s.tree, &s.store, Version::new(v), &config).unwrap()
        );
    }
    assert_eq!(restored.latest_version(), Some(Version::new(2)));
}
