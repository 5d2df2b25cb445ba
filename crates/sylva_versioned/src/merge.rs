//! Merging edit actions into a versioned tree.
//!
//! A merge takes the plain tree the actions were computed against (the
//! "old" tree), checks that it is the versioned tree's state at the old
//! version, and records the actions as the next version.
//!
//! The two trees are walked in lockstep, pre-order, with a [`BiCursor`].
//! The first walk only validates: it pairs every plain node with its
//! versioned counterpart and plans which actions can be applied, insertion
//! positions included, so a mismatching old tree (or a strict merge with
//! inapplicable actions) fails before anything is modified. The second walk
//! applies the planned actions at the visit of the node they are attached
//! to, skipping deleted subtrees. Insertions under a node therefore land
//! before any of its children is tombstoned: their positions count the
//! children the node has at the old version, plus the insertions listed
//! before them.

use crate::action::Action;
use crate::cursor::{BiCursor, PlainCursor, PreOrderWalker, TreeCursor, VersionedCursor};
use crate::error::{VersionedError, VersionedResult};
use crate::ids::VNodeId;
use crate::tree::VersionedTree;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use sylva_common::{Label, Version};
use sylva_config::MergeConfig;
use sylva_tree::{NodeId, NodePath, NodeStore};
use tracing::{debug, trace, warn};

/// Outcome of a successful merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    /// Number of actions applied.
    pub applied: usize,
    /// Indices of the actions that could not be applied, in input order.
    pub unapplied: Vec<usize>,
    /// Versioned nodes created by insertions and updates.
    pub inserted_nodes: usize,
    /// Versioned nodes tombstoned by deletions and updates.
    pub removed_nodes: usize,
}

type Walk = BiCursor<PlainCursor, VersionedCursor>;

/// Records `actions`, computed between the state at `old_version` (whose
/// plain tree is `old_root`) and a new state, as `new_version` of `tree`.
pub fn merge(
    tree: &mut VersionedTree,
    store: &NodeStore,
    old_version: Version,
    old_root: NodeId,
    new_version: Version,
    actions: &[Action],
    config: &MergeConfig,
) -> VersionedResult<MergeReport> {
    if !tree.has_version(old_version) {
        return Err(VersionedError::UnknownVersion {
            version: old_version,
        });
    }
    if let Some(latest) = tree.latest_version() {
        if new_version <= latest {
            return Err(VersionedError::VersionNotNewer {
                version: new_version,
                latest,
            });
        }
    }
    debug!(
        old = %old_version,
        new = %new_version,
        actions = actions.len(),
        "merging actions"
    );

    let mut by_anchor: HashMap<&NodePath, Vec<usize>> = HashMap::new();
    for (index, action) in actions.iter().enumerate() {
        by_anchor.entry(action.anchor()).or_default().push(index);
    }

    let reachable = validate(tree, store, old_version, old_root, actions, &by_anchor, config)?;
    let planned = plan(actions, &by_anchor, &reachable);
    if config.strict {
        let mut rejected = planned.iter().enumerate().filter(|&(_, &ok)| !ok).map(|(index, _)| index);
        if let Some(first) = rejected.next() {
            return Err(VersionedError::UnappliedActions {
                count: 1 + rejected.count(),
                first,
            });
        }
    }

    let mut report = apply(tree, store, old_version, old_root, new_version, actions, &by_anchor, &planned)?;
    tree.record_version(new_version);

    for &index in &report.unapplied {
        warn!(action = %actions[index], index, "action could not be applied");
    }
    report.applied = actions.len() - report.unapplied.len();
    debug!(
        version = %new_version,
        applied = report.applied,
        unapplied = report.unapplied.len(),
        inserted = report.inserted_nodes,
        removed = report.removed_nodes,
        "merge finished"
    );
    Ok(report)
}

/// Walks both trees completely, checking that they correspond. Returns the
/// plain paths the applying walk will visit, each with the number of
/// present children of its versioned counterpart.
fn validate(
    tree: &VersionedTree,
    store: &NodeStore,
    old_version: Version,
    old_root: NodeId,
    actions: &[Action],
    by_anchor: &HashMap<&NodePath, Vec<usize>>,
    config: &MergeConfig,
) -> VersionedResult<HashMap<NodePath, usize>> {
    let mut walk: Walk = BiCursor::new(
        PlainCursor::new(old_root, 0),
        VersionedCursor::new(tree.root(), old_version),
    );
    let mut walker = PreOrderWalker::new();
    let mut reachable = HashMap::new();
    let mut deleted_at: Option<usize> = None;

    loop {
        let path = walk.left().path();
        check_pair(tree, store, &walk, &path, config)?;

        let depth = walk.left().depth();
        if deleted_at.is_some_and(|deleted| depth <= deleted) {
            deleted_at = None;
        }
        if deleted_at.is_none() {
            let deletes_here = by_anchor
                .get(&path)
                .is_some_and(|indices| indices.iter().any(|&i| actions[i].is_delete()));
            if deletes_here {
                deleted_at = Some(depth);
            }
            let present = tree.children(walk.right().node())?.len();
            reachable.insert(path, present);
        }

        if !walker.next(|step| walk.step(step, store, tree)) {
            break;
        }
    }
    if walk.is_invalid() {
        return Err(VersionedError::Desynchronized {
            path: walk.left().path().to_string(),
            reason: format!("child lists differ at version {old_version}"),
        });
    }
    Ok(reachable)
}

fn check_pair(
    tree: &VersionedTree,
    store: &NodeStore,
    walk: &Walk,
    path: &NodePath,
    config: &MergeConfig,
) -> VersionedResult<()> {
    if !config.check_types {
        return Ok(());
    }
    let plain = store.node(walk.left().node())?;
    let versioned = tree.node(walk.right().node())?;
    if plain.ty() != versioned.ty {
        return Err(VersionedError::Desynchronized {
            path: path.to_string(),
            reason: format!(
                "expected `{}`, found `{}`",
                store.try_type_name(versioned.ty).unwrap_or("?"),
                store.try_type_name(plain.ty()).unwrap_or("?")
            ),
        });
    }
    Ok(())
}

/// Decides which actions [`apply`] performs.
///
/// At a node with a deletion only the first deletion applies. Otherwise
/// updates apply everywhere but at the root, and an insertion applies when
/// its position is at most the number of children present at that point.
fn plan(
    actions: &[Action],
    by_anchor: &HashMap<&NodePath, Vec<usize>>,
    reachable: &HashMap<NodePath, usize>,
) -> Vec<bool> {
    let mut planned = vec![false; actions.len()];
    for (&anchor, indices) in by_anchor {
        let Some(&present) = reachable.get(anchor) else {
            continue;
        };
        if let Some(&index) = indices.iter().find(|&&i| actions[i].is_delete()) {
            planned[index] = true;
            continue;
        }
        let mut available = present;
        for &index in indices {
            match &actions[index] {
                Action::Update { .. } => planned[index] = !anchor.is_empty(),
                Action::Insert { position, .. } | Action::TreeInsert { position, .. } => {
                    if *position <= available {
                        planned[index] = true;
                        available += 1;
                    }
                }
                Action::Delete { .. } | Action::TreeDelete { .. } => {}
            }
        }
    }
    planned
}

#[allow(clippy::too_many_arguments)]
fn apply(
    tree: &mut VersionedTree,
    store: &NodeStore,
    old_version: Version,
    old_root: NodeId,
    new_version: Version,
    actions: &[Action],
    by_anchor: &HashMap<&NodePath, Vec<usize>>,
    planned: &[bool],
) -> VersionedResult<MergeReport> {
    let mut report = MergeReport::default();
    let mut redirects: HashMap<VNodeId, VNodeId> = HashMap::new();

    let mut walk: Walk = BiCursor::new(
        PlainCursor::new(old_root, 0),
        VersionedCursor::new(tree.root(), old_version),
    );
    let mut walker = PreOrderWalker::new();

    loop {
        let path = walk.left().path();
        if let Some(indices) = by_anchor.get(&path) {
            let current = walk.right().node();
            let target = |redirects: &HashMap<VNodeId, VNodeId>| redirects.get(&current).copied().unwrap_or(current);
            let mut pending = indices.iter().copied().filter(|&i| planned[i]).peekable();

            if let Some(index) = pending.next_if(|&i| actions[i].is_delete()) {
                let node = target(&redirects);
                report.removed_nodes += tree.delete(node, new_version)?;
                trace!(action = %actions[index], node = %node, "applied deletion");
                walker.skip();
            } else {
                let pending: Vec<usize> = pending.collect();
                for &index in &pending {
                    if let Action::Update { label, .. } = &actions[index] {
                        let node = target(&redirects);
                        update(tree, node, *label, new_version, &mut redirects, &mut report)?;
                        trace!(action = %actions[index], node = %node, "applied update");
                    }
                }
                let parent = target(&redirects);
                for &index in &pending {
                    if let Action::Insert { subtree, position, .. } | Action::TreeInsert { subtree, position, .. } =
                        &actions[index]
                    {
                        let before = tree.len();
                        let created = tree.materialize(store, subtree.root, subtree.pos, Some(new_version))?;
                        tree.insert_child(parent, created, *position)?;
                        report.inserted_nodes += tree.len() - before;
                        trace!(action = %actions[index], node = %created, "applied insertion");
                    }
                }
            }
        }

        if !walker.next(|step| walk.step(step, store, &*tree)) {
            break;
        }
    }
    if walk.is_invalid() {
        return Err(VersionedError::Desynchronized {
            path: walk.left().path().to_string(),
            reason: format!("child lists differ at version {old_version}"),
        });
    }

    report.unapplied = planned
        .iter()
        .enumerate()
        .filter(|&(_, &ok)| !ok)
        .map(|(index, _)| index)
        .collect();
    Ok(report)
}

/// Relabels `target` at `new_version`.
///
/// A node created by this merge is relabeled in place. Any other node is
/// tombstoned and replaced, at the same position, by a relabeled copy of
/// its present subtree; later actions on nodes of that subtree are
/// redirected to their copies.
fn update(
    tree: &mut VersionedTree,
    target: VNodeId,
    label: Option<Label>,
    new_version: Version,
    redirects: &mut HashMap<VNodeId, VNodeId>,
    report: &mut MergeReport,
) -> VersionedResult<()> {
    let node = tree.node(target)?;
    if node.insert_version == Some(new_version) {
        return tree.relabel(target, label);
    }
    let parent = node.parent().ok_or(VersionedError::NoStorage { node: target })?;
    let position = tree
        .child_position(parent, target, Some(new_version))?
        .ok_or(VersionedError::NoStorage { node: target })?;

    let (copy, pairs) = tree.relabeled_copy(target, label, new_version)?;
    report.removed_nodes += tree.delete(target, new_version)?;
    tree.insert_child(parent, copy, position)?;
    report.inserted_nodes += pairs.len();
    redirects.extend(pairs);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::NewSubtree;
    use sylva_tree::{ParsedNode, TreeBuilder};

    struct Fixture {
        store: NodeStore,
        old: NodeId,
        tree: VersionedTree,
    }

    // f(a, b)
    fn fixture() -> Fixture {
        let source = "f(a, b)";
        let parsed = ParsedNode::branch(
            "call",
            0,
            7,
            vec![
                ParsedNode::labeled("identifier", "f", 0),
                ParsedNode::branch(
                    "arguments",
                    1,
                    6,
                    vec![
                        ParsedNode::token("(", 1),
                        ParsedNode::labeled("identifier", "a", 2),
                        ParsedNode::token(",", 3),
                        ParsedNode::labeled("identifier", "b", 5),
                        ParsedNode::token(")", 6),
                    ],
                ),
            ],
        );
        let mut store = NodeStore::new();
        let old = TreeBuilder::new(&mut store, source).build(&parsed).unwrap().node;
        let tree = VersionedTree::from_plain(&store, old, 0, Version::new(1)).unwrap();
        Fixture { store, old, tree }
    }

    fn texts(f: &Fixture, ids: &[VNodeId]) -> Vec<String> {
        ids.iter()
            .map(|&id| {
                let node = f.tree.node(id).unwrap();
                node.label
                    .map(|label| f.store.label_text(label).to_string())
                    .unwrap_or_else(|| f.store.type_name(node.ty).to_string())
            })
            .collect()
    }

    fn arguments(f: &Fixture) -> VNodeId {
        f.tree.children(f.tree.root()).unwrap()[1]
    }

    fn run(f: &mut Fixture, actions: &[Action]) -> VersionedResult<MergeReport> {
        merge(
            &mut f.tree,
            &f.store,
            Version::new(1),
            f.old,
            Version::new(2),
            actions,
            &MergeConfig::default(),
        )
    }

    #[test]
    fn delete_tombstones_subtree() {
        let mut f = fixture();
        let actions = [Action::TreeDelete {
            node: NodePath::encode(&[1, 1]),
        }];
        let report = run(&mut f, &actions).unwrap();
        assert_eq!(report.applied, 1);
        assert_eq!(report.removed_nodes, 1);
        let args = arguments(&f);
        let at2 = f.tree.children_at(args, Version::new(2)).unwrap();
        assert_eq!(texts(&f, &at2), vec!["(", ",", " ", "b", ")"]);
        let at1 = f.tree.children_at(args, Version::new(1)).unwrap();
        assert_eq!(at1.len(), 6);
        assert!(f.tree.has_version(Version::new(2)));
    }

    #[test]
    fn update_replaces_node_at_same_position() {
        let mut f = fixture();
        let label = f.store.label_symbol("g");
        let actions = [Action::Update {
            node: NodePath::encode(&[0]),
            label,
        }];
        let report = run(&mut f, &actions).unwrap();
        assert_eq!((report.inserted_nodes, report.removed_nodes), (1, 1));
        let root = f.tree.root();
        assert_eq!(texts(&f, &f.tree.children_at(root, Version::new(2)).unwrap())[0], "g");
        assert_eq!(texts(&f, &f.tree.children_at(root, Version::new(1)).unwrap())[0], "f");
        assert_eq!(f.tree.all_children(root).unwrap().len(), 3);
    }

    #[test]
    fn update_then_insert_under_the_copy() {
        let mut f = fixture();
        let c = f.store.intern_leaf("identifier", "c").unwrap().node;
        let label = f.store.label_symbol("params");
        let actions = [
            Action::Insert {
                parent: NodePath::encode(&[1]),
                subtree: NewSubtree { root: c, pos: 2 },
                position: 1,
            },
            Action::Update {
                node: NodePath::encode(&[1]),
                label,
            },
            Action::Delete {
                node: NodePath::encode(&[1, 3]),
            },
        ];
        let report = run(&mut f, &actions).unwrap();
        assert!(report.unapplied.is_empty());

        let root = f.tree.root();
        let args_v2 = f.tree.children_at(root, Version::new(2)).unwrap()[1];
        let args_v1 = f.tree.children_at(root, Version::new(1)).unwrap()[1];
        assert_ne!(args_v2, args_v1);
        assert_eq!(f.tree.node(args_v2).unwrap().label, label);
        let at2 = f.tree.children_at(args_v2, Version::new(2)).unwrap();
        assert_eq!(texts(&f, &at2), vec!["(", "c", "a", ",", "b", ")"]);

        let at1 = f.tree.children_at(args_v1, Version::new(1)).unwrap();
        assert_eq!(texts(&f, &at1), vec!["(", "a", ",", " ", "b", ")"]);
    }

    #[test]
    fn insert_positions_count_siblings_deleted_by_the_same_merge() {
        let mut f = fixture();
        let c = f.store.intern_leaf("identifier", "c").unwrap().node;
        // Append after ")" while removing "a": the position is 6, not 5.
        let actions = [
            Action::Insert {
                parent: NodePath::encode(&[1]),
                subtree: NewSubtree { root: c, pos: 6 },
                position: 6,
            },
            Action::Delete {
                node: NodePath::encode(&[1, 1]),
            },
        ];
        let report = run(&mut f, &actions).unwrap();
        assert!(report.unapplied.is_empty());
        let args = arguments(&f);
        let at2 = f.tree.children_at(args, Version::new(2)).unwrap();
        assert_eq!(texts(&f, &at2), vec!["(", ",", " ", "b", ")", "c"]);
    }

    #[test]
    fn out_of_range_insert_is_unapplied() {
        let mut f = fixture();
        let c = f.store.intern_leaf("identifier", "c").unwrap().node;
        let actions = [
            Action::Delete {
                node: NodePath::encode(&[1, 1]),
            },
            Action::Insert {
                parent: NodePath::encode(&[1]),
                subtree: NewSubtree { root: c, pos: 6 },
                position: 6,
            },
            Action::Insert {
                parent: NodePath::encode(&[1]),
                subtree: NewSubtree { root: c, pos: 7 },
                position: 9,
            },
        ];
        let report = run(&mut f, &actions).unwrap();
        assert_eq!(report.unapplied, vec![2]);
        assert_eq!((report.inserted_nodes, report.removed_nodes), (1, 1));
        assert_eq!(f.tree.children_at(arguments(&f), Version::new(2)).unwrap().len(), 6);
    }

    #[test]
    fn strict_out_of_range_insert_leaves_tree_untouched() {
        let mut f = fixture();
        let c = f.store.intern_leaf("identifier", "c").unwrap().node;
        let actions = [
            Action::Delete {
                node: NodePath::encode(&[1, 1]),
            },
            Action::Insert {
                parent: NodePath::encode(&[1]),
                subtree: NewSubtree { root: c, pos: 6 },
                position: 7,
            },
        ];
        let config = MergeConfig {
            strict: true,
            ..MergeConfig::default()
        };
        let err = merge(&mut f.tree, &f.store, Version::new(1), f.old, Version::new(2), &actions, &config)
            .unwrap_err();
        assert_eq!(err, VersionedError::UnappliedActions { count: 1, first: 1 });
        let a = f.tree.children(arguments(&f)).unwrap()[1];
        assert!(f.tree.node(a).unwrap().is_current());
        assert!(!f.tree.has_version(Version::new(2)));
    }

    #[test]
    fn actions_inside_deleted_subtree_are_unapplied() {
        let mut f = fixture();
        let actions = [
            Action::Delete {
                node: NodePath::encode(&[1]),
            },
            Action::Delete {
                node: NodePath::encode(&[1, 1]),
            },
            Action::Update {
                node: NodePath::encode(&[7]),
                label: None,
            },
        ];
        let report = run(&mut f, &actions).unwrap();
        assert_eq!(report.applied, 1);
        assert_eq!(report.unapplied, vec![1, 2]);
        assert_eq!(report.removed_nodes, 7);
    }

    #[test]
    fn strict_merge_fails_before_modifying() {
        let mut f = fixture();
        let actions = [
            Action::Delete {
                node: NodePath::encode(&[0]),
            },
            Action::Update {
                node: NodePath::encode(&[]),
                label: None,
            },
        ];
        let config = MergeConfig {
            strict: true,
            ..MergeConfig::default()
        };
        let err = merge(&mut f.tree, &f.store, Version::new(1), f.old, Version::new(2), &actions, &config)
            .unwrap_err();
        assert_eq!(err, VersionedError::UnappliedActions { count: 1, first: 1 });
        assert!(f.tree.node(f.tree.children(f.tree.root()).unwrap()[0]).unwrap().is_current());
        assert!(!f.tree.has_version(Version::new(2)));
    }

    #[test]
    fn unknown_old_version_is_rejected() {
        let mut f = fixture();
        let err = merge(&mut f.tree, &f.store, Version::new(7), f.old, Version::new(8), &[], &MergeConfig::default())
            .unwrap_err();
        assert_eq!(err, VersionedError::UnknownVersion { version: Version::new(7) });
    }

    #[test]
    fn new_version_must_be_newer() {
        let mut f = fixture();
        let err = merge(&mut f.tree, &f.store, Version::new(1), f.old, Version::new(1), &[], &MergeConfig::default())
            .unwrap_err();
        assert!(matches!(err, VersionedError::VersionNotNewer { .. }));
    }

    #[test]
    fn type_mismatch_desynchronizes() {
        let mut f = fixture();
        // Same shape as the old tree, but the callee is a literal.
        let literal = f.store.intern_leaf("literal", "z").unwrap();
        let arguments = f.store.node(f.old).unwrap().children()[1];
        let mut acc = sylva_tree::ChildAccumulator::new();
        acc.push(literal);
        acc.push(f.store.interned(arguments).unwrap());
        let ty = f.store.type_symbol("call");
        let length = f.store.length(f.old).unwrap();
        let mismatched = f.store.intern(ty, None, acc, length).unwrap().node;

        let err = merge(
            &mut f.tree,
            &f.store,
            Version::new(1),
            mismatched,
            Version::new(2),
            &[],
            &MergeConfig::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            VersionedError::Desynchronized {
                path: "[0]".to_string(),
                reason: "expected `identifier`, found `literal`".to_string(),
            }
        );
        assert!(!f.tree.has_version(Version::new(2)));

        let unchecked = MergeConfig {
            check_types: false,
            ..MergeConfig::default()
        };
        merge(&mut f.tree, &f.store, Version::new(1), mismatched, Version::new(2), &[], &unchecked).unwrap();
    }

    #[test]
    fn shape_mismatch_desynchronizes() {
        let mut f = fixture();
        let leaf = f.store.intern_leaf("identifier", "f").unwrap().node;
        let err = merge(&mut f.tree, &f.store, Version::new(1), leaf, Version::new(2), &[], &MergeConfig::default())
            .unwrap_err();
        assert!(matches!(err, VersionedError::Desynchronized { .. }));
    }
}
