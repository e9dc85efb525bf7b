//! The delta model and editor.
//!
//! `extract_operations` walks a [`Matching`] in postorder over tree A and
//! emits [`DetachedContextOperation`]s: per-sibling-run edits computed via
//! an LCS alignment are grouped into contiguous runs and turned into a
//! closed two-operation-kind model, with fingerprints attached at emission
//! time and no immediate application — this editor only ever reads tree A.

use tracing::debug_span;

use crate::arena::Fragment;
use crate::edit::{lcs_edits, Edit};
use crate::fingerprint::FingerprintFactory;
use crate::hash::NodePayload;
use crate::id::NodeId;
use crate::index::IndexedTree;
use crate::matching::Matching;

/// The two operation kinds: a closed tagged variant, not a trait hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationType {
    UpdateNode,
    UpdateForest,
}

/// A family-neutral, serializable edit anchored by path and fingerprint
/// rather than by a live node reference.
#[derive(Debug, Clone)]
pub struct DetachedContextOperation<P> {
    pub op_type: OperationType,
    /// Child indices from root to the anchor (the node itself for
    /// `UpdateNode`, the parent plus slot index for `UpdateForest`).
    pub path: Vec<usize>,
    pub remove: Vec<Fragment<P>>,
    pub insert: Vec<Fragment<P>>,
    pub head: Vec<u32>,
    pub tail: Vec<u32>,
}

/// A position in a tree identifying either an existing node or a slot
/// between siblings.
#[derive(Debug, Clone, Copy)]
pub struct Anchor {
    pub base: NodeId,
    pub index: usize,
    pub target: Option<NodeId>,
}

/// A [`DetachedContextOperation`] bound to a concrete [`Anchor`] in a
/// specific target tree.
#[derive(Debug, Clone)]
pub struct AttachedOperation<P> {
    pub detached: DetachedContextOperation<P>,
    pub anchor: Anchor,
}

/// Group edits whose dest_index are within 1 of each other into maximal
/// contiguous runs, so one run becomes one patch operation instead of one
/// per individual child edit.
fn group_runs(mut edits: Vec<Edit>) -> Vec<Vec<Edit>> {
    edits.sort_by_key(Edit::dest_index);
    let mut runs: Vec<Vec<Edit>> = Vec::new();
    for edit in edits {
        let idx = edit.dest_index();
        match runs.last_mut() {
            Some(run) if idx <= run.last().unwrap().dest_index() + 1 => run.push(edit),
            _ => runs.push(vec![edit]),
        }
    }
    runs
}

/// Walk `matching` in postorder over `tree_a`, emitting operations that
/// turn tree A into tree B.
pub fn extract_operations<P: NodePayload>(
    tree_a: &IndexedTree<P>,
    tree_b: &IndexedTree<P>,
    matching: &Matching,
) -> Vec<DetachedContextOperation<P>> {
    debug_span!("extract").in_scope(|| {
        let fingerprints = FingerprintFactory::new(tree_a);
        let mut ops = Vec::new();

        let mut postorder = Vec::with_capacity(tree_a.doc_order().len());
        tree_a
            .tree()
            .for_each_postorder(tree_a.root(), |id| postorder.push(id));

        for na in postorder {
            let Some(nb) = matching.partner_in_b(na) else {
                continue;
            };

            let children_a = tree_a.tree().children(na).to_vec();
            let children_b = tree_b.tree().children(nb).to_vec();

            // A node's own payload and its children's alignment are
            // independent axes of change; both must be checked regardless
            // of the other, or a tag/attribute change on a node whose
            // children also gained or lost a sibling is silently dropped.
            if !tree_a.tree().payload(na).values_equal(tree_b.tree().payload(nb)) {
                ops.push(update_node(tree_a, tree_b, &fingerprints, na, nb));
            }

            let edits = lcs_edits(&children_a, &children_b, |&ca, &cb| {
                matching.partner_in_b(ca) == Some(cb)
            });

            for run in group_runs(edits) {
                ops.push(update_forest(
                    tree_a,
                    tree_b,
                    &fingerprints,
                    na,
                    &children_a,
                    &children_b,
                    &run,
                ));
            }
        }

        ops
    })
}

fn update_node<P: NodePayload>(
    tree_a: &IndexedTree<P>,
    tree_b: &IndexedTree<P>,
    fingerprints: &FingerprintFactory<P>,
    na: NodeId,
    nb: NodeId,
) -> DetachedContextOperation<P> {
    let scope_parent = tree_a.tree().parent(na).unwrap_or(na);
    let anchor_pos = tree_a.doc_order().position(na).unwrap_or(0);
    let run_len = tree_a.doc_order().subtree_size(na);
    let (head, tail) = fingerprints.fingerprint(scope_parent, anchor_pos, run_len);

    DetachedContextOperation {
        op_type: OperationType::UpdateNode,
        path: tree_a.tree().path_to(na),
        remove: vec![tree_a.tree().extract_fragment(na).leaf_only()],
        insert: vec![tree_b.tree().extract_fragment(nb).leaf_only()],
        head,
        tail,
    }
}

fn update_forest<P: NodePayload>(
    tree_a: &IndexedTree<P>,
    tree_b: &IndexedTree<P>,
    fingerprints: &FingerprintFactory<P>,
    parent_a: NodeId,
    children_a: &[NodeId],
    children_b: &[NodeId],
    run: &[Edit],
) -> DetachedContextOperation<P> {
    let mut removed: Vec<(usize, NodeId)> = Vec::new();
    let mut inserted: Vec<(usize, NodeId)> = Vec::new();

    for edit in run {
        match *edit {
            Edit::Delete { dest_index } => removed.push((dest_index, children_a[dest_index])),
            Edit::Replace {
                dest_index,
                source_index,
            } => {
                removed.push((dest_index, children_a[dest_index]));
                inserted.push((dest_index, children_b[source_index]));
            }
            Edit::Insert {
                dest_index,
                source_index,
            } => inserted.push((dest_index, children_b[source_index])),
        }
    }
    removed.sort_by_key(|(i, _)| *i);
    inserted.sort_by_key(|(i, _)| *i);

    let slot = run.iter().map(Edit::dest_index).min().unwrap_or(0);

    let anchor_pos = if let Some(&(_, first_removed)) = removed.first() {
        tree_a.doc_order().position(first_removed).unwrap_or(0)
    } else if slot < children_a.len() {
        tree_a.doc_order().position(children_a[slot]).unwrap_or(0)
    } else {
        tree_a.doc_order().subtree_end(parent_a)
    };

    let run_len: usize = removed
        .iter()
        .map(|(_, id)| tree_a.doc_order().subtree_size(*id))
        .sum();

    let (head, tail) = fingerprints.fingerprint(parent_a, anchor_pos, run_len);

    let mut path = tree_a.tree().path_to(parent_a);
    path.push(slot);

    DetachedContextOperation {
        op_type: OperationType::UpdateForest,
        path,
        remove: removed
            .iter()
            .map(|(_, id)| tree_a.tree().extract_fragment(*id))
            .collect(),
        insert: inserted
            .iter()
            .map(|(_, id)| tree_b.tree().extract_fragment(*id))
            .collect(),
        head,
        tail,
    }
}

trait LeafOnly<P> {
    /// For `UPDATE_NODE`, only the node's own payload changes — its
    /// (unchanged, 1:1-aligned) children are not part of the operation.
    fn leaf_only(self) -> Fragment<P>;
}

impl<P: Clone> LeafOnly<P> for Fragment<P> {
    fn leaf_only(self) -> Fragment<P> {
        Fragment::leaf(self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::xcc_diff;
    use crate::families::jsonml::{jsonml_tree, JsonMl};

    fn indexed(value: serde_json::Value) -> IndexedTree<JsonMl> {
        IndexedTree::build(jsonml_tree(&value).unwrap())
    }

    #[test]
    fn text_change_emits_one_update_forest() {
        let a = indexed(serde_json::json!(["p", "hello"]));
        let b = indexed(serde_json::json!(["p", "world"]));
        let matching = xcc_diff(&a, &b);
        let ops = extract_operations(&a, &b, &matching);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].op_type, OperationType::UpdateForest);
        assert_eq!(ops[0].path, vec![0]);
        assert_eq!(ops[0].head, vec![0, 0, 0, 0]);
        assert_eq!(ops[0].tail, vec![0, 0, 0, 0]);
    }

    #[test]
    fn attribute_addition_emits_update_node_at_root() {
        let a = indexed(serde_json::json!(["a"]));
        let b = indexed(serde_json::json!(["a", {"href": "x"}]));
        let matching = xcc_diff(&a, &b);
        let ops = extract_operations(&a, &b, &matching);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].op_type, OperationType::UpdateNode);
        assert!(ops[0].path.is_empty());
    }

    #[test]
    fn sibling_insertion_emits_update_forest_with_context() {
        let a = indexed(serde_json::json!(["ul", ["li", "a"], ["li", "c"]]));
        let b = indexed(serde_json::json!(["ul", ["li", "a"], ["li", "b"], ["li", "c"]]));
        let matching = xcc_diff(&a, &b);
        let ops = extract_operations(&a, &b, &matching);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].path, vec![1]);
        assert!(ops[0].remove.is_empty());
        assert_eq!(ops[0].insert.len(), 1);
        assert!(ops[0].head.iter().any(|&h| h != 0));
        assert!(ops[0].tail.iter().any(|&h| h != 0));
    }

    #[test]
    fn identical_trees_emit_no_operations() {
        let a = indexed(serde_json::json!(["ul", ["li", "a"], ["li", "b"]]));
        let b = indexed(serde_json::json!(["ul", ["li", "a"], ["li", "b"]]));
        let matching = xcc_diff(&a, &b);
        assert!(extract_operations(&a, &b, &matching).is_empty());
    }

    #[test]
    fn root_payload_change_still_emits_update_node_alongside_forest_edits() {
        // The root's tag/attrs change ("ul" -> "ol", class dropped) *and*
        // its children gain a trailing sibling in the same diff. Both must
        // surface: an `UpdateNode` for the root, not just the forest edits
        // for its children.
        let a = indexed(serde_json::json!(["ul", {"class": "x"}, ["li", "a"], ["li", "b"]]));
        let b = indexed(serde_json::json!(["ol", ["li", "a"], ["li", "z"], ["li", "c"]]));
        let matching = xcc_diff(&a, &b);
        let ops = extract_operations(&a, &b, &matching);

        let root_update = ops
            .iter()
            .find(|op| op.op_type == OperationType::UpdateNode && op.path.is_empty());
        assert!(root_update.is_some(), "expected an UpdateNode at the root, got {ops:?}");

        assert!(ops
            .iter()
            .any(|op| op.op_type == OperationType::UpdateForest));
    }
}
