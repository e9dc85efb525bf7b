//! XCC tree matcher.
//!
//! Pairs the roots unconditionally, then alternates a top-down
//! subtree-identity pass and a bottom-up node-equality pass until neither
//! makes further progress, producing a reusable node-to-node [`Matching`]
//! that can be fed to both the editor and, independently, to
//! round-trip/idempotence tests.

use tracing::{debug, debug_span};

use crate::hash::NodePayload;
use crate::id::NodeId;
use crate::index::IndexedTree;
use crate::matching::Matching;

/// `eqT`: two subtrees are equal iff their tree-hashes match AND a
/// structural recheck in document order confirms `eqN` pairwise. The
/// recheck defends against FNV-1a collisions; when it fails despite equal
/// hashes, this is a detected hash collision, silently demoted to
/// "not equal" here.
fn subtrees_equal<P: NodePayload>(a: &IndexedTree<P>, b: &IndexedTree<P>, na: NodeId, nb: NodeId) -> bool {
    if a.hashes().subtree_hash(na) != b.hashes().subtree_hash(nb) {
        return false;
    }

    let (a_start, a_end) = a.doc_order().subtree_span(na);
    let (b_start, b_end) = b.doc_order().subtree_span(nb);
    if a_end - a_start != b_end - b_start {
        // hash collision between subtrees of different shape
        return false;
    }

    a.doc_order().order()[a_start..a_end]
        .iter()
        .zip(b.doc_order().order()[b_start..b_end].iter())
        .all(|(&x, &y)| a.tree().payload(x).values_equal(b.tree().payload(y)))
}

/// `eqN`: local payload equality only.
fn nodes_equal<P: NodePayload>(a: &IndexedTree<P>, b: &IndexedTree<P>, na: NodeId, nb: NodeId) -> bool {
    a.tree().payload(na).values_equal(b.tree().payload(nb))
}

/// Pair every node of the (already hash-confirmed-identical) subtrees
/// rooted at `na`/`nb`, by zipping their document-order spans.
fn pair_identical_subtrees<P: NodePayload>(
    a: &IndexedTree<P>,
    b: &IndexedTree<P>,
    matching: &mut Matching,
    na: NodeId,
    nb: NodeId,
) {
    let (a_start, a_end) = a.doc_order().subtree_span(na);
    let (b_start, b_end) = b.doc_order().subtree_span(nb);
    for (&x, &y) in a.doc_order().order()[a_start..a_end]
        .iter()
        .zip(b.doc_order().order()[b_start..b_end].iter())
    {
        if !matching.is_matched_a(x) && !matching.is_matched_b(y) {
            let _ = matching.pair(x, y);
        }
    }
}

/// Run the XCC matcher over `tree_a` and `tree_b`, returning the
/// resulting [`Matching`].
pub fn xcc_diff<P: NodePayload>(tree_a: &IndexedTree<P>, tree_b: &IndexedTree<P>) -> Matching {
    debug_span!("diff").in_scope(|| {
        let mut matching = Matching::new();

        // 1. Pair the roots unconditionally.
        matching
            .pair(tree_a.root(), tree_b.root())
            .expect("fresh matching accepts the root pair");

        loop {
            let top_down = top_down_pass(tree_a, tree_b, &mut matching);
            let bottom_up = bottom_up_pass(tree_a, tree_b, &mut matching);
            if !top_down && !bottom_up {
                break;
            }
        }

        debug!("XCC matching produced {} pairs", matching.len());
        matching
    })
}

/// Top-down pass: for every unmatched `a` whose parent is matched to some
/// `b`, search `b`'s children in order for the first unmatched `b'` with
/// `eqT(a, b')`. Tie-break rule: earlier child index wins (we scan in
/// order and take the first hit).
fn top_down_pass<P: NodePayload>(
    tree_a: &IndexedTree<P>,
    tree_b: &IndexedTree<P>,
    matching: &mut Matching,
) -> bool {
    let mut progressed = false;
    let order: Vec<NodeId> = tree_a.doc_order().order().to_vec();

    for a in order {
        if matching.is_matched_a(a) {
            continue;
        }
        let Some(parent) = tree_a.tree().parent(a) else {
            continue;
        };
        let Some(b_parent) = matching.partner_in_b(parent) else {
            continue;
        };

        let candidate = tree_b
            .tree()
            .children(b_parent)
            .iter()
            .copied()
            .find(|&b| !matching.is_matched_b(b) && subtrees_equal(tree_a, tree_b, a, b));

        if let Some(b) = candidate {
            pair_identical_subtrees(tree_a, tree_b, matching, a, b);
            progressed = true;
        }
    }

    progressed
}

/// Bottom-up pass: for every still-unmatched `a` (processed in postorder)
/// whose parent is matched, greedily pair it by `eqN` against the
/// unmatched children of the parent's partner.
fn bottom_up_pass<P: NodePayload>(
    tree_a: &IndexedTree<P>,
    tree_b: &IndexedTree<P>,
    matching: &mut Matching,
) -> bool {
    let mut progressed = false;
    let mut postorder = Vec::with_capacity(tree_a.doc_order().len());
    tree_a
        .tree()
        .for_each_postorder(tree_a.root(), |id| postorder.push(id));

    for a in postorder {
        if matching.is_matched_a(a) {
            continue;
        }
        let Some(parent) = tree_a.tree().parent(a) else {
            continue;
        };
        let Some(b_parent) = matching.partner_in_b(parent) else {
            continue;
        };

        let candidate = tree_b
            .tree()
            .children(b_parent)
            .iter()
            .copied()
            .find(|&b| !matching.is_matched_b(b) && nodes_equal(tree_a, tree_b, a, b));

        if let Some(b) = candidate {
            if matching.pair(a, b).is_ok() {
                progressed = true;
            }
        }
    }

    progressed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::families::jsonml::{jsonml_tree, JsonMl};

    fn indexed(value: serde_json::Value) -> IndexedTree<JsonMl> {
        IndexedTree::build(jsonml_tree(&value).unwrap())
    }

    #[test]
    fn identical_trees_pair_every_node() {
        let a = indexed(serde_json::json!(["p", "hello"]));
        let b = indexed(serde_json::json!(["p", "hello"]));
        let m = xcc_diff(&a, &b);
        assert_eq!(m.len(), a.doc_order().len());
    }

    #[test]
    fn text_change_still_pairs_root_and_parent() {
        let a = indexed(serde_json::json!(["p", "hello"]));
        let b = indexed(serde_json::json!(["p", "world"]));
        let m = xcc_diff(&a, &b);
        assert_eq!(m.partner_in_b(a.root()), Some(b.root()));
    }
}
