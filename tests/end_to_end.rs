//! End-to-end scenarios (spec.md §8): round-trip, idempotence, matching
//! symmetry, index consistency, hash stability, toggle involution,
//! context locality, and the six concrete JsonML worked examples.

use corymb::families::jsonml::{self, JsonMl, JsonMlFamily};
use corymb::{apply, decode, diff, encode, ApplyMode, DefaultHandlerFactory, HandlerFactory};
use corymb::{xcc_diff, IndexedTree, OperationType, ResolverConfig};

fn indexed(value: serde_json::Value) -> IndexedTree<JsonMl> {
    IndexedTree::build(jsonml::jsonml_tree(&value).unwrap())
}

fn jsonml_value(tree: &corymb::Tree<JsonMl>) -> serde_json::Value {
    serde_json::from_str(&jsonml::serialize(tree).unwrap()).unwrap()
}

// -- invariants --

#[test]
fn round_trip_turns_a_into_b() {
    let a = indexed(serde_json::json!(["ul", {"class": "x"}, ["li", "a"], ["li", "b"]]));
    let b = indexed(serde_json::json!(["ol", ["li", "a"], ["li", "z"], ["li", "c"]]));

    let patch = diff(&a, &b);
    let mut target = a.tree().clone();
    let report = apply(&patch, &mut target, ApplyMode::Strict, ResolverConfig::default()).unwrap();
    assert_eq!(report.skipped.len(), 0);

    assert_eq!(jsonml_value(&target), jsonml_value(b.tree()));
}

#[test]
fn idempotence_of_matching_yields_empty_patch() {
    let a = indexed(serde_json::json!(["div", ["p", "hello"], ["p", "world"]]));
    let patch = diff(&a, &a);
    assert!(patch.is_empty());
}

#[test]
fn matching_symmetry_holds_for_every_pair() {
    let a = indexed(serde_json::json!(["ul", ["li", "a"], ["li", "b"], ["li", "c"]]));
    let b = indexed(serde_json::json!(["ul", ["li", "a"], ["li", "x"], ["li", "c"]]));
    let matching = xcc_diff(&a, &b);
    assert!(!matching.is_empty());
    for (na, nb) in matching.pairs() {
        assert_eq!(matching.partner_in_a(nb), Some(na));
        assert_eq!(matching.partner_in_b(na), Some(nb));
    }
}

#[test]
fn index_consistency_after_build() {
    let tree = indexed(serde_json::json!(["ul", ["li", "a"], ["li", "b"], ["li", "c"]]));
    for (pos, &node) in tree.doc_order().order().iter().enumerate() {
        assert_eq!(tree.doc_order().position(node), Some(pos));
        assert_eq!(tree.doc_order().node_at(pos), Some(node));

        // `get(node, 0)` must resolve back to `node` itself regardless of
        // which index it's asked of, and the node's own depth must contain
        // it somewhere between that depth's recorded first and last.
        assert_eq!(tree.generations().get(node, 0), Some(node));
        let depth = tree.tree().depth(node);
        assert!(tree.generations().first(depth).is_some());
        assert!(tree.generations().last(depth).is_some());
    }
}

#[test]
fn hash_stability_for_structurally_equal_subtrees() {
    let a = indexed(serde_json::json!(["li", "repeat"]));
    let b = indexed(serde_json::json!(["li", "repeat"]));
    assert_eq!(
        a.hashes().subtree_hash(a.root()),
        b.hashes().subtree_hash(b.root())
    );
}

#[test]
fn toggle_involution_restores_serialization() {
    let a = indexed(serde_json::json!(["p", "hello"]));
    let b = indexed(serde_json::json!(["p", "world"]));
    let patch = diff(&a, &b);
    assert_eq!(patch.len(), 1);

    let mut target = a.tree().clone();
    let indexed_target = IndexedTree::build(target.clone());
    let resolver = corymb::ContextResolver::new(&indexed_target, ResolverConfig::default());
    let anchor = resolver.resolve(&patch.operations[0]).unwrap();
    let op = corymb::AttachedOperation {
        detached: patch.operations[0].clone(),
        anchor,
    };

    let mut hunk = DefaultHandlerFactory::create_operation_handler(&op);
    let before = jsonml::serialize(&target).unwrap();

    hunk.activate(&mut target).unwrap();
    hunk.toggle(&mut target).unwrap();
    let after = jsonml::serialize(&target).unwrap();
    assert_eq!(before, after);
}

#[test]
fn context_locality_survives_unrelated_drift() {
    let a = indexed(serde_json::json!(["ul", ["li", "a"], ["li", "b"], ["li", "c"]]));
    let b = indexed(serde_json::json!(["ul", ["li", "a"], ["li", "B"], ["li", "c"]]));
    let patch = diff(&a, &b);

    // A' differs from A only far outside the k=4 window around the edit.
    let a_prime = jsonml::jsonml_tree(&serde_json::json!([
        "ul",
        ["li", "a"],
        ["li", "b"],
        ["li", "c"],
        ["li", "unrelated-tail-addition"]
    ]))
    .unwrap();
    let mut target = a_prime.clone();
    let report = apply(&patch, &mut target, ApplyMode::Strict, ResolverConfig::default()).unwrap();
    assert_eq!(report.applied, patch.len());
    assert_eq!(
        jsonml_value(&target),
        serde_json::json!(["ul", ["li", "a"], ["li", "B"], ["li", "c"], ["li", "unrelated-tail-addition"]])
    );
}

// -- concrete worked scenarios of spec.md §8 (JsonML, k=4) --

#[test]
fn scenario_1_empty_diff() {
    let a = indexed(serde_json::json!(["article"]));
    let b = indexed(serde_json::json!(["article"]));
    let patch = diff(&a, &b);
    assert!(patch.is_empty());

    let mut target = indexed(serde_json::json!(["section", ["p", "x"]])).tree().clone();
    let before = jsonml::serialize(&target).unwrap();
    apply(&patch, &mut target, ApplyMode::Strict, ResolverConfig::default()).unwrap();
    assert_eq!(jsonml::serialize(&target).unwrap(), before);
}

#[test]
fn scenario_2_text_change() {
    let a = indexed(serde_json::json!(["p", "hello"]));
    let b = indexed(serde_json::json!(["p", "world"]));
    let patch = diff(&a, &b);

    assert_eq!(patch.len(), 1);
    let op = &patch.operations[0];
    assert_eq!(op.op_type, OperationType::UpdateForest);
    assert_eq!(op.path, vec![0]);
    assert_eq!(op.head, vec![0, 0, 0, 0]);
    assert_eq!(op.tail, vec![0, 0, 0, 0]);
}

#[test]
fn scenario_3_attribute_addition() {
    let a = indexed(serde_json::json!(["a"]));
    let b = indexed(serde_json::json!(["a", {"href": "x"}]));
    let patch = diff(&a, &b);

    assert_eq!(patch.len(), 1);
    let op = &patch.operations[0];
    assert_eq!(op.op_type, OperationType::UpdateNode);
    assert!(op.path.is_empty());
    assert_eq!(op.remove.len(), 1);
    assert_eq!(op.insert.len(), 1);
}

#[test]
fn scenario_4_insertion_between_siblings() {
    let a = indexed(serde_json::json!(["ul", ["li", "a"], ["li", "c"]]));
    let b = indexed(serde_json::json!(["ul", ["li", "a"], ["li", "b"], ["li", "c"]]));
    let patch = diff(&a, &b);

    assert_eq!(patch.len(), 1);
    let op = &patch.operations[0];
    assert_eq!(op.op_type, OperationType::UpdateForest);
    assert_eq!(op.path, vec![1]);
    assert!(op.remove.is_empty());
    assert_eq!(op.insert.len(), 1);
    assert!(op.head.iter().any(|&h| h != 0));
    assert!(op.tail.iter().any(|&h| h != 0));
}

#[test]
fn scenario_5_context_based_resolution() {
    let a = indexed(serde_json::json!(["ul", ["li", "a"], ["li", "c"]]));
    let b = indexed(serde_json::json!(["ul", ["li", "a"], ["li", "b"], ["li", "c"]]));
    let patch = diff(&a, &b);

    let mut a_prime =
        jsonml::jsonml_tree(&serde_json::json!(["ul", ["li", "a"], ["li", "c"], ["li", "d"]])).unwrap();
    let report = apply(&patch, &mut a_prime, ApplyMode::Strict, ResolverConfig::default()).unwrap();
    assert_eq!(report.applied, 1);
    assert_eq!(
        jsonml_value(&a_prime),
        serde_json::json!(["ul", ["li", "a"], ["li", "b"], ["li", "c"], ["li", "d"]])
    );
}

#[test]
fn scenario_6_resolution_failure_leaves_target_unchanged() {
    let a = indexed(serde_json::json!(["ul", ["li", "a"], ["li", "c"]]));
    let b = indexed(serde_json::json!(["ul", ["li", "a"], ["li", "b"], ["li", "c"]]));
    let patch = diff(&a, &b);

    let mut a_double_prime = jsonml::jsonml_tree(&serde_json::json!(["ol", ["x"]])).unwrap();
    let before = jsonml::serialize(&a_double_prime).unwrap();
    let result = apply(&patch, &mut a_double_prime, ApplyMode::Strict, ResolverConfig::default());
    assert!(result.is_err());
    assert_eq!(jsonml::serialize(&a_double_prime).unwrap(), before);
}

// -- wire format --

#[test]
fn encode_then_decode_preserves_apply_behavior() {
    let a = indexed(serde_json::json!(["ul", ["li", "a"], ["li", "c"]]));
    let b = indexed(serde_json::json!(["ul", ["li", "a"], ["li", "b"], ["li", "c"]]));
    let patch = diff(&a, &b);

    let encoded = encode::<JsonMl, JsonMlFamily>(&patch).unwrap();
    let round_tripped = decode::<JsonMl, JsonMlFamily>(&encoded).unwrap();

    let mut target = a.tree().clone();
    let report = apply(&round_tripped, &mut target, ApplyMode::Strict, ResolverConfig::default()).unwrap();
    assert_eq!(report.skipped.len(), 0);
    assert_eq!(jsonml_value(&target), jsonml_value(b.tree()));
}
