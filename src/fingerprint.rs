//! Fingerprint factory.
//!
//! Head/tail context hashes are scoped to the anchor's enclosing parent
//! subtree — they never cross into an ancestor's other children, and they
//! never include the run being replaced itself. A leaf's only child has no
//! siblings at all and so gets an all-zero head/tail, while a list item
//! insertion sees its immediate neighbors' subtree hashes instead.

use crate::hash::NodePayload;
use crate::id::NodeId;
use crate::index::IndexedTree;

/// Default context radius `k`.
pub const DEFAULT_FINGERPRINT_RADIUS: usize = 4;

pub struct FingerprintFactory<'a, P> {
    tree: &'a IndexedTree<P>,
    radius: usize,
}

impl<'a, P: NodePayload> FingerprintFactory<'a, P> {
    pub fn new(tree: &'a IndexedTree<P>) -> Self {
        Self::with_radius(tree, DEFAULT_FINGERPRINT_RADIUS)
    }

    pub fn with_radius(tree: &'a IndexedTree<P>, radius: usize) -> Self {
        Self { tree, radius }
    }

    pub fn radius(&self) -> usize {
        self.radius
    }

    /// Head/tail fingerprints for a run of `run_len` document-order
    /// positions starting at `anchor_pos`, scoped to the subtree of
    /// `scope_parent` (excluding `scope_parent`'s own position — only its
    /// descendants count as context).
    pub fn fingerprint(&self, scope_parent: NodeId, anchor_pos: usize, run_len: usize) -> (Vec<u32>, Vec<u32>) {
        let doc_order = self.tree.doc_order();
        let hashes = self.tree.hashes();
        let (p_start, p_end) = doc_order.subtree_span(scope_parent);
        let scope_start = p_start + 1;

        let mut head = vec![0u32; self.radius];
        for (i, slot) in head.iter_mut().enumerate() {
            let pos = anchor_pos as isize - self.radius as isize + i as isize;
            if pos >= scope_start as isize && pos < anchor_pos as isize {
                if let Some(node) = doc_order.node_at(pos as usize) {
                    *slot = hashes.node_hash(node);
                }
            }
        }

        let mut tail = vec![0u32; self.radius];
        let tail_start = anchor_pos + run_len;
        for (i, slot) in tail.iter_mut().enumerate() {
            let pos = tail_start + i;
            if pos < p_end {
                if let Some(node) = doc_order.node_at(pos) {
                    *slot = hashes.node_hash(node);
                }
            }
        }

        (head, tail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::families::jsonml::{jsonml_tree, JsonMl};

    fn indexed(value: serde_json::Value) -> IndexedTree<JsonMl> {
        IndexedTree::build(jsonml_tree(&value).unwrap())
    }

    #[test]
    fn leaf_only_child_has_no_context() {
        let tree = indexed(serde_json::json!(["p", "hello"]));
        let factory = FingerprintFactory::new(&tree);
        let root = tree.root();
        let text = tree.tree().children(root)[0];
        let anchor_pos = tree.doc_order().position(text).unwrap();
        let (head, tail) = factory.fingerprint(root, anchor_pos, 1);
        assert_eq!(head, vec![0, 0, 0, 0]);
        assert_eq!(tail, vec![0, 0, 0, 0]);
    }

    #[test]
    fn sibling_insertion_sees_neighbors() {
        let tree = indexed(serde_json::json!(["ul", ["li", "a"], ["li", "c"]]));
        let factory = FingerprintFactory::new(&tree);
        let root = tree.root();
        let li_c = tree.tree().children(root)[1];
        let anchor_pos = tree.doc_order().position(li_c).unwrap();
        let (head, tail) = factory.fingerprint(root, anchor_pos, 0);
        assert_eq!(head[2], tree.hashes().node_hash(tree.tree().children(root)[0]));
        assert_ne!(tail[0], 0);
    }
}
