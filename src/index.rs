//! Indexes over a built [`Tree`].
//!
//! Both indexes are built by a single eager pass and then sealed: building
//! an [`IndexedTree`] populates the whole structure once, and it offers no
//! API to mutate the underlying tree while the indexes are alive — once
//! built, further mutation of the tree would invalidate the index.

use std::collections::HashMap;

use crate::arena::Tree;
use crate::hash::{HashCache, NodePayload};
use crate::id::NodeId;

/// All nodes of a tree in pre-order, plus a cached position per node.
#[derive(Debug)]
pub struct DocumentOrderIndex {
    order: Vec<NodeId>,
    position: HashMap<NodeId, usize>,
    /// subtree size (node count, self included) computed once per node
    subtree_size: HashMap<NodeId, usize>,
}

impl DocumentOrderIndex {
    pub fn build<P: Clone + std::fmt::Debug>(tree: &Tree<P>) -> Self {
        let mut order = Vec::with_capacity(tree.len());
        tree.for_each_preorder(tree.root(), |_depth, id| order.push(id));

        let position: HashMap<NodeId, usize> =
            order.iter().enumerate().map(|(i, &id)| (id, i)).collect();

        let mut subtree_size = HashMap::new();
        tree.for_each_postorder(tree.root(), |id| {
            let size = 1 + tree
                .children(id)
                .iter()
                .map(|c| subtree_size[c])
                .sum::<usize>();
            subtree_size.insert(id, size);
        });

        Self {
            order,
            position,
            subtree_size,
        }
    }

    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn position(&self, id: NodeId) -> Option<usize> {
        self.position.get(&id).copied()
    }

    pub fn node_at(&self, position: usize) -> Option<NodeId> {
        self.order.get(position).copied()
    }

    /// Node `offset` positions away from `reference` in document order,
    /// or `None` if that would fall outside the tree.
    pub fn get(&self, reference: NodeId, offset: isize) -> Option<NodeId> {
        let pos = self.position(reference)? as isize + offset;
        if pos < 0 {
            return None;
        }
        self.node_at(pos as usize)
    }

    /// Node count of the subtree rooted at `id`.
    pub fn subtree_size(&self, id: NodeId) -> usize {
        self.subtree_size.get(&id).copied().unwrap_or(1)
    }

    /// `[start, end)` document-order span covered by the subtree rooted
    /// at `id`.
    pub fn subtree_span(&self, id: NodeId) -> (usize, usize) {
        let start = self.position(id).unwrap_or(0);
        (start, start + self.subtree_size(id))
    }

    /// One past the last document-order position of the subtree rooted
    /// at `id` — the position immediately following its last descendant.
    pub fn subtree_end(&self, id: NodeId) -> usize {
        self.subtree_span(id).1
    }
}

/// Per-depth array of nodes in document order within that depth.
#[derive(Debug)]
pub struct GenerationIndex {
    by_depth: Vec<Vec<NodeId>>,
    position: HashMap<NodeId, (usize, usize)>,
}

impl GenerationIndex {
    pub fn build<P: Clone + std::fmt::Debug>(
        tree: &Tree<P>,
        doc_order: &DocumentOrderIndex,
    ) -> Self {
        let mut by_depth: Vec<Vec<NodeId>> = Vec::new();
        let mut position = HashMap::new();

        for &id in doc_order.order() {
            let depth = tree.depth(id);
            if by_depth.len() <= depth {
                by_depth.resize_with(depth + 1, Vec::new);
            }
            position.insert(id, (depth, by_depth[depth].len()));
            by_depth[depth].push(id);
        }

        Self { by_depth, position }
    }

    pub fn first(&self, depth: usize) -> Option<NodeId> {
        self.by_depth.get(depth).and_then(|gen| gen.first().copied())
    }

    pub fn last(&self, depth: usize) -> Option<NodeId> {
        self.by_depth.get(depth).and_then(|gen| gen.last().copied())
    }

    /// Node `offset` positions away from `reference` within the same
    /// depth as `reference`.
    pub fn get(&self, reference: NodeId, offset: isize) -> Option<NodeId> {
        let (depth, idx) = *self.position.get(&reference)?;
        let new_idx = idx as isize + offset;
        if new_idx < 0 {
            return None;
        }
        self.by_depth.get(depth)?.get(new_idx as usize).copied()
    }
}

/// A tree bundled with its eagerly-built indexes and hash caches. This is
/// the unit every algorithm in this crate operates on (XCC diff, the
/// editor, the fingerprint factory, the resolver) — never a bare
/// [`Tree`].
#[derive(Debug)]
pub struct IndexedTree<P> {
    tree: Tree<P>,
    doc_order: DocumentOrderIndex,
    generations: GenerationIndex,
    hashes: HashCache,
}

impl<P: NodePayload> IndexedTree<P> {
    pub fn build(tree: Tree<P>) -> Self {
        let doc_order = DocumentOrderIndex::build(&tree);
        let generations = GenerationIndex::build(&tree, &doc_order);
        let hashes = HashCache::build(&tree, &doc_order);
        Self {
            tree,
            doc_order,
            generations,
            hashes,
        }
    }

    pub fn tree(&self) -> &Tree<P> {
        &self.tree
    }

    pub fn doc_order(&self) -> &DocumentOrderIndex {
        &self.doc_order
    }

    pub fn generations(&self) -> &GenerationIndex {
        &self.generations
    }

    pub fn hashes(&self) -> &HashCache {
        &self.hashes
    }

    pub fn root(&self) -> NodeId {
        self.tree.root()
    }
}
