//! The tree model: a single owning arena per tree.
//!
//! A [`Tree`] is a single owning arena of [`NodeRecord`]s. Parent,
//! child-index and depth live on the record so structural invariants
//! (every non-root node has exactly one parent, child indices are
//! contiguous, depth is parent's depth plus one) are O(1) to check;
//! cross-tree links (matching partners) are kept in external maps
//! elsewhere ([`crate::matching::Matching`]), never on the node, so a
//! tree can be matched against several others without mutating it.
//!
//! Trees are built once (via [`crate::builder::TreeBuilder`]) and are not
//! mutated while being diffed. The *target* tree of a patch session is
//! the only tree mutated in place, through [`Tree::splice`] /
//! [`Tree::detach_range`] / [`Tree::replace_payload`].

use tracing::debug;

use crate::error::{Error, Result};
use crate::id::NodeId;

#[derive(Debug, Clone)]
pub struct NodeRecord<P> {
    pub(crate) payload: P,
    pub(crate) parent: Option<NodeId>,
    pub(crate) child_index: usize,
    pub(crate) depth: usize,
    pub(crate) children: Vec<NodeId>,
}

/// A detached forest fragment: an owned subtree not bound to any arena.
/// Used to carry `remove`/`insert` forests inside a
/// [`crate::delta::DetachedContextOperation`] and to splice/extract
/// subtrees into/out of a live [`Tree`].
#[derive(Debug, Clone)]
pub struct Fragment<P> {
    pub payload: P,
    pub children: Vec<Fragment<P>>,
}

impl<P: Clone> Fragment<P> {
    pub fn leaf(payload: P) -> Self {
        Self {
            payload,
            children: Vec::new(),
        }
    }

    /// Total node count of this fragment, itself included.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(Fragment::size).sum::<usize>()
    }
}

#[derive(Debug, Clone)]
pub struct Tree<P> {
    nodes: Vec<NodeRecord<P>>,
    root: NodeId,
}

impl<P: Clone + std::fmt::Debug> Tree<P> {
    /// Build a tree from a root [`Fragment`]. This is the path the
    /// builder and the patch applier both funnel through so arena
    /// bookkeeping (depth, child_index, parent) only has one
    /// implementation.
    pub fn from_fragment(root: Fragment<P>) -> Self {
        let mut nodes = Vec::new();
        let root_id = Self::push_fragment(&mut nodes, root, None, 0, 0);
        Self {
            nodes,
            root: root_id,
        }
    }

    fn push_fragment(
        nodes: &mut Vec<NodeRecord<P>>,
        fragment: Fragment<P>,
        parent: Option<NodeId>,
        child_index: usize,
        depth: usize,
    ) -> NodeId {
        let id = NodeId::new(nodes.len());
        nodes.push(NodeRecord {
            payload: fragment.payload,
            parent,
            child_index,
            depth,
            children: Vec::new(),
        });
        let mut child_ids = Vec::with_capacity(fragment.children.len());
        for (i, child) in fragment.children.into_iter().enumerate() {
            child_ids.push(Self::push_fragment(nodes, child, Some(id), i, depth + 1));
        }
        nodes[id.index()].children = child_ids;
        id
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn payload(&self, id: NodeId) -> &P {
        &self.nodes[id.index()].payload
    }

    pub fn payload_mut(&mut self, id: NodeId) -> &mut P {
        &mut self.nodes[id.index()].payload
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    pub fn child_index(&self, id: NodeId) -> usize {
        self.nodes[id.index()].child_index
    }

    pub fn depth(&self, id: NodeId) -> usize {
        self.nodes[id.index()].depth
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].children
    }

    /// Sequence of child indices from the root down to (but not
    /// including) `id`. Empty for the root itself.
    pub fn path_to(&self, id: NodeId) -> Vec<usize> {
        let mut path = Vec::new();
        let mut cur = id;
        while let Some(parent) = self.parent(cur) {
            path.push(self.child_index(cur));
            cur = parent;
        }
        path.reverse();
        path
    }

    /// Follow a path of child indices from the root. Fails with
    /// [`Error::ParameterError`] if any index is out of range.
    pub fn node_at_path(&self, path: &[usize]) -> Result<NodeId> {
        let mut cur = self.root;
        for &idx in path {
            let children = self.children(cur);
            cur = *children
                .get(idx)
                .ok_or_else(|| Error::ParameterError(format!("path index {idx} out of range")))?;
        }
        Ok(cur)
    }

    /// Extract a clone of the subtree rooted at `id` as a detached
    /// [`Fragment`], without mutating this tree.
    pub fn extract_fragment(&self, id: NodeId) -> Fragment<P> {
        Fragment {
            payload: self.payload(id).clone(),
            children: self
                .children(id)
                .iter()
                .map(|&c| self.extract_fragment(c))
                .collect(),
        }
    }

    /// Preorder traversal starting at `id`, `(depth_relative_to_start, node)` pairs.
    pub fn for_each_preorder<F: FnMut(usize, NodeId)>(&self, id: NodeId, mut f: F) {
        fn walk<P, F: FnMut(usize, NodeId)>(tree: &Tree<P>, id: NodeId, depth: usize, f: &mut F) {
            f(depth, id);
            for &child in tree.children(id) {
                walk(tree, child, depth + 1, f);
            }
        }
        walk(self, id, 0, &mut f);
    }

    /// Postorder traversal starting at `id`.
    pub fn for_each_postorder<F: FnMut(NodeId)>(&self, id: NodeId, mut f: F) {
        fn walk<P, F: FnMut(NodeId)>(tree: &Tree<P>, id: NodeId, f: &mut F) {
            for &child in tree.children(id) {
                walk(tree, child, f);
            }
            f(id);
        }
        walk(self, id, &mut f);
    }

    // -- mutation, used only by the patch applier on the target tree --

    /// Renumber `parent`'s children's `child_index` fields after an
    /// insert/remove shifted positions.
    fn renumber_children(&mut self, parent: NodeId) {
        let children = self.nodes[parent.index()].children.clone();
        for (i, child) in children.into_iter().enumerate() {
            self.nodes[child.index()].child_index = i;
        }
    }

    fn fix_depths(&mut self, id: NodeId, depth: usize) {
        self.nodes[id.index()].depth = depth;
        let children = self.nodes[id.index()].children.clone();
        for child in children {
            self.fix_depths(child, depth + 1);
        }
    }

    /// Insert a fragment as a new child of `parent` at `index`. Fails if
    /// `index` is greater than the current child count.
    pub fn splice(&mut self, parent: NodeId, index: usize, fragment: Fragment<P>) -> Result<NodeId> {
        let depth = self.depth(parent) + 1;
        if index > self.children(parent).len() {
            return Err(Error::ParameterError(format!(
                "splice index {index} out of range"
            )));
        }
        let new_id = Self::push_fragment(&mut self.nodes, fragment, Some(parent), index, depth);
        self.nodes[parent.index()].children.insert(index, new_id);
        self.renumber_children(parent);
        debug!("Spliced node {new_id} into parent {parent} at index {index}");
        Ok(new_id)
    }

    /// Detach `count` contiguous children of `parent` starting at
    /// `index`, returning them as fragments in document order. The
    /// removed nodes' arena slots are left as unreachable garbage (the
    /// arena never shrinks or compacts; NodeIds remain stable for the
    /// remaining nodes).
    pub fn detach_range(&mut self, parent: NodeId, index: usize, count: usize) -> Result<Vec<Fragment<P>>> {
        let children = self.nodes[parent.index()].children.clone();
        if index + count > children.len() {
            return Err(Error::ParameterError(format!(
                "detach range [{index}, {}) out of range (len {})",
                index + count,
                children.len()
            )));
        }
        let removed: Vec<NodeId> = children[index..index + count].to_vec();
        let fragments = removed.iter().map(|&id| self.extract_fragment(id)).collect();
        self.nodes[parent.index()]
            .children
            .drain(index..index + count);
        self.renumber_children(parent);
        Ok(fragments)
    }

    /// Replace the local payload of `id`, leaving its children and
    /// position untouched (used for `UPDATE_NODE`).
    pub fn replace_payload(&mut self, id: NodeId, payload: P) -> P {
        std::mem::replace(&mut self.nodes[id.index()].payload, payload)
    }

    /// Replace the whole subtree at `id` (payload and children) with a
    /// fresh fragment, preserving `id`'s position in its parent.
    pub fn replace_subtree(&mut self, id: NodeId, fragment: Fragment<P>) -> Result<Fragment<P>> {
        let old = self.extract_fragment(id);
        let parent = self.parent(id);
        let child_index = self.child_index(id);
        let depth = self.depth(id);

        self.nodes[id.index()].payload = fragment.payload;
        let old_children = self.nodes[id.index()].children.clone();
        // old children's slots become garbage; build new ones
        let _ = old_children;
        let mut new_children = Vec::with_capacity(fragment.children.len());
        for (i, child) in fragment.children.into_iter().enumerate() {
            new_children.push(Self::push_fragment(
                &mut self.nodes,
                child,
                Some(id),
                i,
                depth + 1,
            ));
        }
        self.nodes[id.index()].children = new_children;
        self.nodes[id.index()].parent = parent;
        self.nodes[id.index()].child_index = child_index;
        self.fix_depths(id, depth);
        Ok(old)
    }
}
