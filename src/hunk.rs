//! Operation handlers / hunks.
//!
//! A [`Hunk`] wraps one [`AttachedOperation`] with enough saved state to
//! apply the edit and reverse it exactly. State machine: `inactive ⇄
//! active`, `activate()`/`deactivate()` idempotent on their target state.
//! A [`PatchSession`] owns the ordered list of hunks activated so far in
//! a patching run and can unwind them in reverse, so a patch never leaves
//! a target partially applied unless the caller explicitly halts between
//! hunks.

use tracing::{debug, debug_span};

use crate::arena::{Fragment, Tree};
use crate::delta::{Anchor, AttachedOperation, OperationType};
use crate::error::{Error, Result};
use crate::hash::NodePayload;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HunkState {
    Inactive,
    Active,
}

/// Saved state a hunk needs to reverse itself, one variant per
/// [`OperationType`].
#[derive(Debug)]
enum Undo<P> {
    /// `UPDATE_NODE`: the payload that was there before.
    Node(P),
    /// `UPDATE_FOREST`: the fragments detached from `[index, index +
    /// insert.len())` before this hunk's own `insert` was spliced in.
    Forest(Vec<Fragment<P>>),
}

/// A toggleable, reversible in-place edit against one target [`Tree`].
/// Materialized by [`HandlerFactory::create_operation_handler`] from an
/// [`AttachedOperation`].
pub struct Hunk<P> {
    anchor: Anchor,
    op_type: OperationType,
    insert: Vec<Fragment<P>>,
    expected_remove: Vec<Fragment<P>>,
    state: HunkState,
    undo: Option<Undo<P>>,
}

/// Structural equality of a fragment against a live subtree: local payload
/// via [`NodePayload::values_equal`], recursing into children pairwise.
/// Backs the `ApplyPrecondition` check ("remove list does not match nodes
/// at resolved anchor", spec.md §7) that must run before a hunk mutates
/// its target.
fn fragment_matches<P: NodePayload>(tree: &Tree<P>, node: crate::id::NodeId, fragment: &Fragment<P>) -> bool {
    if !tree.payload(node).values_equal(&fragment.payload) {
        return false;
    }
    let children = tree.children(node);
    children.len() == fragment.children.len()
        && children
            .iter()
            .zip(&fragment.children)
            .all(|(&child, expected)| fragment_matches(tree, child, expected))
}

impl<P: NodePayload> Hunk<P> {
    pub fn new(op: &AttachedOperation<P>) -> Self {
        Self {
            anchor: op.anchor,
            op_type: op.detached.op_type,
            insert: op.detached.insert.clone(),
            expected_remove: op.detached.remove.clone(),
            state: HunkState::Inactive,
            undo: None,
        }
    }

    /// Verify the target still holds what the patch expects to remove,
    /// without mutating anything. Called at the start of `activate`.
    fn check_precondition(&self, tree: &Tree<P>) -> Result<()> {
        match self.op_type {
            OperationType::UpdateNode => {
                let target = self.anchor.target.ok_or_else(|| Error::ApplyPrecondition {
                    path: Vec::new(),
                    reason: "UPDATE_NODE anchor has no target node".into(),
                })?;
                let expected = self.expected_remove.first().ok_or_else(|| Error::ApplyPrecondition {
                    path: Vec::new(),
                    reason: "UPDATE_NODE op carries no remove payload".into(),
                })?;
                if !fragment_matches(tree, target, expected) {
                    return Err(Error::ApplyPrecondition {
                        path: Vec::new(),
                        reason: "anchor's current payload does not match the patch's remove list".into(),
                    });
                }
            }
            OperationType::UpdateForest => {
                let children = tree.children(self.anchor.base);
                let slice = children
                    .get(self.anchor.index..self.anchor.index + self.expected_remove.len())
                    .ok_or_else(|| Error::ApplyPrecondition {
                        path: Vec::new(),
                        reason: "remove run falls outside the anchor's children".into(),
                    })?;
                if !slice
                    .iter()
                    .zip(&self.expected_remove)
                    .all(|(&child, expected)| fragment_matches(tree, child, expected))
                {
                    return Err(Error::ApplyPrecondition {
                        path: Vec::new(),
                        reason: "nodes at the resolved anchor do not match the patch's remove list".into(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.state == HunkState::Active
    }

    /// Apply the edit to `tree`. No-op if already active.
    pub fn activate(&mut self, tree: &mut Tree<P>) -> Result<()> {
        if self.state == HunkState::Active {
            return Ok(());
        }
        self.check_precondition(tree)?;
        debug_span!("apply").in_scope(|| -> Result<()> {
            match self.op_type {
                OperationType::UpdateNode => {
                    let target = self.anchor.target.ok_or_else(|| {
                        Error::ApplyPrecondition {
                            path: Vec::new(),
                            reason: "UPDATE_NODE anchor has no target node".into(),
                        }
                    })?;
                    let fragment = self.insert.first().cloned().ok_or_else(|| {
                        Error::ApplyPrecondition {
                            path: Vec::new(),
                            reason: "UPDATE_NODE op carries no insert payload".into(),
                        }
                    })?;
                    // UPDATE_NODE only ever touches the node's own payload;
                    // `replace_payload` leaves children alone.
                    let old = tree.replace_payload(target, fragment.payload);
                    self.undo = Some(Undo::Node(old));
                }
                OperationType::UpdateForest => {
                    let removed =
                        tree.detach_range(self.anchor.base, self.anchor.index, self.expected_remove.len())?;
                    for (offset, fragment) in self.insert.iter().cloned().enumerate() {
                        tree.splice(self.anchor.base, self.anchor.index + offset, fragment)?;
                    }
                    self.undo = Some(Undo::Forest(removed));
                }
            }
            self.state = HunkState::Active;
            debug!("activated hunk at base {}", self.anchor.base);
            Ok(())
        })
    }

    /// Reverse the edit. No-op if already inactive.
    pub fn deactivate(&mut self, tree: &mut Tree<P>) -> Result<()> {
        if self.state == HunkState::Inactive {
            return Ok(());
        }
        let undo = self.undo.take().ok_or_else(|| {
            Error::ApplyPrecondition {
                path: Vec::new(),
                reason: "active hunk has no saved undo state".into(),
            }
        })?;
        match (self.op_type, undo) {
            (OperationType::UpdateNode, Undo::Node(old)) => {
                let target = self.anchor.target.ok_or_else(|| Error::ApplyPrecondition {
                    path: Vec::new(),
                    reason: "UPDATE_NODE anchor has no target node".into(),
                })?;
                tree.replace_payload(target, old);
            }
            (OperationType::UpdateForest, Undo::Forest(removed)) => {
                tree.detach_range(self.anchor.base, self.anchor.index, self.insert.len())?;
                for (offset, fragment) in removed.into_iter().enumerate() {
                    tree.splice(self.anchor.base, self.anchor.index + offset, fragment)?;
                }
            }
            _ => unreachable!("hunk undo state does not match its operation type"),
        }
        self.state = HunkState::Inactive;
        debug!("deactivated hunk at base {}", self.anchor.base);
        Ok(())
    }

    /// Flip `inactive ⇄ active`.
    pub fn toggle(&mut self, tree: &mut Tree<P>) -> Result<()> {
        if self.is_active() {
            self.deactivate(tree)
        } else {
            self.activate(tree)
        }
    }
}

/// Builds a [`Hunk`] from an [`AttachedOperation`]; pluggable per family
/// in principle. In practice hunk construction never inspects payload
/// internals beyond what [`NodePayload`] already exposes, so every family
/// shares this one implementation rather than three identical ones (see
/// DESIGN.md).
pub trait HandlerFactory<P> {
    fn create_operation_handler(op: &AttachedOperation<P>) -> Hunk<P>;
}

/// The shared [`HandlerFactory`] used by every family.
pub struct DefaultHandlerFactory;

impl<P: NodePayload> HandlerFactory<P> for DefaultHandlerFactory {
    fn create_operation_handler(op: &AttachedOperation<P>) -> Hunk<P> {
        Hunk::new(op)
    }
}

/// A run of hunks applied together against one target tree, in the order
/// the patch lists them. `activate` is called once per hunk in turn; on
/// failure in strict mode the session unwinds everything it had already
/// activated, in reverse.
pub struct PatchSession<P> {
    activated: Vec<Hunk<P>>,
}

impl<P: NodePayload> Default for PatchSession<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: NodePayload> PatchSession<P> {
    pub fn new() -> Self {
        Self {
            activated: Vec::new(),
        }
    }

    pub fn activated_count(&self) -> usize {
        self.activated.len()
    }

    /// Activate one more hunk, remembering it for a later `abort`.
    pub fn activate(&mut self, tree: &mut Tree<P>, mut hunk: Hunk<P>) -> Result<()> {
        hunk.activate(tree)?;
        self.activated.push(hunk);
        Ok(())
    }

    /// Deactivate every hunk activated so far, most-recent first.
    pub fn abort(&mut self, tree: &mut Tree<P>) -> Result<()> {
        debug_span!("apply").in_scope(|| {
            debug!("aborting patch session, unwinding {} hunks", self.activated.len());
            while let Some(mut hunk) = self.activated.pop() {
                hunk.deactivate(tree)?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::{extract_operations, DetachedContextOperation};
    use crate::diff::xcc_diff;
    use crate::families::jsonml::{jsonml_tree, serialize, JsonMl};
    use crate::index::IndexedTree;
    use crate::resolve::{ContextResolver, ResolverConfig};

    fn indexed(value: serde_json::Value) -> IndexedTree<JsonMl> {
        IndexedTree::build(jsonml_tree(&value).unwrap())
    }

    fn attach(op: &DetachedContextOperation<JsonMl>, target: &IndexedTree<JsonMl>) -> AttachedOperation<JsonMl> {
        let resolver = ContextResolver::new(target, ResolverConfig::default());
        let anchor = resolver.resolve(op).unwrap();
        AttachedOperation {
            detached: op.clone(),
            anchor,
        }
    }

    #[test]
    fn activate_then_deactivate_restores_original_serialization() {
        let a = indexed(serde_json::json!(["p", "hello"]));
        let b = indexed(serde_json::json!(["p", "world"]));
        let matching = xcc_diff(&a, &b);
        let ops = extract_operations(&a, &b, &matching);

        let mut target = a.tree().clone();
        let indexed_target = IndexedTree::build(target.clone());
        let op = attach(&ops[0], &indexed_target);
        let mut hunk = DefaultHandlerFactory::create_operation_handler(&op);

        let before = serialize(&target).unwrap();
        hunk.activate(&mut target).unwrap();
        assert_ne!(serialize(&target).unwrap(), before);
        hunk.deactivate(&mut target).unwrap();
        assert_eq!(serialize(&target).unwrap(), before);
    }

    #[test]
    fn activate_is_idempotent_when_already_active() {
        let a = indexed(serde_json::json!(["p", "hello"]));
        let b = indexed(serde_json::json!(["p", "world"]));
        let matching = xcc_diff(&a, &b);
        let ops = extract_operations(&a, &b, &matching);

        let mut target = a.tree().clone();
        let indexed_target = IndexedTree::build(target.clone());
        let op = attach(&ops[0], &indexed_target);
        let mut hunk = DefaultHandlerFactory::create_operation_handler(&op);

        hunk.activate(&mut target).unwrap();
        let once = serialize(&target).unwrap();
        hunk.activate(&mut target).unwrap();
        assert_eq!(serialize(&target).unwrap(), once);
    }

    #[test]
    fn activate_rejects_a_remove_list_mismatch() {
        let a = indexed(serde_json::json!(["p", "hello"]));
        let b = indexed(serde_json::json!(["p", "world"]));
        let matching = xcc_diff(&a, &b);
        let ops = extract_operations(&a, &b, &matching);

        // Resolve the operation against A, then mutate the target out from
        // under the resolved anchor before activating: the remove list no
        // longer matches what's actually there.
        let indexed_a = IndexedTree::build(a.tree().clone());
        let op = attach(&ops[0], &indexed_a);
        let mut hunk = DefaultHandlerFactory::create_operation_handler(&op);

        let mut drifted = a.tree().clone();
        let text_node = drifted.children(drifted.root())[0];
        drifted.replace_payload(text_node, crate::families::jsonml::JsonMl::Text("surprise".into()));

        let err = hunk.activate(&mut drifted).unwrap_err();
        assert!(matches!(err, Error::ApplyPrecondition { .. }));
    }
}
