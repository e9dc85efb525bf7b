//! Context resolver.
//!
//! Locates the anchor a [`DetachedContextOperation`] should bind to in a
//! target tree that need not be identical to the tree the patch was
//! diffed from. Tries the fast path (literal path traversal) first, then
//! falls back to a windowed search: skeleton-aligned against
//! [`crate::skelmatch::skelmatch_hashes`] to localize likely positions,
//! scored by [`ContextMatcher`].

use tracing::{debug, debug_span};

use crate::delta::{Anchor, DetachedContextOperation, OperationType};
use crate::error::{Error, Result};
use crate::fingerprint::FingerprintFactory;
use crate::hash::NodePayload;
use crate::id::NodeId;
use crate::index::IndexedTree;
use crate::skelmatch::{skelmatch_hashes, ContextMatcher};

/// Named resolver thresholds, kept as configuration rather than hidden
/// constants.
#[derive(Debug, Clone, Copy)]
pub struct ResolverConfig {
    /// When `true`, the windowed fallback also requires an exact tail
    /// match (not just `min_tail_ratio`) — effectively disabling
    /// best-effort context resolution in favor of failing outright.
    pub strict: bool,
    /// Minimum fraction of the tail fingerprint's non-zero entries that
    /// must match for a windowed candidate to be accepted. Default `0.5`:
    /// at least half of tail entries must match.
    pub min_tail_ratio: f32,
    /// How far (in document-order positions) from the path's best-effort
    /// linear position the windowed search will look.
    pub search_radius: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            strict: false,
            min_tail_ratio: 0.5,
            search_radius: 32,
        }
    }
}

pub struct ContextResolver<'a, P> {
    target: &'a IndexedTree<P>,
    config: ResolverConfig,
}

/// A located candidate awaiting scoring.
struct Candidate {
    anchor: Anchor,
    scope_parent: NodeId,
    anchor_pos: usize,
}

impl<'a, P: NodePayload> ContextResolver<'a, P> {
    pub fn new(target: &'a IndexedTree<P>, config: ResolverConfig) -> Self {
        Self { target, config }
    }

    /// Resolve `op` against the target tree: try the fast path first,
    /// then fall back to a windowed search.
    pub fn resolve(&self, op: &DetachedContextOperation<P>) -> Result<Anchor> {
        debug_span!("resolve").in_scope(|| {
            if let Some(anchor) = self.fast_path(op) {
                debug!("resolved via fast path at path {:?}", op.path);
                return Ok(anchor);
            }
            self.windowed_search(op).ok_or_else(|| {
                debug!("resolution failed for path {:?}", op.path);
                Error::ResolutionFailed {
                    path: op.path.clone(),
                }
            })
        })
    }

    fn run_len_for(&self, op: &DetachedContextOperation<P>, target_node: Option<NodeId>) -> usize {
        match op.op_type {
            OperationType::UpdateNode => target_node
                .map(|n| self.target.doc_order().subtree_size(n))
                .unwrap_or(0),
            OperationType::UpdateForest => op.remove.iter().map(|f| f.size()).sum(),
        }
    }

    /// Locate a node path directly against the target tree (the
    /// `UpdateNode` half of `op.path`'s two encodings).
    fn locate_node_path(&self, path: &[usize]) -> Option<Candidate> {
        let tree = self.target.tree();
        let node = tree.node_at_path(path).ok()?;
        let base = tree.parent(node).unwrap_or(node);
        let index = tree.child_index(node);
        let pos = self.target.doc_order().position(node)?;
        Some(Candidate {
            anchor: Anchor {
                base,
                index,
                target: Some(node),
            },
            scope_parent: base,
            anchor_pos: pos,
        })
    }

    fn fast_path(&self, op: &DetachedContextOperation<P>) -> Option<Anchor> {
        let candidate = self.locate_operation(op)?;
        self.score_and_accept(op, &candidate, self.config.strict)
    }

    /// Correctly split a forest op's path into `(parent_path, slot)` and
    /// locate the corresponding candidate.
    fn locate_operation(&self, op: &DetachedContextOperation<P>) -> Option<Candidate> {
        let tree = self.target.tree();
        match op.op_type {
            OperationType::UpdateNode => self.locate_node_path(&op.path),
            OperationType::UpdateForest => {
                if op.path.is_empty() {
                    return None;
                }
                let slot = *op.path.last().unwrap();
                let parent_path = &op.path[..op.path.len() - 1];
                let base = tree.node_at_path(parent_path).ok()?;
                let children = tree.children(base);
                let target = children.get(slot).copied();
                let anchor_pos = match target {
                    Some(node) => self.target.doc_order().position(node)?,
                    None if slot == children.len() => self.target.doc_order().subtree_end(base),
                    None => return None,
                };
                Some(Candidate {
                    anchor: Anchor {
                        base,
                        index: slot,
                        target,
                    },
                    scope_parent: base,
                    anchor_pos,
                })
            }
        }
    }

    fn score_and_accept(
        &self,
        op: &DetachedContextOperation<P>,
        candidate: &Candidate,
        strict: bool,
    ) -> Option<Anchor> {
        if op.op_type == OperationType::UpdateForest {
            let children = self.target.tree().children(candidate.anchor.base);
            if candidate.anchor.index + op.remove.len() > children.len() {
                return None;
            }
        }

        let run_len = self.run_len_for(op, candidate.anchor.target);
        let factory = FingerprintFactory::with_radius(self.target, op.head.len().max(op.tail.len()));
        let (head, tail) = factory.fingerprint(candidate.scope_parent, candidate.anchor_pos, run_len);

        let head_score = ContextMatcher::score(&op.head, &head);
        let tail_score = ContextMatcher::score(&op.tail, &tail);

        let tail_ok = if strict {
            tail_score.all_exact()
        } else {
            tail_score.ratio() >= self.config.min_tail_ratio
        };

        if head_score.all_exact() && tail_ok {
            Some(candidate.anchor)
        } else {
            None
        }
    }

    /// Best-effort document-order position reached by walking `path` on
    /// the target tree as far as it stays valid.
    fn reference_position(&self, path: &[usize]) -> usize {
        let tree = self.target.tree();
        let mut cur = self.target.root();
        let mut pos = self.target.doc_order().position(cur).unwrap_or(0);
        for &idx in path {
            match tree.children(cur).get(idx) {
                Some(&next) => {
                    cur = next;
                    pos = self.target.doc_order().position(cur).unwrap_or(pos);
                }
                None => break,
            }
        }
        pos
    }

    /// Align the operation's fingerprint skeleton (its non-zero head and
    /// tail hashes, the only entries that carry information) against the
    /// target's node hashes within `[lo, hi]`, to localize the positions
    /// most likely to hold the edit before scoring every position in the
    /// window in full.
    fn skeleton_positions(
        &self,
        op: &DetachedContextOperation<P>,
        lo: usize,
        hi: usize,
    ) -> Vec<usize> {
        let query: Vec<u32> = op
            .head
            .iter()
            .chain(op.tail.iter())
            .copied()
            .filter(|&h| h != 0)
            .collect();
        if query.is_empty() {
            return Vec::new();
        }

        let window_hashes: Vec<u32> = (lo..=hi)
            .filter_map(|pos| self.target.doc_order().node_at(pos))
            .map(|node| self.target.hashes().node_hash(node))
            .collect();

        skelmatch_hashes(&query, &window_hashes)
            .into_iter()
            .map(|(_, window_idx)| lo + window_idx)
            .collect()
    }

    fn windowed_search(&self, op: &DetachedContextOperation<P>) -> Option<Anchor> {
        let ref_pos = self.reference_position(&op.path);
        let len = self.target.doc_order().len();
        let lo = ref_pos.saturating_sub(self.config.search_radius);
        let hi = (ref_pos + self.config.search_radius).min(len.saturating_sub(1));

        let mut best: Option<(Anchor, f32, usize)> = None;
        let tree = self.target.tree();

        // Localize likely edit regions via the skeleton alignment, then
        // try those positions first; every position in the window is
        // still visited, so coverage and the final "best" pick are
        // unaffected, but a likely anchor is usually scored first.
        let skeleton = self.skeleton_positions(op, lo, hi);
        let mut positions: Vec<usize> = (lo..=hi).collect();
        positions.sort_by_key(|&pos| (!skeleton.contains(&pos), pos.abs_diff(ref_pos)));

        for pos in positions {
            let Some(node) = self.target.doc_order().node_at(pos) else {
                continue;
            };

            let mut candidates = Vec::new();
            if let Some(base) = tree.parent(node) {
                candidates.push(Candidate {
                    anchor: Anchor {
                        base,
                        index: tree.child_index(node),
                        target: Some(node),
                    },
                    scope_parent: base,
                    anchor_pos: pos,
                });
            }
            if tree.children(node).is_empty() {
                candidates.push(Candidate {
                    anchor: Anchor {
                        base: node,
                        index: 0,
                        target: None,
                    },
                    scope_parent: node,
                    anchor_pos: self.target.doc_order().subtree_end(node),
                });
            }

            for candidate in candidates {
                if op.op_type == OperationType::UpdateForest {
                    let children = tree.children(candidate.anchor.base);
                    if candidate.anchor.index + op.remove.len() > children.len() {
                        continue;
                    }
                }
                let run_len = self.run_len_for(op, candidate.anchor.target);
                let factory =
                    FingerprintFactory::with_radius(self.target, op.head.len().max(op.tail.len()));
                let (head, tail) =
                    factory.fingerprint(candidate.scope_parent, candidate.anchor_pos, run_len);
                let head_score = ContextMatcher::score(&op.head, &head);
                let tail_score = ContextMatcher::score(&op.tail, &tail);

                let tail_ok = if self.config.strict {
                    tail_score.all_exact()
                } else {
                    tail_score.ratio() >= self.config.min_tail_ratio
                };
                if !head_score.all_exact() || !tail_ok {
                    continue;
                }

                let weight = head_score.weight() + tail_score.weight();
                let distance = candidate.anchor_pos.abs_diff(ref_pos);
                let better = match &best {
                    None => true,
                    Some((_, best_weight, best_distance)) => {
                        weight > *best_weight
                            || (weight == *best_weight && distance < *best_distance)
                    }
                };
                if better {
                    best = Some((candidate.anchor, weight, distance));
                }
            }
        }

        best.map(|(anchor, _, _)| anchor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::{extract_operations, OperationType};
    use crate::diff::xcc_diff;
    use crate::families::jsonml::{jsonml_tree, JsonMl};

    fn indexed(value: serde_json::Value) -> IndexedTree<JsonMl> {
        IndexedTree::build(jsonml_tree(&value).unwrap())
    }

    #[test]
    fn skeleton_positions_locate_the_matching_region() {
        let a = indexed(serde_json::json!(["ul", ["li", "a"], ["li", "c"]]));
        let b = indexed(serde_json::json!(["ul", ["li", "a"], ["li", "b"], ["li", "c"]]));
        let matching = xcc_diff(&a, &b);
        let ops = extract_operations(&a, &b, &matching);
        let insert_op = ops
            .iter()
            .find(|op| op.op_type == OperationType::UpdateForest)
            .unwrap();

        let target = indexed(serde_json::json!(["ul", ["li", "a"], ["li", "c"], ["li", "d"]]));
        let resolver = ContextResolver::new(&target, ResolverConfig::default());

        let hi = target.doc_order().len() - 1;
        let positions = resolver.skeleton_positions(insert_op, 0, hi);
        assert!(!positions.is_empty());

        // The `<li>c</li>` pair sits at positions 3 and 4; the skeleton
        // alignment should localize around there, not the unrelated
        // trailing `<li>d</li>` at positions 5-6.
        assert!(positions.iter().all(|&p| p < 5));
    }

    #[test]
    fn windowed_search_still_resolves_when_skeleton_is_empty() {
        // An op with an all-zero fingerprint (no context to align against)
        // must fall back to scoring the full window rather than finding
        // nothing because the skeleton is empty.
        let a = indexed(serde_json::json!(["p", "hello"]));
        let b = indexed(serde_json::json!(["p", "world"]));
        let matching = xcc_diff(&a, &b);
        let ops = extract_operations(&a, &b, &matching);
        assert_eq!(ops[0].head, vec![0, 0, 0, 0]);

        let target = indexed(serde_json::json!(["p", "hello"]));
        let resolver = ContextResolver::new(&target, ResolverConfig::default());
        assert!(resolver.windowed_search(&ops[0]).is_some());
    }
}
