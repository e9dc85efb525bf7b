//! Skeleton matcher and context matcher.
//!
//! Both are thin, purpose-specific wrappers over [`crate::edit::lcs_align`]
//! and plain scoring arithmetic, applied to two problems: localizing the
//! likely edit region between two forests (`skelmatch`), and scoring a
//! candidate anchor's fingerprint match (`ContextMatcher`, used by
//! [`crate::resolve::ContextResolver`]).

use crate::edit::lcs_align;
use crate::hash::NodePayload;
use crate::id::NodeId;
use crate::index::IndexedTree;

/// Align two hash sequences by equality, returning aligned `(dest_index,
/// source_index)` pairs that form their common skeleton. The primitive
/// both [`skelmatch`] (two forests' children, by subtree hash) and
/// [`crate::resolve::ContextResolver::windowed_search`] (a query
/// fingerprint against a target's node-hash window) align against.
pub fn skelmatch_hashes(dest: &[u32], source: &[u32]) -> Vec<(usize, usize)> {
    lcs_align(dest, source, |a, b| a == b)
}

/// Align the top-level children of `parent_a` (in tree A) against
/// `parent_b` (in tree B) by subtree-hash equality, returning aligned
/// `(child_index_a, child_index_b)` pairs that form the forests' common
/// skeleton. Anything not in this list is part of the likely edit region.
pub fn skelmatch<P: NodePayload>(
    tree_a: &IndexedTree<P>,
    parent_a: NodeId,
    tree_b: &IndexedTree<P>,
    parent_b: NodeId,
) -> Vec<(usize, usize)> {
    let children_a = tree_a.tree().children(parent_a);
    let children_b = tree_b.tree().children(parent_b);
    let hashes_a: Vec<u32> = children_a.iter().map(|&a| tree_a.hashes().subtree_hash(a)).collect();
    let hashes_b: Vec<u32> = children_b.iter().map(|&b| tree_b.hashes().subtree_hash(b)).collect();
    skelmatch_hashes(&hashes_a, &hashes_b)
}

/// Result of scoring a fingerprint window against a query. An entry
/// counts only if the query's fingerprint is non-zero — a zero entry
/// means "off the edge of the source tree" and carries no information.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ContextScore {
    pub exact: u32,
    pub any_position: u32,
    pub total_nonzero: u32,
}

impl ContextScore {
    /// Every non-zero query entry matched at its exact position — the
    /// resolver's fast-path / strict-mode acceptance condition.
    pub fn all_exact(&self) -> bool {
        self.total_nonzero == 0 || self.exact == self.total_nonzero
    }

    /// Fraction of non-zero query entries that matched somewhere in the
    /// window (exact or not). `1.0` when the query is all-zero (no
    /// constraint to satisfy).
    pub fn ratio(&self) -> f32 {
        if self.total_nonzero == 0 {
            1.0
        } else {
            (self.exact + self.any_position) as f32 / self.total_nonzero as f32
        }
    }

    /// Exact matches weighted double over any-position matches. Used to
    /// rank candidates against each other.
    pub fn weight(&self) -> f32 {
        self.exact as f32 * 2.0 + self.any_position as f32
    }
}

/// Scores fingerprint windows against a query fingerprint.
pub struct ContextMatcher;

impl ContextMatcher {
    pub fn score(query: &[u32], window: &[u32]) -> ContextScore {
        let mut score = ContextScore::default();
        for (i, &q) in query.iter().enumerate() {
            if q == 0 {
                continue;
            }
            score.total_nonzero += 1;
            if window.get(i) == Some(&q) {
                score.exact += 1;
            } else if window.contains(&q) {
                score.any_position += 1;
            }
        }
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_zero_query_is_trivially_exact() {
        let score = ContextMatcher::score(&[0, 0, 0, 0], &[1, 2, 3, 4]);
        assert!(score.all_exact());
        assert_eq!(score.ratio(), 1.0);
    }

    #[test]
    fn exact_position_beats_any_position() {
        let exact = ContextMatcher::score(&[1, 2], &[1, 2]);
        let shifted = ContextMatcher::score(&[1, 2], &[2, 1]);
        assert!(exact.weight() > shifted.weight());
        assert!(exact.all_exact());
        assert!(!shifted.all_exact());
    }

    #[test]
    fn missing_entry_reduces_ratio() {
        let score = ContextMatcher::score(&[1, 2, 3, 4], &[1, 2, 0, 4]);
        assert_eq!(score.exact, 3);
        assert!(score.ratio() < 1.0);
    }
}
