//! A symmetric bijection between the nodes of two trees: externally-held,
//! two-directional maps rather than partner pointers embedded in the
//! node, so a `Matching` can be dropped or rebuilt without touching
//! either tree.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::id::NodeId;

#[derive(Debug, Default)]
pub struct Matching {
    a_to_b: HashMap<NodeId, NodeId>,
    b_to_a: HashMap<NodeId, NodeId>,
}

impl Matching {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pair `a` (a node of tree A) with `b` (a node of tree B). Fails if
    /// either side already has a partner.
    pub fn pair(&mut self, a: NodeId, b: NodeId) -> Result<()> {
        if self.a_to_b.contains_key(&a) {
            return Err(Error::ParameterError(format!(
                "node {a} in tree A already has a partner"
            )));
        }
        if self.b_to_a.contains_key(&b) {
            return Err(Error::ParameterError(format!(
                "node {b} in tree B already has a partner"
            )));
        }
        self.a_to_b.insert(a, b);
        self.b_to_a.insert(b, a);
        Ok(())
    }

    pub fn partner_in_b(&self, a: NodeId) -> Option<NodeId> {
        self.a_to_b.get(&a).copied()
    }

    pub fn partner_in_a(&self, b: NodeId) -> Option<NodeId> {
        self.b_to_a.get(&b).copied()
    }

    pub fn is_matched_a(&self, a: NodeId) -> bool {
        self.a_to_b.contains_key(&a)
    }

    pub fn is_matched_b(&self, b: NodeId) -> bool {
        self.b_to_a.contains_key(&b)
    }

    pub fn len(&self) -> usize {
        self.a_to_b.len()
    }

    pub fn is_empty(&self) -> bool {
        self.a_to_b.is_empty()
    }

    pub fn pairs(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.a_to_b.iter().map(|(&a, &b)| (a, b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symmetry() {
        let mut m = Matching::new();
        m.pair(NodeId::new(0), NodeId::new(0)).unwrap();
        m.pair(NodeId::new(1), NodeId::new(2)).unwrap();

        for (a, b) in m.pairs() {
            assert_eq!(m.partner_in_a(b), Some(a));
            assert_eq!(m.partner_in_b(a), Some(b));
        }
    }

    #[test]
    fn rejects_double_partner() {
        let mut m = Matching::new();
        m.pair(NodeId::new(0), NodeId::new(0)).unwrap();
        assert!(m.pair(NodeId::new(0), NodeId::new(1)).is_err());
        assert!(m.pair(NodeId::new(1), NodeId::new(0)).is_err());
    }
}
