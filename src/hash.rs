//! Hashing: 32-bit FNV-1a over typed, separator-delimited node content.
//!
//! A 32-bit FNV-1a primitive feeding fixed 4-byte type prefixes and a
//! 2-byte separator. This is a wire-format detail rather than an ambient
//! concern — the hash must be bit-reproducible across implementations of
//! this document family — so it is hand-rolled rather than delegated to a
//! general-purpose hashing crate.

use std::collections::HashMap;

use crate::arena::Tree;
use crate::id::NodeId;
use crate::index::DocumentOrderIndex;

const FNV_OFFSET_BASIS: u32 = 0x811C9DC5;
const FNV_PRIME: u32 = 0x0100_0193;

const ELEMENT_PREFIX: [u8; 4] = [0x00, 0x00, 0x00, 0x01];
const ATTRIBUTE_PREFIX: [u8; 4] = [0x00, 0x00, 0x00, 0x02];
const TEXT_PREFIX: [u8; 4] = [0x00, 0x00, 0x00, 0x03];
const SEPARATOR: [u8; 2] = [0x00, 0x00];

/// 32-bit FNV-1a incremental hasher.
#[derive(Debug, Clone, Copy)]
pub struct Fnv1a {
    state: u32,
}

impl Default for Fnv1a {
    fn default() -> Self {
        Self::new()
    }
}

impl Fnv1a {
    pub fn new() -> Self {
        Self {
            state: FNV_OFFSET_BASIS,
        }
    }

    pub fn update(&mut self, bytes: &[u8]) -> &mut Self {
        for &byte in bytes {
            self.state ^= byte as u32;
            self.state = self.state.wrapping_mul(FNV_PRIME);
        }
        self
    }

    pub fn get(&self) -> u32 {
        self.state
    }
}

/// The three node kinds the hashing protocol distinguishes. Adapters
/// classify each payload into one of these before its bytes are
/// fed to the hasher, so e.g. an element named "3" never collides with the
/// text node "3".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashKind {
    Element,
    Attribute,
    Text,
}

/// Per-family node hashing protocol, implemented once per document
/// family (JsonML, JSON-object, XML/DOM). The core is generic over this
/// trait and never inspects payload internals itself.
pub trait NodePayload: Clone + std::fmt::Debug {
    /// Which of the three canonical prefixes this payload hashes under.
    fn hash_kind(&self) -> HashKind;

    /// Feed this payload's local content (tag name, attribute key/value,
    /// text) as UTF-8 bytes into `hasher`. Attribute-bearing payloads
    /// must feed attributes in ascending key order for hash stability.
    fn feed_hash(&self, hasher: &mut Fnv1a);

    /// Structural equality of *local* payload only (not children) — used
    /// both as node-equality during matching and as the "payload values
    /// differ" test behind an `UPDATE_NODE` operation.
    fn values_equal(&self, other: &Self) -> bool;
}

/// Hash one node's local payload.
pub fn node_hash<P: NodePayload>(payload: &P) -> u32 {
    let mut hasher = Fnv1a::new();
    let prefix = match payload.hash_kind() {
        HashKind::Element => ELEMENT_PREFIX,
        HashKind::Attribute => ATTRIBUTE_PREFIX,
        HashKind::Text => TEXT_PREFIX,
    };
    hasher.update(&prefix);
    payload.feed_hash(&mut hasher);
    hasher.update(&SEPARATOR);
    hasher.get()
}

/// Hash a subtree: FNV-1a over the concatenation of node hashes of its
/// nodes in document order.
pub fn subtree_hash_of(node_hashes_in_order: &[u32]) -> u32 {
    let mut hasher = Fnv1a::new();
    for h in node_hashes_in_order {
        hasher.update(&h.to_be_bytes());
    }
    hasher.get()
}

/// Lazily-memoized node-hash / subtree-hash cache for one [`Tree`]. Owned
/// by [`crate::index::IndexedTree`] rather than by the node itself, so the
/// arena's node records stay free of anything but structural bookkeeping.
#[derive(Debug, Default)]
pub struct HashCache {
    node: HashMap<NodeId, u32>,
    subtree: HashMap<NodeId, u32>,
}

impl HashCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Eagerly compute node hashes for every node and subtree hashes for
    /// every node (bottom-up), using `doc_order` to know each subtree's
    /// document-order span.
    pub fn build<P: NodePayload>(tree: &Tree<P>, doc_order: &DocumentOrderIndex) -> Self {
        let mut cache = Self::new();
        for &id in doc_order.order() {
            cache.node.insert(id, node_hash(tree.payload(id)));
        }
        // postorder so children are hashed before parents
        tree.for_each_postorder(tree.root(), |id| {
            let (start, end) = doc_order.subtree_span(id);
            let hashes: Vec<u32> = doc_order.order()[start..end]
                .iter()
                .map(|n| cache.node[n])
                .collect();
            cache.subtree.insert(id, subtree_hash_of(&hashes));
        });
        cache
    }

    pub fn node_hash(&self, id: NodeId) -> u32 {
        self.node.get(&id).copied().unwrap_or(0)
    }

    pub fn subtree_hash(&self, id: NodeId) -> u32 {
        self.subtree.get(&id).copied().unwrap_or(0)
    }
}
