//! Error kinds for the tree delta engine.
//!
//! The variants below correspond one-to-one with the error kinds named in
//! the design: structurally broken trees, patches that name operations or
//! families the core doesn't know about, anchors that can't be located in
//! a divergent target, preconditions that don't hold at an otherwise
//! resolved anchor, and plain API contract violations.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A tree invariant was violated: a node already has a parent, an
    /// index is stale, or a cycle would be introduced.
    #[error("invalid tree: {0}")]
    InvalidTree(String),

    /// A patch referenced an operation tag or payload family the core
    /// has no handler for.
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    /// No candidate anchor in the target tree scored above the
    /// resolver's minimum threshold.
    #[error("could not resolve anchor for operation at path {path:?}")]
    ResolutionFailed { path: Vec<usize> },

    /// An anchor resolved, but the nodes found there don't match the
    /// operation's `remove` list.
    #[error("apply precondition failed at path {path:?}: {reason}")]
    ApplyPrecondition { path: Vec<usize>, reason: String },

    /// Two subtrees hashed equal but a structural recheck found them
    /// different. Never surfaced to callers; the matcher demotes this
    /// to "not equal" and keeps going. Kept as a variant so the
    /// recheck path has something to log/return internally.
    #[error("hash collision detected between subtrees")]
    HashCollisionDetected,

    /// Caller passed something the API doesn't accept: an out-of-range
    /// index, an unmatched root, a malformed path string, etc.
    #[error("parameter error: {0}")]
    ParameterError(String),
}
