//! # corymb
//!
//! A context-aware structural diff and patch engine for tree-shaped
//! documents (XML/DOM, JSON objects, JsonML arrays). Computes a minimal,
//! fingerprint-anchored patch between two documents of the same family,
//! and can re-apply that patch to a third, slightly divergent document by
//! locating each edit's intended site via content hashes rather than
//! rigid paths.
//!
//! ## Pipeline
//!
//! ```text
//! diff(A, B):  A, B --[family adapter]--> Tree --[IndexedTree::build]-->
//!              xcc_diff --> Matching --[extract_operations]--> Patch
//!
//! apply(patch, C): Patch --[ContextResolver against C's indexes]-->
//!                  AttachedOperations --[HandlerFactory]--> Hunks
//!                  --[PatchSession]--> mutated C
//! ```
//!
//! The core (everything except `families` and the `corymb` binary) never
//! names a concrete document family; it is generic over
//! [`hash::NodePayload`].

mod arena;
mod builder;
mod delta;
mod diff;
mod edit;
mod error;
mod fingerprint;
mod hash;
mod hunk;
mod id;
mod index;
mod matching;
mod patch;
mod resolve;
mod skelmatch;

pub mod families;

pub use arena::{Fragment, Tree};
pub use builder::{NodeBuilder, TreeBuilder};
pub use delta::{Anchor, AttachedOperation, DetachedContextOperation, OperationType};
pub use diff::xcc_diff;
pub use error::{Error, Result};
pub use families::FamilyKind;
pub use fingerprint::{FingerprintFactory, DEFAULT_FINGERPRINT_RADIUS};
pub use hash::{HashCache, HashKind, NodePayload};
pub use hunk::{DefaultHandlerFactory, HandlerFactory, Hunk, PatchSession};
pub use id::NodeId;
pub use index::{DocumentOrderIndex, GenerationIndex, IndexedTree};
pub use matching::Matching;
pub use patch::{apply, decode, diff, encode, ApplyMode, ApplyReport, Patch};
pub use resolve::{ContextResolver, ResolverConfig};
pub use skelmatch::{skelmatch, ContextMatcher, ContextScore};
