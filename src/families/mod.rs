//! Document families (SPEC_FULL.md ambient §"document families").
//!
//! Each family is a self-contained module pairing a [`crate::hash::NodePayload`]
//! implementation with parse/serialize functions and fragment import/export
//! helpers. The core (arena, hash, matching, diff, skelmatch, delta,
//! fingerprint, resolve, hunk) never names a family directly — it is generic
//! over `P: NodePayload`. Only the CLI and `patch.rs`'s wire format know all
//! three families exist.
//!
//! The four external interfaces of spec.md §6 (`TreeAdapter`,
//! `PayloadHandler`, `FragmentAdapter`, `HandlerFactory`) are traits here,
//! one concrete (zero-sized) implementor per family. `HandlerFactory` has
//! a single blanket implementation ([`crate::hunk::DefaultHandlerFactory`])
//! since hunk construction never depends on family-specific payload
//! details — see DESIGN.md.

pub mod json;
pub mod jsonml;
pub mod xml;

use serde_json::Value;

use crate::arena::{Fragment, Tree};
use crate::error::{Error, Result};
use crate::hash::NodePayload;

/// `adaptDocument(payload) -> Node` of spec.md §6: parses a document's
/// text into a [`Tree`]. Consumed by the diff driver and (indirectly,
/// through [`crate::index::IndexedTree::build`]) the fingerprint factory.
pub trait TreeAdapter {
    type Payload: NodePayload;

    fn adapt_document(input: &str) -> Result<Tree<Self::Payload>>;
}

/// `parseString`/`serializeToString`/`createDocument` of spec.md §6.
/// Consumed only by file loading and patch serialization — never by the
/// core algorithms themselves.
pub trait PayloadHandler {
    type Payload: NodePayload;

    fn parse_string(input: &str) -> Result<Tree<Self::Payload>>;
    fn serialize_to_string(tree: &Tree<Self::Payload>) -> Result<String>;
    fn create_document() -> Tree<Self::Payload>;
}

/// `adapt`/`importFragment` of spec.md §6: embeds a `remove`/`insert`
/// forest into the serialized patch and reads it back. `native` families
/// (JsonML, the wire format's own shape) pass fragments through as JSON
/// values directly; `foreign` families (XML) serialize to a string and
/// wrap it.
pub trait FragmentAdapter {
    type Payload: NodePayload;

    fn export_fragments(fragments: &[Fragment<Self::Payload>]) -> Result<Value>;
    fn import_fragments(value: &Value) -> Result<Vec<Fragment<Self::Payload>>>;
}

/// Which document family a document belongs to, sniffed from a file
/// extension or a leading-byte heuristic (SPEC_FULL.md §9 open question ii).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FamilyKind {
    JsonMl,
    Json,
    Xml,
}

impl FamilyKind {
    /// Sniff a family from a filename extension, falling back to sniffing
    /// the content's first non-whitespace byte.
    pub fn detect(path: &str, content: &str) -> Result<Self> {
        if let Some(ext) = path.rsplit('.').next() {
            match ext.to_ascii_lowercase().as_str() {
                "xml" | "html" | "htm" => return Ok(FamilyKind::Xml),
                "jsonml" => return Ok(FamilyKind::JsonMl),
                "json" => return Ok(FamilyKind::Json),
                _ => {}
            }
        }
        Self::sniff(content)
    }

    fn sniff(content: &str) -> Result<Self> {
        match content.trim_start().as_bytes().first() {
            Some(b'<') => Ok(FamilyKind::Xml),
            Some(b'[') => Ok(FamilyKind::JsonMl),
            Some(b'{') => Ok(FamilyKind::Json),
            _ => Err(Error::UnsupportedType(
                "could not sniff document family from content".into(),
            )),
        }
    }
}
