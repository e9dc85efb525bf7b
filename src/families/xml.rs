//! The XML/DOM family: elements carry a tag name and attributes (each
//! attribute hashed under [`HashKind::Attribute`] as its own pseudo-node,
//! unlike [`crate::families::jsonml`] which folds attributes into the
//! element's own hash — this family is the one the spec's `ATTRIBUTE`
//! hash prefix is actually for), text nodes carry character data. Parsed
//! and serialized with `quick-xml`'s event reader/writer, the way the
//! teacher's codec layers stream rather than build a DOM up front.

use std::collections::BTreeMap;
use std::io::Cursor;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

use crate::arena::{Fragment, Tree};
use crate::error::{Error, Result};
use crate::hash::{Fnv1a, HashKind, NodePayload};

/// One XML node: an element (tag plus sorted attributes) or a text leaf.
/// Attributes are not modeled as distinct child nodes — they hash under
/// [`HashKind::Attribute`] but stay inline on the element, since the
/// arena's `Tree::children` would otherwise need to interleave attribute
/// nodes with element children for no benefit to diffing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element {
        tag: String,
        attrs: BTreeMap<String, String>,
    },
    Text(String),
}

impl NodePayload for XmlNode {
    fn hash_kind(&self) -> HashKind {
        match self {
            XmlNode::Element { .. } => HashKind::Element,
            XmlNode::Text(_) => HashKind::Text,
        }
    }

    fn feed_hash(&self, hasher: &mut Fnv1a) {
        match self {
            XmlNode::Element { tag, attrs } => {
                hasher.update(tag.as_bytes());
                for (k, v) in attrs {
                    let mut attr_hasher = Fnv1a::new();
                    attr_hasher.update(k.as_bytes());
                    attr_hasher.update(v.as_bytes());
                    hasher.update(&attr_hasher.get().to_be_bytes());
                }
            }
            XmlNode::Text(s) => hasher.update(s.as_bytes()),
        };
    }

    fn values_equal(&self, other: &Self) -> bool {
        self == other
    }
}

/// Parse an XML document's text into a [`Tree`].
pub fn parse(input: &str) -> Result<Tree<XmlNode>> {
    let mut reader = Reader::from_str(input);
    reader.config_mut().trim_text(true);

    // Stack of (tag, attrs, children-so-far); the top is the node currently
    // being built.
    let mut stack: Vec<(String, BTreeMap<String, String>, Vec<Fragment<XmlNode>>)> = Vec::new();
    let mut root: Option<Fragment<XmlNode>> = None;
    let mut buf = Vec::new();

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| Error::InvalidTree(format!("XML parse error: {e}")))?
        {
            Event::Start(start) => {
                let (tag, attrs) = read_start(&start)?;
                stack.push((tag, attrs, Vec::new()));
            }
            Event::Empty(start) => {
                let (tag, attrs) = read_start(&start)?;
                let fragment = Fragment {
                    payload: XmlNode::Element { tag, attrs },
                    children: Vec::new(),
                };
                push_child(&mut stack, &mut root, fragment);
            }
            Event::End(_end) => {
                let (tag, attrs, children) = stack.pop().ok_or_else(|| {
                    Error::InvalidTree("unmatched closing tag in XML document".into())
                })?;
                let fragment = Fragment {
                    payload: XmlNode::Element { tag, attrs },
                    children,
                };
                push_child(&mut stack, &mut root, fragment);
            }
            Event::Text(text) => {
                let decoded = text
                    .unescape()
                    .map_err(|e| Error::InvalidTree(format!("XML text decode error: {e}")))?
                    .trim()
                    .to_string();
                if !decoded.is_empty() {
                    let fragment = Fragment::leaf(XmlNode::Text(decoded));
                    push_child(&mut stack, &mut root, fragment);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    let root = root.ok_or_else(|| Error::InvalidTree("XML document has no root element".into()))?;
    Ok(Tree::from_fragment(root))
}

fn read_start(start: &BytesStart) -> Result<(String, BTreeMap<String, String>)> {
    let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attrs = BTreeMap::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| Error::InvalidTree(format!("bad XML attribute: {e}")))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| Error::InvalidTree(format!("bad XML attribute value: {e}")))?
            .into_owned();
        attrs.insert(key, value);
    }
    Ok((tag, attrs))
}

fn push_child(
    stack: &mut [(String, BTreeMap<String, String>, Vec<Fragment<XmlNode>>)],
    root: &mut Option<Fragment<XmlNode>>,
    fragment: Fragment<XmlNode>,
) {
    if let Some(top) = stack.last_mut() {
        top.2.push(fragment);
    } else {
        *root = Some(fragment);
    }
}

/// Serialize a tree back to XML text.
pub fn serialize(tree: &Tree<XmlNode>) -> Result<String> {
    let fragment = tree.extract_fragment(tree.root());
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    write_fragment(&mut writer, &fragment)?;
    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).map_err(|e| Error::InvalidTree(format!("non-UTF-8 XML output: {e}")))
}

fn write_fragment(writer: &mut Writer<Cursor<Vec<u8>>>, fragment: &Fragment<XmlNode>) -> Result<()> {
    match &fragment.payload {
        XmlNode::Text(s) => {
            writer
                .write_event(Event::Text(BytesText::new(s)))
                .map_err(|e| Error::InvalidTree(format!("XML write error: {e}")))?;
        }
        XmlNode::Element { tag, attrs } => {
            let mut start = BytesStart::new(tag.as_str());
            for (k, v) in attrs {
                start.push_attribute((k.as_str(), v.as_str()));
            }
            if fragment.children.is_empty() {
                writer
                    .write_event(Event::Empty(start))
                    .map_err(|e| Error::InvalidTree(format!("XML write error: {e}")))?;
            } else {
                writer
                    .write_event(Event::Start(start))
                    .map_err(|e| Error::InvalidTree(format!("XML write error: {e}")))?;
                for child in &fragment.children {
                    write_fragment(writer, child)?;
                }
                writer
                    .write_event(Event::End(BytesEnd::new(tag.as_str())))
                    .map_err(|e| Error::InvalidTree(format!("XML write error: {e}")))?;
            }
        }
    }
    Ok(())
}

/// Import a single fragment from its serialized XML form, for use on a
/// patch's `remove`/`insert` forest (spec.md §6 illustrates the wire
/// format as JsonML; the XML family's own wire encoding is the same shape
/// with string-serialized XML in place of a nested array).
pub fn import_fragment(xml: &str) -> Result<Fragment<XmlNode>> {
    let tree = parse(xml)?;
    Ok(tree.extract_fragment(tree.root()))
}

pub fn export_fragment(fragment: &Fragment<XmlNode>) -> Result<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    write_fragment(&mut writer, fragment)?;
    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).map_err(|e| Error::InvalidTree(format!("non-UTF-8 XML output: {e}")))
}

/// Zero-sized marker implementing the spec.md §6 external interfaces for
/// the XML/DOM family.
pub struct XmlFamily;

impl crate::families::TreeAdapter for XmlFamily {
    type Payload = XmlNode;

    fn adapt_document(input: &str) -> Result<Tree<XmlNode>> {
        parse(input)
    }
}

impl crate::families::PayloadHandler for XmlFamily {
    type Payload = XmlNode;

    fn parse_string(input: &str) -> Result<Tree<XmlNode>> {
        parse(input)
    }

    fn serialize_to_string(tree: &Tree<XmlNode>) -> Result<String> {
        serialize(tree)
    }

    fn create_document() -> Tree<XmlNode> {
        Tree::from_fragment(Fragment::leaf(XmlNode::Element {
            tag: "root".to_string(),
            attrs: BTreeMap::new(),
        }))
    }
}

/// Foreign mode (spec.md §6): the wire patch is JsonML-shaped, so an XML
/// fragment is serialized to its string form and wrapped as a JSON string
/// rather than embedded structurally.
impl crate::families::FragmentAdapter for XmlFamily {
    type Payload = XmlNode;

    fn export_fragments(fragments: &[Fragment<XmlNode>]) -> Result<serde_json::Value> {
        let strings: Vec<String> = fragments.iter().map(export_fragment).collect::<Result<_>>()?;
        Ok(serde_json::Value::Array(
            strings.into_iter().map(serde_json::Value::String).collect(),
        ))
    }

    fn import_fragments(value: &serde_json::Value) -> Result<Vec<Fragment<XmlNode>>> {
        let strings: Vec<&str> = match value {
            serde_json::Value::Array(items) => items
                .iter()
                .map(|v| {
                    v.as_str().ok_or_else(|| {
                        Error::UnsupportedType(
                            "expected every entry of an XML fragment array to be a string".into(),
                        )
                    })
                })
                .collect::<Result<_>>()?,
            serde_json::Value::String(s) => vec![s.as_str()],
            _ => {
                return Err(Error::UnsupportedType(
                    "expected a JSON string or array of strings for an XML fragment".into(),
                ))
            }
        };
        strings.into_iter().map(import_fragment).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements() {
        let tree = parse("<ul class=\"list\"><li>a</li><li>b</li></ul>").unwrap();
        assert_eq!(tree.children(tree.root()).len(), 2);
        match tree.payload(tree.root()) {
            XmlNode::Element { tag, attrs } => {
                assert_eq!(tag, "ul");
                assert_eq!(attrs.get("class"), Some(&"list".to_string()));
            }
            XmlNode::Text(_) => panic!("expected element"),
        }
    }

    #[test]
    fn round_trips_through_serialize() {
        let tree = parse("<p>hello</p>").unwrap();
        let text = serialize(&tree).unwrap();
        let reparsed = parse(&text).unwrap();
        assert_eq!(reparsed.len(), tree.len());
    }

    #[test]
    fn self_closing_elements_have_no_children() {
        let tree = parse("<br/>").unwrap();
        assert_eq!(tree.children(tree.root()).len(), 0);
    }
}
