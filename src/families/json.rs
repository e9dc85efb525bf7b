//! The plain-JSON family: a document is an arbitrary JSON value. Objects
//! and arrays become element nodes (keyed by `"{"`/`"["` respectively, plus
//! for objects one synthetic child per key carrying that key as an
//! "attribute" of the pseudo-tag), scalars become text leaves. Grounded on
//! the same `Fragment`-building shape as [`crate::families::jsonml`], the
//! difference being entirely in how a [`serde_json::Value`] maps to node
//! shape rather than in any core algorithm.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::arena::{Fragment, Tree};
use crate::error::{Error, Result};
use crate::hash::{Fnv1a, HashKind, NodePayload};

/// A plain-JSON node: a container (object or array, tagged by its kind and
/// for object entries its key) or a scalar leaf rendered to its JSON text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonNode {
    Object,
    Array,
    /// One `key: value` member of an object; the value is this node's
    /// single child.
    Member { key: String },
    Scalar(String),
}

impl NodePayload for JsonNode {
    fn hash_kind(&self) -> HashKind {
        match self {
            JsonNode::Object | JsonNode::Array => HashKind::Element,
            JsonNode::Member { .. } => HashKind::Attribute,
            JsonNode::Scalar(_) => HashKind::Text,
        }
    }

    fn feed_hash(&self, hasher: &mut Fnv1a) {
        match self {
            JsonNode::Object => hasher.update(b"object"),
            JsonNode::Array => hasher.update(b"array"),
            JsonNode::Member { key } => hasher.update(key.as_bytes()),
            JsonNode::Scalar(s) => hasher.update(s.as_bytes()),
        };
    }

    fn values_equal(&self, other: &Self) -> bool {
        self == other
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        _ => unreachable!("scalar_text called on a container value"),
    }
}

fn parse_fragment(value: &Value) -> Fragment<JsonNode> {
    match value {
        Value::Object(map) => Fragment {
            payload: JsonNode::Object,
            children: map
                .iter()
                .map(|(k, v)| Fragment {
                    payload: JsonNode::Member { key: k.clone() },
                    children: vec![parse_fragment(v)],
                })
                .collect(),
        },
        Value::Array(items) => Fragment {
            payload: JsonNode::Array,
            children: items.iter().map(parse_fragment).collect(),
        },
        scalar => Fragment::leaf(JsonNode::Scalar(scalar_text(scalar))),
    }
}

fn scalar_from_text(text: &str) -> Value {
    match text {
        "null" => Value::Null,
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => parse_number(text)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(text.to_string())),
    }
}

fn parse_number(text: &str) -> Option<serde_json::Number> {
    text.parse::<i64>()
        .map(serde_json::Number::from)
        .ok()
        .or_else(|| text.parse::<f64>().ok().and_then(serde_json::Number::from_f64))
}

fn fragment_to_value(fragment: &Fragment<JsonNode>) -> Value {
    match &fragment.payload {
        JsonNode::Scalar(text) => scalar_from_text(text),
        JsonNode::Array => Value::Array(fragment.children.iter().map(fragment_to_value).collect()),
        JsonNode::Object => {
            let mut map = Map::new();
            for member in &fragment.children {
                if let JsonNode::Member { key } = &member.payload {
                    let value = member
                        .children
                        .first()
                        .map(fragment_to_value)
                        .unwrap_or(Value::Null);
                    map.insert(key.clone(), value);
                }
            }
            Value::Object(map)
        }
        JsonNode::Member { .. } => {
            // A bare member fragment outside an object; serialize as a
            // single-entry object so round-tripping never panics.
            let mut map = BTreeMap::new();
            if let JsonNode::Member { key } = &fragment.payload {
                let value = fragment
                    .children
                    .first()
                    .map(fragment_to_value)
                    .unwrap_or(Value::Null);
                map.insert(key.clone(), value);
            }
            serde_json::to_value(map).unwrap_or(Value::Null)
        }
    }
}

pub fn json_tree(value: &Value) -> Tree<JsonNode> {
    Tree::from_fragment(parse_fragment(value))
}

pub fn parse(input: &str) -> Result<Tree<JsonNode>> {
    let value: Value =
        serde_json::from_str(input).map_err(|e| Error::InvalidTree(format!("malformed JSON: {e}")))?;
    Ok(json_tree(&value))
}

pub fn serialize(tree: &Tree<JsonNode>) -> Result<String> {
    let fragment = tree.extract_fragment(tree.root());
    serde_json::to_string_pretty(&fragment_to_value(&fragment))
        .map_err(|e| Error::InvalidTree(format!("failed to serialize: {e}")))
}

pub fn import_fragments(value: &Value) -> Result<Vec<Fragment<JsonNode>>> {
    Ok(vec![parse_fragment(value)])
}

pub fn export_fragments(fragments: &[Fragment<JsonNode>]) -> Value {
    match fragments {
        [single] => fragment_to_value(single),
        many => Value::Array(many.iter().map(fragment_to_value).collect()),
    }
}

/// Zero-sized marker implementing the spec.md §6 external interfaces for
/// the plain-JSON family.
pub struct JsonFamily;

impl crate::families::TreeAdapter for JsonFamily {
    type Payload = JsonNode;

    fn adapt_document(input: &str) -> Result<Tree<JsonNode>> {
        parse(input)
    }
}

impl crate::families::PayloadHandler for JsonFamily {
    type Payload = JsonNode;

    fn parse_string(input: &str) -> Result<Tree<JsonNode>> {
        parse(input)
    }

    fn serialize_to_string(tree: &Tree<JsonNode>) -> Result<String> {
        serialize(tree)
    }

    fn create_document() -> Tree<JsonNode> {
        json_tree(&Value::Null)
    }
}

/// Foreign mode (spec.md §6): plain-JSON fragments are not JsonML-shaped,
/// so they travel through the wire patch as an embedded JSON value tree
/// rather than passing through unchanged.
impl crate::families::FragmentAdapter for JsonFamily {
    type Payload = JsonNode;

    fn export_fragments(fragments: &[Fragment<JsonNode>]) -> Result<Value> {
        Ok(export_fragments(fragments))
    }

    fn import_fragments(value: &Value) -> Result<Vec<Fragment<JsonNode>>> {
        import_fragments(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_becomes_member_children() {
        let value = serde_json::json!({"a": 1, "b": 2});
        let tree = json_tree(&value);
        assert_eq!(tree.children(tree.root()).len(), 2);
    }

    #[test]
    fn round_trips_nested_structure() {
        let value = serde_json::json!({"a": [1, 2, {"b": "x"}]});
        let tree = json_tree(&value);
        let text = serialize(&tree).unwrap();
        let reparsed = parse(&text).unwrap();
        assert_eq!(reparsed.len(), tree.len());
    }
}
