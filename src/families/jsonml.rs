//! The JsonML family (spec.md §1, §8's worked scenarios): a document is a
//! JSON array `[tagName, attrs?, child, child, ...]` or a bare JSON string
//! (a text node). Grounded on the teacher's `JsonValue`/`event.rs` JSON
//! plumbing, generalized to feed the arena builder instead of the
//! teacher's `Rc<RefCell>` node graph.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::arena::{Fragment, Tree};
use crate::error::{Error, Result};
use crate::hash::{Fnv1a, HashKind, NodePayload};

/// One JsonML node's local payload: either an element (tag name plus
/// sorted attributes) or a text leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonMl {
    Element {
        tag: String,
        attrs: BTreeMap<String, String>,
    },
    Text(String),
}

impl NodePayload for JsonMl {
    fn hash_kind(&self) -> HashKind {
        match self {
            JsonMl::Element { .. } => HashKind::Element,
            JsonMl::Text(_) => HashKind::Text,
        }
    }

    /// Attributes are already in ascending key order ([`BTreeMap`]), so
    /// feeding them in iteration order satisfies spec.md §4.C's
    /// stability requirement without a separate sort step.
    fn feed_hash(&self, hasher: &mut Fnv1a) {
        match self {
            JsonMl::Element { tag, attrs } => {
                hasher.update(tag.as_bytes());
                for (k, v) in attrs {
                    hasher.update(k.as_bytes());
                    hasher.update(v.as_bytes());
                }
            }
            JsonMl::Text(s) => {
                hasher.update(s.as_bytes());
            }
        }
    }

    fn values_equal(&self, other: &Self) -> bool {
        self == other
    }
}

/// Parse one JsonML node (array or bare string) into a [`Fragment`].
fn parse_fragment(value: &Value) -> Result<Fragment<JsonMl>> {
    match value {
        Value::String(s) => Ok(Fragment::leaf(JsonMl::Text(s.clone()))),
        Value::Array(items) => {
            let mut iter = items.iter();
            let tag = match iter.next() {
                Some(Value::String(s)) => s.clone(),
                _ => {
                    return Err(Error::InvalidTree(
                        "JsonML element must start with a string tag name".into(),
                    ))
                }
            };

            let mut rest: Vec<&Value> = iter.collect();
            let mut attrs = BTreeMap::new();
            if let Some(Value::Object(map)) = rest.first() {
                for (k, v) in map {
                    let v = v
                        .as_str()
                        .ok_or_else(|| Error::InvalidTree(format!("attribute {k} is not a string")))?;
                    attrs.insert(k.clone(), v.to_string());
                }
                rest.remove(0);
            }

            let children = rest
                .into_iter()
                .map(parse_fragment)
                .collect::<Result<Vec<_>>>()?;

            Ok(Fragment {
                payload: JsonMl::Element { tag, attrs },
                children,
            })
        }
        _ => Err(Error::InvalidTree(
            "JsonML node must be a string or an array".into(),
        )),
    }
}

/// Serialize a fragment back to its JsonML JSON representation.
fn fragment_to_value(fragment: &Fragment<JsonMl>) -> Value {
    match &fragment.payload {
        JsonMl::Text(s) => Value::String(s.clone()),
        JsonMl::Element { tag, attrs } => {
            let mut items = vec![Value::String(tag.clone())];
            if !attrs.is_empty() {
                let map = attrs
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect();
                items.push(Value::Object(map));
            }
            items.extend(fragment.children.iter().map(fragment_to_value));
            Value::Array(items)
        }
    }
}

/// Parse a JsonML document (already-decoded [`serde_json::Value`]) into a
/// [`Tree`].
pub fn jsonml_tree(value: &Value) -> Result<Tree<JsonMl>> {
    Ok(Tree::from_fragment(parse_fragment(value)?))
}

/// Parse a JsonML document from its JSON text form.
pub fn parse(input: &str) -> Result<Tree<JsonMl>> {
    let value: Value = serde_json::from_str(input)
        .map_err(|e| Error::InvalidTree(format!("malformed JSON: {e}")))?;
    jsonml_tree(&value)
}

/// Serialize a tree back to JsonML JSON text.
pub fn serialize(tree: &Tree<JsonMl>) -> Result<String> {
    let fragment = tree.extract_fragment(tree.root());
    serde_json::to_string_pretty(&fragment_to_value(&fragment))
        .map_err(|e| Error::InvalidTree(format!("failed to serialize: {e}")))
}

/// Import a wire-format JSON value (from a patch's `remove`/`insert` forest,
/// spec.md §6) as detached fragments, one per top-level array entry.
pub fn import_fragments(value: &Value) -> Result<Vec<Fragment<JsonMl>>> {
    match value {
        Value::Array(items) if items.first().map(|v| !v.is_string()).unwrap_or(true) => {
            // A bare forest: an array of nodes rather than a single
            // `[tag, ...]` element. Disambiguated from a single element by
            // checking whether the first entry looks like a tag name.
            items.iter().map(parse_fragment).collect()
        }
        other => Ok(vec![parse_fragment(other)?]),
    }
}

/// Export a forest of fragments as a wire-format JSON value.
pub fn export_fragments(fragments: &[Fragment<JsonMl>]) -> Value {
    match fragments {
        [single] => fragment_to_value(single),
        many => Value::Array(many.iter().map(fragment_to_value).collect()),
    }
}

/// Zero-sized marker implementing the spec.md §6 external interfaces for
/// the JsonML family.
pub struct JsonMlFamily;

impl crate::families::TreeAdapter for JsonMlFamily {
    type Payload = JsonMl;

    fn adapt_document(input: &str) -> Result<Tree<JsonMl>> {
        parse(input)
    }
}

impl crate::families::PayloadHandler for JsonMlFamily {
    type Payload = JsonMl;

    fn parse_string(input: &str) -> Result<Tree<JsonMl>> {
        parse(input)
    }

    fn serialize_to_string(tree: &Tree<JsonMl>) -> Result<String> {
        serialize(tree)
    }

    fn create_document() -> Tree<JsonMl> {
        Tree::from_fragment(Fragment::leaf(JsonMl::Element {
            tag: "root".to_string(),
            attrs: BTreeMap::new(),
        }))
    }
}

/// Native mode (spec.md §6): the wire patch is itself JsonML-shaped, so
/// fragments pass through as plain JSON values, no re-encoding.
impl crate::families::FragmentAdapter for JsonMlFamily {
    type Payload = JsonMl;

    fn export_fragments(fragments: &[Fragment<JsonMl>]) -> Result<Value> {
        Ok(export_fragments(fragments))
    }

    fn import_fragments(value: &Value) -> Result<Vec<Fragment<JsonMl>>> {
        import_fragments(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_element_with_attrs_and_children() {
        let value = serde_json::json!(["ul", {"class": "list"}, ["li", "a"], ["li", "b"]]);
        let tree = jsonml_tree(&value).unwrap();
        assert_eq!(tree.len(), 5);
        assert_eq!(tree.children(tree.root()).len(), 2);
        match tree.payload(tree.root()) {
            JsonMl::Element { tag, attrs } => {
                assert_eq!(tag, "ul");
                assert_eq!(attrs.get("class"), Some(&"list".to_string()));
            }
            JsonMl::Text(_) => panic!("expected element"),
        }
    }

    #[test]
    fn round_trips_through_serialize() {
        let value = serde_json::json!(["p", "hello"]);
        let tree = jsonml_tree(&value).unwrap();
        let text = serialize(&tree).unwrap();
        let reparsed = parse(&text).unwrap();
        assert_eq!(reparsed.len(), tree.len());
    }

    #[test]
    fn rejects_non_string_tag() {
        let value = serde_json::json!([1, "oops"]);
        assert!(jsonml_tree(&value).is_err());
    }
}
