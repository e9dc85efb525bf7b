//! The wire format and the top-level `diff`/`apply` drivers that tie
//! matching, the editor, the resolver and hunks together.
//!
//! A [`Patch`] is a family-neutral sequence of
//! [`DetachedContextOperation`]s. `encode`/`decode` implement a
//! JsonML-shaped wire encoding: a `delta` root containing `node`/`forest`
//! operation elements, each carrying a slash-separated `path` attribute
//! and four children — `context` (head), `remove`, `insert`, `context`
//! (tail) — with fingerprints serialized as semicolon-separated lowercase
//! hex (an empty entry standing for zero).

use serde_json::Value;
use tracing::{debug, debug_span};

use crate::arena::Tree;
use crate::delta::{extract_operations, AttachedOperation, DetachedContextOperation, OperationType};
use crate::diff::xcc_diff;
use crate::error::{Error, Result};
use crate::families::FragmentAdapter;
use crate::hash::NodePayload;
use crate::hunk::{DefaultHandlerFactory, HandlerFactory, PatchSession};
use crate::index::IndexedTree;
use crate::resolve::{ContextResolver, ResolverConfig};

/// A family-neutral sequence of operations turning one document into
/// another.
#[derive(Debug, Clone, Default)]
pub struct Patch<P> {
    pub operations: Vec<DetachedContextOperation<P>>,
}

impl<P> Patch<P> {
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }
}

/// Compute the patch turning `a` into `b`: XCC match, then walk the
/// matching in postorder emitting operations with fingerprints.
pub fn diff<P: NodePayload>(a: &IndexedTree<P>, b: &IndexedTree<P>) -> Patch<P> {
    debug_span!("diff").in_scope(|| {
        let matching = xcc_diff(a, b);
        let operations = extract_operations(a, b, &matching);
        debug!("computed patch with {} operations", operations.len());
        Patch { operations }
    })
}

/// Caller's choice of how an apply session handles a `ResolutionFailed`
/// hunk: skip it and keep going, or abort and unwind everything already
/// activated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    BestEffort,
    Strict,
}

/// Outcome of an `apply` call: how many operations were applied, and
/// which (by index into the patch) were skipped in best-effort mode.
#[derive(Debug, Clone, Default)]
pub struct ApplyReport {
    pub applied: usize,
    pub skipped: Vec<usize>,
}

/// Apply `patch` to `target`, mutating it in place.
///
/// Resolution happens once, against `target`'s indexes as they stand
/// before any hunk is activated (an [`IndexedTree`] borrowed immutably
/// for the whole resolution pass): `patch` plus the target's indexes
/// produce `AttachedOperation`s, which are then activated as hunks in
/// patch order against the live [`Tree`].
pub fn apply<P: NodePayload>(
    patch: &Patch<P>,
    target: &mut Tree<P>,
    mode: ApplyMode,
    resolver_config: ResolverConfig,
) -> Result<ApplyReport> {
    debug_span!("apply").in_scope(|| {
        let attached = {
            let indexed = IndexedTree::build(target.clone());
            let resolver = ContextResolver::new(&indexed, resolver_config);
            let mut attached = Vec::with_capacity(patch.operations.len());
            for (i, op) in patch.operations.iter().enumerate() {
                match resolver.resolve(op) {
                    Ok(anchor) => attached.push(Some(AttachedOperation {
                        detached: op.clone(),
                        anchor,
                    })),
                    Err(e) => {
                        if mode == ApplyMode::Strict {
                            return Err(e);
                        }
                        debug!("skipping operation {i}: {e}");
                        attached.push(None);
                    }
                }
            }
            attached
        };

        let mut session = PatchSession::new();
        let mut report = ApplyReport::default();

        for (i, op) in attached.into_iter().enumerate() {
            let Some(op) = op else {
                report.skipped.push(i);
                continue;
            };
            let hunk = DefaultHandlerFactory::create_operation_handler(&op);
            if let Err(e) = session.activate(target, hunk) {
                if mode == ApplyMode::Strict {
                    session.abort(target)?;
                    return Err(e);
                }
                debug!("skipping operation {i} (apply precondition failed): {e}");
                report.skipped.push(i);
                continue;
            }
            report.applied += 1;
        }

        Ok(report)
    })
}

fn path_to_string(path: &[usize]) -> String {
    path.iter().map(usize::to_string).collect::<Vec<_>>().join("/")
}

fn path_from_string(s: &str) -> Result<Vec<usize>> {
    if s.is_empty() {
        return Ok(Vec::new());
    }
    s.split('/')
        .map(|part| {
            part.parse::<usize>()
                .map_err(|_| Error::ParameterError(format!("bad path segment {part:?}")))
        })
        .collect()
}

fn fingerprint_to_hex(fingerprint: &[u32]) -> String {
    fingerprint
        .iter()
        .map(|&h| if h == 0 { String::new() } else { format!("{h:x}") })
        .collect::<Vec<_>>()
        .join(";")
}

fn fingerprint_from_hex(s: &str) -> Result<Vec<u32>> {
    if s.is_empty() {
        return Ok(Vec::new());
    }
    s.split(';')
        .map(|entry| {
            if entry.is_empty() {
                Ok(0)
            } else {
                u32::from_str_radix(entry, 16)
                    .map_err(|_| Error::ParameterError(format!("bad fingerprint entry {entry:?}")))
            }
        })
        .collect()
}

fn context_element(hex: String) -> Value {
    Value::Array(vec![Value::String("context".into()), Value::String(hex)])
}

fn context_text(element: &Value) -> Result<&str> {
    element
        .as_array()
        .and_then(|a| a.get(1))
        .and_then(Value::as_str)
        .ok_or_else(|| Error::UnsupportedType("malformed context element".into()))
}

/// Encode `patch` as the JsonML-shaped wire format, using `F` to embed
/// each operation's `remove`/`insert` forests.
pub fn encode<P: NodePayload, F: FragmentAdapter<Payload = P>>(patch: &Patch<P>) -> Result<Value> {
    let ops = patch
        .operations
        .iter()
        .map(|op| {
            let tag = match op.op_type {
                OperationType::UpdateNode => "node",
                OperationType::UpdateForest => "forest",
            };
            Ok(Value::Array(vec![
                Value::String(tag.into()),
                serde_json::json!({ "path": path_to_string(&op.path) }),
                context_element(fingerprint_to_hex(&op.head)),
                Value::Array(vec![Value::String("remove".into()), F::export_fragments(&op.remove)?]),
                Value::Array(vec![Value::String("insert".into()), F::export_fragments(&op.insert)?]),
                context_element(fingerprint_to_hex(&op.tail)),
            ]))
        })
        .collect::<Result<Vec<Value>>>()?;

    Ok(Value::Array(vec![Value::String("delta".into()), Value::Array(ops)]))
}

/// Decode a patch encoded by [`encode`].
pub fn decode<P: NodePayload, F: FragmentAdapter<Payload = P>>(value: &Value) -> Result<Patch<P>> {
    let items = value
        .as_array()
        .ok_or_else(|| Error::UnsupportedType("patch root must be an array".into()))?;
    if items.first().and_then(Value::as_str) != Some("delta") {
        return Err(Error::UnsupportedType(
            "patch root element must be tagged \"delta\"".into(),
        ));
    }
    let ops = items
        .get(1)
        .and_then(Value::as_array)
        .ok_or_else(|| Error::UnsupportedType("delta element has no operation list".into()))?;

    ops.iter()
        .map(|op| {
            let fields = op
                .as_array()
                .ok_or_else(|| Error::UnsupportedType("operation element must be an array".into()))?;
            let tag = fields
                .first()
                .and_then(Value::as_str)
                .ok_or_else(|| Error::UnsupportedType("operation element has no tag".into()))?;
            let op_type = match tag {
                "node" => OperationType::UpdateNode,
                "forest" => OperationType::UpdateForest,
                other => return Err(Error::UnsupportedType(format!("unknown operation tag {other:?}"))),
            };
            let path = fields
                .get(1)
                .and_then(|attrs| attrs.get("path"))
                .and_then(Value::as_str)
                .ok_or_else(|| Error::UnsupportedType("operation element has no path attribute".into()))?;
            let head = fingerprint_from_hex(context_text(
                fields
                    .get(2)
                    .ok_or_else(|| Error::UnsupportedType("operation element missing head context".into()))?,
            )?)?;
            let remove = F::import_fragments(
                fields
                    .get(3)
                    .and_then(|e| e.as_array())
                    .and_then(|a| a.get(1))
                    .ok_or_else(|| Error::UnsupportedType("operation element missing remove".into()))?,
            )?;
            let insert = F::import_fragments(
                fields
                    .get(4)
                    .and_then(|e| e.as_array())
                    .and_then(|a| a.get(1))
                    .ok_or_else(|| Error::UnsupportedType("operation element missing insert".into()))?,
            )?;
            let tail = fingerprint_from_hex(context_text(
                fields
                    .get(5)
                    .ok_or_else(|| Error::UnsupportedType("operation element missing tail context".into()))?,
            )?)?;

            Ok(DetachedContextOperation {
                op_type,
                path: path_from_string(path)?,
                remove,
                insert,
                head,
                tail,
            })
        })
        .collect::<Result<Vec<_>>>()
        .map(|operations| Patch { operations })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::families::jsonml::{jsonml_tree, JsonMl, JsonMlFamily};

    fn indexed(value: serde_json::Value) -> IndexedTree<JsonMl> {
        IndexedTree::build(jsonml_tree(&value).unwrap())
    }

    #[test]
    fn empty_diff_produces_empty_patch() {
        let a = indexed(serde_json::json!(["article"]));
        let b = indexed(serde_json::json!(["article"]));
        let patch = diff(&a, &b);
        assert!(patch.is_empty());
    }

    #[test]
    fn apply_round_trips_a_text_change() {
        let a = indexed(serde_json::json!(["p", "hello"]));
        let b = indexed(serde_json::json!(["p", "world"]));
        let patch = diff(&a, &b);

        let mut target = a.tree().clone();
        let report = apply(&patch, &mut target, ApplyMode::Strict, ResolverConfig::default()).unwrap();
        assert_eq!(report.applied, patch.len());
        assert_eq!(report.skipped.len(), 0);

        let result = IndexedTree::build(target);
        assert_eq!(result.hashes().subtree_hash(result.root()), b.hashes().subtree_hash(b.root()));
    }

    #[test]
    fn context_resolution_survives_unrelated_target_drift() {
        let a = indexed(serde_json::json!(["ul", ["li", "a"], ["li", "c"]]));
        let b = indexed(serde_json::json!(["ul", ["li", "a"], ["li", "b"], ["li", "c"]]));
        let patch = diff(&a, &b);

        let mut drifted = jsonml_tree(&serde_json::json!(["ul", ["li", "a"], ["li", "c"], ["li", "d"]])).unwrap();
        let report = apply(&patch, &mut drifted, ApplyMode::Strict, ResolverConfig::default()).unwrap();
        assert_eq!(report.applied, 1);

        let result = crate::families::jsonml::serialize(&drifted).unwrap();
        let value: serde_json::Value = serde_json::from_str(&result).unwrap();
        assert_eq!(
            value,
            serde_json::json!(["ul", ["li", "a"], ["li", "b"], ["li", "c"], ["li", "d"]])
        );
    }

    #[test]
    fn resolution_failure_leaves_target_unchanged_in_strict_mode() {
        let a = indexed(serde_json::json!(["ul", ["li", "a"], ["li", "c"]]));
        let b = indexed(serde_json::json!(["ul", ["li", "a"], ["li", "b"], ["li", "c"]]));
        let patch = diff(&a, &b);

        let mut unrelated = jsonml_tree(&serde_json::json!(["ol", ["x"]])).unwrap();
        let before = crate::families::jsonml::serialize(&unrelated).unwrap();
        let err = apply(&patch, &mut unrelated, ApplyMode::Strict, ResolverConfig::default());
        assert!(err.is_err());
        let after = crate::families::jsonml::serialize(&unrelated).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn encode_decode_round_trips() {
        let a = indexed(serde_json::json!(["ul", ["li", "a"], ["li", "c"]]));
        let b = indexed(serde_json::json!(["ul", ["li", "a"], ["li", "b"], ["li", "c"]]));
        let patch = diff(&a, &b);

        let encoded = encode::<JsonMl, JsonMlFamily>(&patch).unwrap();
        let decoded = decode::<JsonMl, JsonMlFamily>(&encoded).unwrap();
        assert_eq!(decoded.len(), patch.len());
        assert_eq!(decoded.operations[0].path, patch.operations[0].path);
        assert_eq!(decoded.operations[0].head, patch.operations[0].head);
    }
}
