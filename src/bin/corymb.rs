//! The `corymb` CLI (spec.md §6): a diff front-end. Takes two input
//! files of the same document family, auto-detects the family by
//! extension/content sniff, computes the patch, and writes it to stdout
//! as an XML rendering of the patch (default and `-x`) or the raw
//! JsonML-shaped JSON wire encoding (`-j`).

use std::fs;
use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, info};

use corymb::families::json::{JsonFamily, JsonNode};
use corymb::families::jsonml::{JsonMl, JsonMlFamily};
use corymb::families::xml::{XmlFamily, XmlNode};
use corymb::families::PayloadHandler;
use corymb::{diff as compute_diff, encode, FamilyKind, IndexedTree, NodePayload, Patch};

#[derive(Parser)]
#[command(
    name = "corymb",
    version,
    about = "Context-aware structural diff for tree-shaped documents"
)]
struct Cli {
    /// Emit the patch in the (default) JSON/JsonML wire encoding.
    #[arg(short = 'j', long = "json", conflicts_with = "xml")]
    json: bool,

    /// Emit the patch as an XML rendering of the same structure.
    #[arg(short = 'x', long = "xml")]
    xml: bool,

    /// Print debug-level tracing to stderr.
    #[arg(short = 'd', long = "debug")]
    debug: bool,

    /// The original document.
    original: String,

    /// The changed document.
    changed: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.debug { "debug" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(level))
        .try_init();

    match run(&cli) {
        Ok(output) => {
            println!("{output}");
            ExitCode::from(0)
        }
        Err(message) => {
            eprintln!("corymb: {message}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: &Cli) -> Result<String, String> {
    let original = fs::read_to_string(&cli.original)
        .map_err(|e| format!("cannot read {}: {e}", cli.original))?;
    let changed = fs::read_to_string(&cli.changed)
        .map_err(|e| format!("cannot read {}: {e}", cli.changed))?;

    let family = FamilyKind::detect(&cli.original, &original)
        .map_err(|e| format!("cannot detect document family: {e}"))?;
    let family_b = FamilyKind::detect(&cli.changed, &changed)
        .map_err(|e| format!("cannot detect document family: {e}"))?;
    if family != family_b {
        return Err(format!(
            "{} and {} are not the same document family",
            cli.original, cli.changed
        ));
    }
    info!(?family, "detected document family");

    let encoded = match family {
        FamilyKind::JsonMl => {
            let a = IndexedTree::build(JsonMlFamily::parse_string(&original).map_err(|e| e.to_string())?);
            let b = IndexedTree::build(JsonMlFamily::parse_string(&changed).map_err(|e| e.to_string())?);
            let patch = diff_and_log(&a, &b);
            encode::<JsonMl, JsonMlFamily>(&patch).map_err(|e| e.to_string())?
        }
        FamilyKind::Json => {
            let a = IndexedTree::build(JsonFamily::parse_string(&original).map_err(|e| e.to_string())?);
            let b = IndexedTree::build(JsonFamily::parse_string(&changed).map_err(|e| e.to_string())?);
            let patch = diff_and_log(&a, &b);
            encode::<JsonNode, JsonFamily>(&patch).map_err(|e| e.to_string())?
        }
        FamilyKind::Xml => {
            let a = IndexedTree::build(XmlFamily::parse_string(&original).map_err(|e| e.to_string())?);
            let b = IndexedTree::build(XmlFamily::parse_string(&changed).map_err(|e| e.to_string())?);
            let patch = diff_and_log(&a, &b);
            encode::<XmlNode, XmlFamily>(&patch).map_err(|e| e.to_string())?
        }
    };

    if cli.json {
        serde_json::to_string_pretty(&encoded).map_err(|e| format!("failed to encode patch: {e}"))
    } else {
        Ok(render_xml(&encoded))
    }
}

fn diff_and_log<P: NodePayload>(a: &IndexedTree<P>, b: &IndexedTree<P>) -> Patch<P> {
    let patch = compute_diff(a, b);
    debug!(operations = patch.len(), "computed patch");
    patch
}

/// A small, illustrative JsonML-array-to-XML renderer for `-x` output:
/// `[tag, {attrs}?, children...]` becomes `<tag attrs...>children</tag>`,
/// and bare strings become escaped text nodes. Good enough for a CLI
/// convenience flag; the canonical wire encoding the core `decode`
/// function reads back is always the JSON one.
fn render_xml(value: &serde_json::Value) -> String {
    let mut out = String::new();
    render_xml_node(value, &mut out);
    out
}

fn render_xml_node(value: &serde_json::Value, out: &mut String) {
    match value {
        serde_json::Value::String(s) => out.push_str(&escape_xml(s)),
        serde_json::Value::Array(items) => {
            let mut iter = items.iter();
            let Some(serde_json::Value::String(tag)) = iter.next() else {
                for item in items {
                    render_xml_node(item, out);
                }
                return;
            };
            let mut rest: Vec<&serde_json::Value> = iter.collect();
            let attrs = if let Some(serde_json::Value::Object(map)) = rest.first() {
                let attrs = map.clone();
                rest.remove(0);
                Some(attrs)
            } else {
                None
            };

            out.push('<');
            out.push_str(tag);
            if let Some(attrs) = &attrs {
                for (k, v) in attrs {
                    out.push(' ');
                    out.push_str(k);
                    out.push_str("=\"");
                    out.push_str(&escape_xml(v.as_str().unwrap_or_default()));
                    out.push('"');
                }
            }
            if rest.is_empty() {
                out.push_str("/>");
            } else {
                out.push('>');
                for child in rest {
                    render_xml_node(child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
        other => out.push_str(&escape_xml(&other.to_string())),
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
