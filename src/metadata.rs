//! Metadata file parsing.
//!
//! Metadata files are YAML documents whose top-level mapping becomes page (or
//! site) variables. They are read through the `yaml-rust2` *event* parser
//! rather than a DOM loader because the scalar style of each key and value
//! carries meaning:
//!
//! ## Keys
//!
//! A key written bare (plain style) that starts with the `:` symbol sigil has
//! that first character dropped, so the Ruby-flavoured `:title: Hello` defines
//! `title`. Quoted keys are always taken verbatim: `":title": Hello` defines
//! `:title`.
//!
//! ## Values
//!
//! A scalar written as a literal block is prose:
//!
//! ```yaml
//! intro: |
//!   Some **Markdown** here.
//! ```
//!
//! and is stored as rendered HTML. Every other value is stored as parsed:
//! plain scalars resolve to null/bool/int/float/string, quoted scalars are
//! always strings, and sequences and nested mappings are converted recursively
//! under the same rules.
//!
//! Only the first document of a file is read. Mapping order is preserved.

use crate::markup::Markdown;
use serde_json::{Map, Number, Value};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser};
use yaml_rust2::scanner::{Marker, TScalarStyle};

/// Ordered key → value mapping parsed from one metadata document.
pub type Metadata = Map<String, Value>;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed metadata in {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
}

/// Parse a metadata file into an ordered mapping.
pub fn parse_file(path: &Path, markdown: &Markdown) -> Result<Metadata, MetadataError> {
    let content = fs::read_to_string(path).map_err(|source| MetadataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_str(&content, markdown).map_err(|message| MetadataError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

/// Parse a metadata document held in memory.
///
/// An empty document yields an empty mapping. A document whose root is not a
/// mapping (a bare scalar or a list) also yields an empty mapping: there is
/// nothing to merge.
pub fn parse_str(content: &str, markdown: &Markdown) -> Result<Metadata, String> {
    let mut builder = Builder::new(markdown);
    let mut parser = Parser::new_from_str(content);
    parser
        .load(&mut builder, false)
        .map_err(|e| e.to_string())?;

    match builder.root {
        Some(Value::Object(map)) => Ok(map),
        Some(Value::Null) | None => Ok(Metadata::new()),
        Some(other) => {
            tracing::warn!(
                "metadata document is a {} rather than a mapping; ignoring it",
                kind_name(&other)
            );
            Ok(Metadata::new())
        }
    }
}

/// Merge `overlay` into `base`, later keys overwriting earlier ones.
pub fn merge_into(base: &mut Metadata, overlay: Metadata) {
    for (key, value) in overlay {
        base.insert(key, value);
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}

/// Apply the key rule: bare keys lose a leading `:` sigil.
fn clean_key(raw: String, style: TScalarStyle) -> String {
    match style {
        TScalarStyle::Plain => match raw.strip_prefix(':') {
            Some(stripped) => stripped.to_string(),
            None => raw,
        },
        _ => raw,
    }
}

/// Resolve a plain (unquoted) scalar the way YAML's core schema does.
fn resolve_plain(raw: &str) -> Value {
    match raw {
        "" | "~" | "null" | "Null" | "NULL" => return Value::Null,
        "true" | "True" | "TRUE" => return Value::Bool(true),
        "false" | "False" | "FALSE" => return Value::Bool(false),
        _ => {}
    }
    if let Some(n) = parse_int(raw) {
        return Value::Number(n.into());
    }
    if looks_numeric(raw)
        && let Ok(f) = raw.parse::<f64>()
        && let Some(n) = Number::from_f64(f)
    {
        return Value::Number(n);
    }
    Value::String(raw.to_string())
}

fn parse_int(raw: &str) -> Option<i64> {
    let (negative, digits) = match raw.as_bytes().first()? {
        b'-' => (true, &raw[1..]),
        b'+' => (false, &raw[1..]),
        _ => (false, raw),
    };
    let magnitude = if let Some(hex) = digits.strip_prefix("0x") {
        i64::from_str_radix(hex, 16).ok()?
    } else if let Some(oct) = digits.strip_prefix("0o") {
        i64::from_str_radix(oct, 8).ok()?
    } else if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        digits.parse::<i64>().ok()?
    } else {
        return None;
    };
    Some(if negative { -magnitude } else { magnitude })
}

/// Guards `f64::from_str`, which also accepts words like `inf` and `NaN`.
fn looks_numeric(raw: &str) -> bool {
    let body = raw.trim_start_matches(['-', '+']);
    body.starts_with(|c: char| c.is_ascii_digit() || c == '.')
        && body
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '-' | '+'))
}

// =============================================================================
// Event-stream builder
// =============================================================================

enum Frame {
    Sequence(Vec<Value>),
    Mapping {
        entries: Map<String, Value>,
        pending_key: Option<String>,
    },
}

struct Builder<'a> {
    markdown: &'a Markdown,
    stack: Vec<Frame>,
    root: Option<Value>,
}

impl<'a> Builder<'a> {
    fn new(markdown: &'a Markdown) -> Self {
        Self {
            markdown,
            stack: Vec::new(),
            root: None,
        }
    }

    fn expecting_key(&self) -> bool {
        matches!(
            self.stack.last(),
            Some(Frame::Mapping {
                pending_key: None,
                ..
            })
        )
    }

    /// Attach a finished node to its parent, or make it the root.
    fn push_complete(&mut self, node: Value) {
        match self.stack.last_mut() {
            None => {
                if self.root.is_none() {
                    self.root = Some(node);
                }
            }
            Some(Frame::Sequence(items)) => items.push(node),
            Some(Frame::Mapping {
                entries,
                pending_key,
            }) => match pending_key.take() {
                Some(key) => {
                    entries.insert(key, node);
                }
                // Complex (non-scalar) key: use its JSON text.
                None => *pending_key = Some(node.to_string()),
            },
        }
    }

    fn on_scalar(&mut self, raw: String, style: TScalarStyle) {
        if self.expecting_key() {
            if let Some(Frame::Mapping { pending_key, .. }) = self.stack.last_mut() {
                *pending_key = Some(clean_key(raw, style));
            }
            return;
        }

        let value = match style {
            TScalarStyle::Literal => Value::String(self.markdown.to_html(&raw)),
            TScalarStyle::Plain => resolve_plain(&raw),
            _ => Value::String(raw),
        };
        self.push_complete(value);
    }
}

impl MarkedEventReceiver for Builder<'_> {
    fn on_event(&mut self, ev: Event, _mark: Marker) {
        match ev {
            Event::Scalar(raw, style, ..) => self.on_scalar(raw, style),
            Event::SequenceStart(..) => self.stack.push(Frame::Sequence(Vec::new())),
            Event::MappingStart(..) => self.stack.push(Frame::Mapping {
                entries: Map::new(),
                pending_key: None,
            }),
            Event::SequenceEnd | Event::MappingEnd => {
                let node = match self.stack.pop() {
                    Some(Frame::Sequence(items)) => Value::Array(items),
                    Some(Frame::Mapping { entries, .. }) => Value::Object(entries),
                    None => return,
                };
                self.push_complete(node);
            }
            // Anchors are not tracked; aliases read as null.
            Event::Alias(..) => self.push_complete(Value::Null),
            _ => {}
        }
    }
}
