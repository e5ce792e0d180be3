//! Text boundary: JSON text ⇄ canonical tree.
//!
//! `parse_tree` is the only way text becomes a `Tree`: JSON parse, then the
//! structural validator. `stringify_tree` writes the fixed field order with
//! the configured indentation.

use crate::error::{TreeError, TreeResult};
use crate::model::Tree;
use crate::validate::tree_from_value;
use serde::Serialize;
use serde_json::Value;
use serde_json::ser::{PrettyFormatter, Serializer};

// ─── Config ───────────────────────────────────────────────────────────────

/// Configuration for text output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatConfig {
    /// Spaces per nesting level. `0` emits the compact single-line form.
    /// Default: **2**.
    pub indent: usize,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self { indent: 2 }
    }
}

impl FormatConfig {
    pub fn compact() -> Self {
        Self { indent: 0 }
    }
}

// ─── Pipeline ─────────────────────────────────────────────────────────────

/// Parse and validate text into a canonical tree.
///
/// # Errors
/// `TreeError::Syntax` for malformed JSON; validator errors for anything
/// that parses but is not a well-formed rule tree.
pub fn parse_tree(text: &str) -> TreeResult<Tree> {
    let value: Value = serde_json::from_str(text).map_err(|e| TreeError::Syntax(e.to_string()))?;
    tree_from_value(&value)
}

/// Serialize a canonical tree to text.
pub fn stringify_tree(tree: &Tree, config: &FormatConfig) -> TreeResult<String> {
    write_value(tree, config)
}

/// Re-indent arbitrary JSON text. Tree shape is not validated, so a
/// half-edited document can still be tidied.
pub fn format_text(text: &str, config: &FormatConfig) -> TreeResult<String> {
    let value: Value = serde_json::from_str(text).map_err(|e| TreeError::Syntax(e.to_string()))?;
    write_value(&value, config)
}

fn write_value<T: Serialize>(value: &T, config: &FormatConfig) -> TreeResult<String> {
    if config.indent == 0 {
        return serde_json::to_string(value).map_err(|e| TreeError::Serialize(e.to_string()));
    }

    let indent = " ".repeat(config.indent);
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(indent.as_bytes()));
    value
        .serialize(&mut ser)
        .map_err(|e| TreeError::Serialize(e.to_string()))?;
    String::from_utf8(buf).map_err(|e| TreeError::Serialize(e.to_string()))
}

// ─── Tests ────────────────────────────────────────────────────────────────
