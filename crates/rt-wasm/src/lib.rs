//! WASM bridge for the rule tree editor: exposes the sync engine to JavaScript.
//!
//! Compiled via `wasm-pack build --target web`. Every call answers with a
//! JSON string: `{"ok":true,...}` or `{"ok":false,"error":"..."}`.

use rt_core::depth::visible_rows;
use rt_core::format::{FormatConfig, parse_tree};
use rt_core::id::NodeId;
use rt_core::mutate::{TreeDestinationPosition, TreeSourcePosition};
use rt_core::{TreeError, TreeResult};
use rt_editor::sync::{SyncEngine, TreeMutation};
use serde_json::{Value, json};
use wasm_bindgen::prelude::*;

const DEFAULT_TREE: &str = include_str!("../fixtures/default_tree.json");

/// The WASM-facing tree editor.
///
/// Holds the sync engine. The code pane talks to it through `set_text`,
/// `get_text` and `format_text`; the tree pane through `expand`,
/// `collapse`, `expand_all`, `move_item` and `rows_json`.
#[wasm_bindgen]
pub struct RuleTreeEditor {
    engine: SyncEngine,
}

#[wasm_bindgen]
impl RuleTreeEditor {
    /// Create an editor seeded with the default rule tree.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<RuleTreeEditor, String> {
        console_error_panic_hook_setup();
        let engine = SyncEngine::from_text(DEFAULT_TREE, FormatConfig::default())
            .map_err(|e| e.to_string())?;
        Ok(Self { engine })
    }

    /// Preview: re-parse the text pane into the tree. On error the previous
    /// tree stays in place.
    pub fn set_text(&mut self, text: &str) -> String {
        respond(self.engine.set_text(text).map(|()| json!({})))
    }

    /// Sync Code: the text form of the current tree.
    pub fn get_text(&mut self) -> String {
        respond(self.engine.current_text().map(|text| json!({ "text": text })))
    }

    /// Format: re-indent the held text.
    pub fn format_text(&mut self) -> String {
        respond(self.engine.format_text().map(|text| json!({ "text": text })))
    }

    pub fn expand(&mut self, id: &str) -> String {
        self.mutate(TreeMutation::Expand(NodeId::intern(id)))
    }

    pub fn collapse(&mut self, id: &str) -> String {
        self.mutate(TreeMutation::Collapse(NodeId::intern(id)))
    }

    /// Open every node.
    pub fn expand_all(&mut self) -> String {
        self.mutate(TreeMutation::ExpandAll)
    }

    /// Drag end. A missing `dst_parent` is a drop outside any target and
    /// leaves the tree unchanged; a missing `dst_index` appends.
    pub fn move_item(
        &mut self,
        src_parent: &str,
        src_index: usize,
        dst_parent: Option<String>,
        dst_index: Option<usize>,
    ) -> String {
        let source = TreeSourcePosition {
            parent_id: NodeId::intern(src_parent),
            index: src_index,
        };
        let destination = dst_parent.map(|parent| TreeDestinationPosition {
            parent_id: NodeId::intern(&parent),
            index: dst_index,
        });
        self.mutate(TreeMutation::Move {
            source,
            destination,
        })
    }

    /// The canonical tree as a JSON value under `tree`.
    pub fn tree_json(&self) -> String {
        respond(
            serde_json::to_value(self.engine.tree())
                .map(|tree| json!({ "tree": tree }))
                .map_err(|e| TreeError::Serialize(e.to_string())),
        )
    }

    /// Rows for the tree pane in display order, under `rows`.
    pub fn rows_json(&self) -> String {
        let flat = self.engine.flat();
        let rows: Vec<Value> = visible_rows(&flat)
            .into_iter()
            .map(|row| {
                let title = flat
                    .get(row.id)
                    .and_then(|item| item.payload.as_ref())
                    .map(|payload| payload.title())
                    .unwrap_or_default();
                json!({
                    "id": row.id,
                    "title": title,
                    "depth": row.depth,
                    "hasChildren": row.has_children,
                    "isExpanded": row.is_expanded,
                })
            })
            .collect();
        respond(Ok(json!({ "rows": rows })))
    }
}

impl RuleTreeEditor {
    fn mutate(&mut self, mutation: TreeMutation) -> String {
        respond(self.engine.apply_mutation(mutation).map(|()| json!({})))
    }
}

// ─── Responses ───────────────────────────────────────────────────────────

/// Merge `"ok"` into a successful body, or wrap the error message.
fn respond(result: TreeResult<Value>) -> String {
    match result {
        Ok(mut body) => {
            if let Value::Object(map) = &mut body {
                map.insert("ok".into(), Value::Bool(true));
            }
            body.to_string()
        }
        Err(e) => json!({ "ok": false, "error": e.to_string() }).to_string(),
    }
}

// ─── Panic hook for WASM debugging ───────────────────────────────────────

fn console_error_panic_hook_setup() {
    #[cfg(target_arch = "wasm32")]
    {
        use std::sync::Once;
        static SET_HOOK: Once = Once::new();
        SET_HOOK.call_once(|| {
            std::panic::set_hook(Box::new(|info| {
                let msg = format!("rule tree WASM panic: {info}");
                web_sys::console::error_1(&msg.into());
            }));
        });
    }
}

// ─── Standalone validation (no editor needed) ────────────────────────────

/// Validate tree source text. Returns JSON: `{"ok":true}` or `{"ok":false,"error":"..."}`.
#[wasm_bindgen]
pub fn validate(source: &str) -> String {
    respond(parse_tree(source).map(|_| json!({})))
}
