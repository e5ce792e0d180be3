//! Structural validation at the text → canonical tree boundary.
//!
//! A parsed JSON value is only treated as a canonical `Tree` after this
//! module has checked every required field, its type, and the global
//! uniqueness of ids. Failures name the offending location, e.g.
//! `root.children[1].conditionGroup[0].operator`.

use crate::depth::MAX_DEPTH;
use crate::error::{TreeError, TreeResult};
use crate::id::NodeId;
use crate::model::{Condition, Operator, Payload, Tree, TreeNode};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Build a canonical tree from a parsed candidate object.
pub fn tree_from_value(value: &Value) -> TreeResult<Tree> {
    let obj = value
        .as_object()
        .ok_or_else(|| TreeError::validation("$", "expected an object with `id` and `root`"))?;
    let id = required_str(obj, "$", "id")?;
    let root_value = obj
        .get("root")
        .ok_or_else(|| TreeError::validation("root", "missing required field"))?;

    let mut seen = HashSet::new();
    let root = node_from_value(root_value, "root", 0, &mut seen)?;
    Ok(Tree {
        id: NodeId::intern(id),
        root,
    })
}

/// Check a tree built in code against the rules text input gets: every id
/// unique, none reserved, nothing deeper than `MAX_DEPTH`.
pub fn check_tree(tree: &Tree) -> TreeResult<()> {
    let mut seen = HashSet::new();
    let mut stack = vec![(&tree.root, 0usize)];
    while let Some((node, level)) = stack.pop() {
        claim_id(node.id, &mut seen)?;
        if level > MAX_DEPTH {
            return Err(too_deep(&node.id.to_string()));
        }
        stack.extend(node.children.iter().map(|child| (child, level + 1)));
    }
    Ok(())
}

// ─── Nodes ───────────────────────────────────────────────────────────────

fn node_from_value(
    value: &Value,
    path: &str,
    level: usize,
    seen: &mut HashSet<NodeId>,
) -> TreeResult<TreeNode> {
    if level > MAX_DEPTH {
        return Err(too_deep(path));
    }
    let obj = value
        .as_object()
        .ok_or_else(|| TreeError::validation(path, "expected a node object"))?;

    let id = NodeId::intern(required_str(obj, path, "id")?);
    claim_id(id, seen)?;

    let payload = payload_from_object(obj, path)?;

    let is_expanded = match obj.get("isExpanded") {
        None | Some(Value::Null) => true,
        Some(Value::Bool(b)) => *b,
        Some(_) => {
            return Err(TreeError::validation(
                &field_path(path, "isExpanded"),
                "expected a boolean",
            ));
        }
    };

    let children_path = field_path(path, "children");
    let children_value = obj
        .get("children")
        .ok_or_else(|| TreeError::validation(&children_path, "missing required field"))?;
    let children = children_value
        .as_array()
        .ok_or_else(|| TreeError::validation(&children_path, "expected an array of nodes"))?
        .iter()
        .enumerate()
        .map(|(i, child)| node_from_value(child, &format!("{children_path}[{i}]"), level + 1, seen))
        .collect::<TreeResult<Vec<_>>>()?;

    Ok(TreeNode {
        id,
        payload,
        is_expanded,
        children,
    })
}

fn payload_from_object(obj: &Map<String, Value>, path: &str) -> TreeResult<Payload> {
    match (obj.contains_key("value"), obj.contains_key("rule")) {
        (true, true) => Err(TreeError::validation(
            path,
            "node has both `value` and `rule`; expected exactly one",
        )),
        (true, false) => Ok(Payload::Label {
            value: required_str(obj, path, "value")?.to_string(),
        }),
        (false, true) => {
            let rule = required_str(obj, path, "rule")?.to_string();
            let group_path = field_path(path, "conditionGroup");
            let condition_group = match obj.get("conditionGroup") {
                None | Some(Value::Null) => Vec::new(),
                Some(Value::Array(items)) => items
                    .iter()
                    .enumerate()
                    .map(|(i, c)| condition_from_value(c, &format!("{group_path}[{i}]")))
                    .collect::<TreeResult<Vec<_>>>()?,
                Some(_) => {
                    return Err(TreeError::validation(
                        &group_path,
                        "expected an array of conditions",
                    ));
                }
            };
            Ok(Payload::Rule {
                rule,
                condition_group,
            })
        }
        (false, false) => Err(TreeError::validation(
            path,
            "missing payload: expected `value` or `rule`",
        )),
    }
}

fn condition_from_value(value: &Value, path: &str) -> TreeResult<Condition> {
    let obj = value
        .as_object()
        .ok_or_else(|| TreeError::validation(path, "expected a condition object"))?;

    let variable = required_str(obj, path, "variable")?.to_string();

    let op_text = required_str(obj, path, "operator")?;
    let operator = Operator::parse(op_text).ok_or_else(|| {
        let allowed: Vec<&str> = Operator::ALL.iter().map(Operator::as_str).collect();
        TreeError::validation(
            &field_path(path, "operator"),
            format!("unknown operator `{op_text}`; expected one of {}", allowed.join(", ")),
        )
    })?;

    let values_path = field_path(path, "values");
    let values = match obj.get("values") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, v)| {
                v.as_str().map(str::to_string).ok_or_else(|| {
                    TreeError::validation(&format!("{values_path}[{i}]"), "expected a string")
                })
            })
            .collect::<TreeResult<Vec<_>>>()?,
        Some(_) => {
            return Err(TreeError::validation(
                &values_path,
                "expected an array of strings",
            ));
        }
    };

    Ok(Condition {
        variable,
        operator,
        values,
    })
}

// ─── Helpers ─────────────────────────────────────────────────────────────

fn too_deep(path: &str) -> TreeError {
    TreeError::validation(path, format!("nested deeper than {MAX_DEPTH} levels"))
}

fn claim_id(id: NodeId, seen: &mut HashSet<NodeId>) -> TreeResult<()> {
    if id.is_sentinel() {
        return Err(TreeError::ReservedId(id));
    }
    if !seen.insert(id) {
        return Err(TreeError::DuplicateId(id));
    }
    Ok(())
}

fn required_str<'a>(obj: &'a Map<String, Value>, path: &str, key: &str) -> TreeResult<&'a str> {
    match obj.get(key) {
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(_) => Err(TreeError::validation(&field_path(path, key), "expected a string")),
        None => Err(TreeError::validation(
            &field_path(path, key),
            "missing required field",
        )),
    }
}

fn field_path(parent: &str, key: &str) -> String {
    if parent == "$" {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}
