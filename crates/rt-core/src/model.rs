//! Canonical rule-tree data model.
//!
//! The canonical tree is the authoritative nested form: every node owns its
//! children outright, so sharing and self-reference are impossible by
//! construction. Id uniqueness is the one invariant the type system cannot
//! carry; see `validate::check_tree`.

use crate::id::NodeId;
use serde::{Deserialize, Serialize};

// ─── Conditions ──────────────────────────────────────────────────────────

/// Comparison applied by a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    In,
    NotIn,
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
}

impl Operator {
    pub const ALL: [Operator; 6] = [
        Operator::In,
        Operator::NotIn,
        Operator::Equal,
        Operator::NotEqual,
        Operator::LessThan,
        Operator::GreaterThan,
    ];

    /// Parse the text form (`IN`, `NOT_IN`, ...). Case-sensitive.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == s)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::In => "IN",
            Operator::NotIn => "NOT_IN",
            Operator::Equal => "EQUAL",
            Operator::NotEqual => "NOT_EQUAL",
            Operator::LessThan => "LESS_THAN",
            Operator::GreaterThan => "GREATER_THAN",
        }
    }
}

/// A single `variable OPERATOR values` test attached to a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub variable: String,
    pub operator: Operator,
    pub values: Vec<String>,
}

impl Condition {
    pub fn new(variable: &str, operator: Operator, values: &[&str]) -> Self {
        Self {
            variable: variable.to_string(),
            operator,
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }
}

// ─── Nodes ───────────────────────────────────────────────────────────────

/// What a node carries besides its structure.
///
/// Serialized untagged and flattened into the node, so the text form is
/// either `"value": ...` or `"rule": ..., "conditionGroup": [...]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    /// Plain labelled node.
    Label { value: String },
    /// Named rule guarded by a condition group. An absent group is empty,
    /// never omitted.
    Rule {
        rule: String,
        #[serde(rename = "conditionGroup")]
        condition_group: Vec<Condition>,
    },
}

impl Payload {
    /// Human-readable title used by row renderers.
    pub fn title(&self) -> &str {
        match self {
            Payload::Label { value } => value,
            Payload::Rule { rule, .. } => rule,
        }
    }
}

/// A node of the canonical tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    pub id: NodeId,
    #[serde(flatten)]
    pub payload: Payload,
    pub is_expanded: bool,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn new(id: NodeId, payload: Payload) -> Self {
        Self {
            id,
            payload,
            is_expanded: true,
            children: Vec::new(),
        }
    }

    /// Expanded leaf with a scalar label.
    pub fn label(id: &str, value: &str) -> Self {
        Self::new(
            NodeId::intern(id),
            Payload::Label {
                value: value.to_string(),
            },
        )
    }

    /// Expanded leaf with a rule name and its conditions.
    pub fn rule(id: &str, rule: &str, conditions: Vec<Condition>) -> Self {
        Self::new(
            NodeId::intern(id),
            Payload::Rule {
                rule: rule.to_string(),
                condition_group: conditions,
            },
        )
    }

    #[must_use]
    pub fn with_children(mut self, children: Vec<TreeNode>) -> Self {
        self.children = children;
        self
    }

    #[must_use]
    pub fn collapsed(mut self) -> Self {
        self.is_expanded = false;
        self
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

// ─── Tree ────────────────────────────────────────────────────────────────

/// The canonical tree: an identifier plus exactly one root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tree {
    pub id: NodeId,
    pub root: TreeNode,
}

impl Tree {
    pub fn new(id: &str, root: TreeNode) -> Self {
        Self {
            id: NodeId::intern(id),
            root,
        }
    }

    /// Pre-order traversal, root first, children left to right.
    pub fn iter(&self) -> TreeIter<'_> {
        TreeIter {
            stack: vec![&self.root],
        }
    }

    pub fn node_count(&self) -> usize {
        self.iter().count()
    }

    pub fn find(&self, id: NodeId) -> Option<&TreeNode> {
        self.iter().find(|node| node.id == id)
    }
}

/// Pre-order iterator over a canonical tree, driven by an explicit stack.
pub struct TreeIter<'a> {
    stack: Vec<&'a TreeNode>,
}

impl<'a> Iterator for TreeIter<'a> {
    type Item = &'a TreeNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        // Reverse so the leftmost child is visited first.
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}
