//! Nesting depth and visible-row ordering over the flattened tree.

use crate::flat::FlatTree;
use crate::id::NodeId;
use serde::Serialize;

/// Deepest depth a node may sit at (the real root is 0).
///
/// The text form spends two JSON nesting levels per tree level, plus two
/// more for a rule's conditions, and JSON parsing stops at 128. Keeping
/// every tree within this bound means any emitted text parses back.
pub const MAX_DEPTH: usize = 60;

/// Depth of `id` below the real root, found by walking `parent_id` links.
///
/// The sentinel is transparent: the real root and the sentinel are both at
/// depth 0, the root's children at 1, and so on. Returns `None` for an
/// unknown id or a parent chain that does not end at the sentinel within
/// `tree.len()` hops.
pub fn depth(tree: &FlatTree, id: NodeId) -> Option<usize> {
    let mut current = tree.get(id)?;
    let mut hops = 0usize;
    while let Some(parent) = current.parent_id {
        hops += 1;
        if hops > tree.len() {
            log::warn!("depth: parent chain from `{id}` does not terminate");
            return None;
        }
        current = tree.get(parent)?;
    }
    if current.id != tree.root_id {
        return None;
    }
    Some(hops.saturating_sub(1))
}

/// Levels below `id`: 0 for a leaf or an unknown id.
pub fn subtree_height(tree: &FlatTree, id: NodeId) -> usize {
    let mut height = 0;
    let mut stack = vec![(id, 0usize)];
    let mut visited = 0usize;
    while let Some((current, level)) = stack.pop() {
        visited += 1;
        if visited > tree.len() {
            log::warn!("subtree_height: `{id}` reaches more items than exist");
            break;
        }
        height = height.max(level);
        if let Some(item) = tree.get(current) {
            stack.extend(item.child_ids.iter().map(|&child| (child, level + 1)));
        }
    }
    height
}

/// A row the tree widget draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibleRow {
    pub id: NodeId,
    pub depth: usize,
    pub has_children: bool,
    pub is_expanded: bool,
}

/// Rows in display order: pre-order from the real root, skipping the
/// children of collapsed items. The sentinel is never a row.
pub fn visible_rows(tree: &FlatTree) -> Vec<VisibleRow> {
    let mut rows = Vec::new();
    let Ok(root) = tree.real_root() else {
        return rows;
    };

    let mut stack = vec![(root, 0usize)];
    while let Some((id, level)) = stack.pop() {
        let Some(item) = tree.get(id) else {
            continue;
        };
        rows.push(VisibleRow {
            id,
            depth: level,
            has_children: item.has_children,
            is_expanded: item.is_expanded,
        });
        if item.is_expanded {
            stack.extend(item.child_ids.iter().rev().map(|&child| (child, level + 1)));
        }
        // Guard against a cyclic flat tree producing rows forever.
        if rows.len() > tree.len() {
            log::warn!("visible_rows: more rows than items, flat tree is cyclic");
            break;
        }
    }
    rows
}
