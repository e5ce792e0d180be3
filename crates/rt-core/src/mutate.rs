//! Mutation operators over the flattened tree.
//!
//! Every operator takes a `&FlatTree` and returns a new one; the input is
//! never modified. Each ends with a full `FlatTree::reindex` because the
//! item-patch primitive underneath does not maintain `parent_id`.

use crate::depth::{MAX_DEPTH, depth, subtree_height};
use crate::error::{TreeError, TreeResult};
use crate::flat::FlatTree;
use crate::id::NodeId;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

// ─── Positions ───────────────────────────────────────────────────────────

/// Where a dragged item comes from: its parent and ordinal within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeSourcePosition {
    pub parent_id: NodeId,
    pub index: usize,
}

/// Where a dragged item is dropped. `index: None` means "dropped onto the
/// parent itself" and appends as the last child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeDestinationPosition {
    pub parent_id: NodeId,
    #[serde(default)]
    pub index: Option<usize>,
}

impl TreeSourcePosition {
    pub fn new(parent_id: &str, index: usize) -> Self {
        Self {
            parent_id: NodeId::intern(parent_id),
            index,
        }
    }
}

impl TreeDestinationPosition {
    pub fn new(parent_id: &str, index: usize) -> Self {
        Self {
            parent_id: NodeId::intern(parent_id),
            index: Some(index),
        }
    }

    pub fn onto(parent_id: &str) -> Self {
        Self {
            parent_id: NodeId::intern(parent_id),
            index: None,
        }
    }
}

// ─── Item patch primitive ────────────────────────────────────────────────

/// Field replacements for one item. Unset fields are left alone.
#[derive(Debug, Default)]
struct ItemPatch {
    is_expanded: Option<bool>,
    child_ids: Option<SmallVec<[NodeId; 4]>>,
}

/// Replace fields on one item. Back-references are left as they were,
/// so callers must `reindex` before handing the tree out.
fn mutate_item(mut tree: FlatTree, id: NodeId, patch: ItemPatch) -> FlatTree {
    if let Some(item) = tree.items.get_mut(&id) {
        if let Some(expanded) = patch.is_expanded {
            item.is_expanded = expanded;
        }
        if let Some(child_ids) = patch.child_ids {
            item.child_ids = child_ids;
        }
    }
    tree
}

// ─── Operators ───────────────────────────────────────────────────────────

/// Set the expansion flag of one item. An unknown id yields an unchanged copy.
#[must_use]
pub fn set_expansion(tree: &FlatTree, id: NodeId, expanded: bool) -> FlatTree {
    if !tree.items.contains_key(&id) {
        log::warn!("set_expansion: unknown item `{id}`");
        return tree.clone();
    }
    let mut next = mutate_item(
        tree.clone(),
        id,
        ItemPatch {
            is_expanded: Some(expanded),
            ..Default::default()
        },
    );
    next.reindex();
    next
}

/// Detach the item at `source` and insert it at `destination`.
///
/// A `None` destination (drag cancelled or dropped outside a target) returns
/// an unchanged copy. The destination index is read after the detach, so
/// reordering within one parent behaves like a list move; it is clamped to
/// the child count.
///
/// # Errors
/// - `InvalidPosition`: unknown source or destination parent, or a source
///   index past the end of the parent's children.
/// - `StructuralViolation`: the destination parent is the moved item or lies
///   in its subtree, the move would leave the sentinel without exactly
///   one child, or a moved node would end up deeper than `MAX_DEPTH`.
///
/// On error the input is untouched and nothing is returned.
pub fn move_item(
    tree: &FlatTree,
    source: &TreeSourcePosition,
    destination: Option<&TreeDestinationPosition>,
) -> TreeResult<FlatTree> {
    let Some(destination) = destination else {
        log::debug!("move_item: no destination, drag cancelled");
        return Ok(tree.clone());
    };

    let source_parent = tree.get(source.parent_id).ok_or_else(|| {
        TreeError::InvalidPosition(format!("unknown source parent `{}`", source.parent_id))
    })?;
    let moved = *source_parent.child_ids.get(source.index).ok_or_else(|| {
        TreeError::InvalidPosition(format!(
            "source index {} out of range for `{}` ({} children)",
            source.index,
            source.parent_id,
            source_parent.child_ids.len()
        ))
    })?;
    if !tree.items.contains_key(&destination.parent_id) {
        return Err(TreeError::InvalidPosition(format!(
            "unknown destination parent `{}`",
            destination.parent_id
        )));
    }
    if destination.parent_id == moved || tree.is_descendant_of(destination.parent_id, moved) {
        return Err(TreeError::StructuralViolation(format!(
            "cannot move `{moved}` into its own subtree (`{}`)",
            destination.parent_id
        )));
    }
    if (source.parent_id == tree.root_id) != (destination.parent_id == tree.root_id) {
        return Err(TreeError::StructuralViolation(
            "the tree must keep exactly one root".into(),
        ));
    }
    if destination.parent_id != tree.root_id {
        let parent_depth = depth(tree, destination.parent_id).ok_or_else(|| {
            TreeError::Structure(format!("`{}` is not reachable from the root", destination.parent_id))
        })?;
        let deepest = parent_depth + 1 + subtree_height(tree, moved);
        if deepest > MAX_DEPTH {
            return Err(TreeError::StructuralViolation(format!(
                "moving `{moved}` under `{}` nests the tree {deepest} levels deep (limit {MAX_DEPTH})",
                destination.parent_id
            )));
        }
    }

    let mut source_children = source_parent.child_ids.clone();
    source_children.remove(source.index);
    let detached = mutate_item(
        tree.clone(),
        source.parent_id,
        ItemPatch {
            child_ids: Some(source_children),
            ..Default::default()
        },
    );

    let mut dest_children = detached.items[&destination.parent_id].child_ids.clone();
    let at = destination
        .index
        .map_or(dest_children.len(), |i| i.min(dest_children.len()));
    dest_children.insert(at, moved);
    let mut next = mutate_item(
        detached,
        destination.parent_id,
        ItemPatch {
            child_ids: Some(dest_children),
            ..Default::default()
        },
    );

    next.reindex();
    next.check_consistency()?;
    log::debug!(
        "move_item: `{moved}` from `{}`[{}] to `{}`[{at}]",
        source.parent_id,
        source.index,
        destination.parent_id
    );
    Ok(next)
}
