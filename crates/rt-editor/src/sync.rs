//! Synchronization driver: canonical tree ↔ flattened form ↔ text.
//!
//! - **Driver**: `expand`, `collapse`, `expand_all` and `apply_move` are pure functions
//!   from (current canonical tree, user intent) to a new canonical tree.
//!   Each one flattens, runs a single mutation operator, and unflattens the
//!   result, so callers only ever hold canonical data.
//!
//! - **Engine**: `SyncEngine` holds the latest canonical tree and its text
//!   form for an interactive surface. Text edits re-parse into the tree
//!   ("Preview"); tree edits mark the text dirty and re-emit it lazily
//!   ("Sync Code").

use rt_core::format::{FormatConfig, format_text, parse_tree, stringify_tree};
use rt_core::id::NodeId;
use rt_core::model::Tree;
use rt_core::mutate::{TreeDestinationPosition, TreeSourcePosition, move_item, set_expansion};
use rt_core::validate::check_tree;
use rt_core::{FlatTree, FlattenConfig, TreeResult, flatten, flatten_with, unflatten};

// ─── Driver ──────────────────────────────────────────────────────────────

/// Flatten after checking the id and depth rules, so a tree built in code
/// fails with `DuplicateId` rather than a flat-form structure error.
fn flatten_checked(tree: &Tree, config: &FlattenConfig) -> TreeResult<FlatTree> {
    check_tree(tree)?;
    Ok(flatten_with(tree, config))
}

/// Mark `id` expanded. An unknown id leaves the tree unchanged.
pub fn expand(tree: &Tree, id: NodeId) -> TreeResult<Tree> {
    log::debug!("expand `{id}`");
    let flat = flatten_checked(tree, &FlattenConfig::default())?;
    unflatten(&set_expansion(&flat, id, true), tree.id)
}

/// Mark `id` collapsed. An unknown id leaves the tree unchanged.
pub fn collapse(tree: &Tree, id: NodeId) -> TreeResult<Tree> {
    log::debug!("collapse `{id}`");
    let flat = flatten_checked(tree, &FlattenConfig::default())?;
    unflatten(&set_expansion(&flat, id, false), tree.id)
}

/// Open every node.
pub fn expand_all(tree: &Tree) -> TreeResult<Tree> {
    log::debug!("expand all of `{}`", tree.id);
    let flat = flatten_checked(tree, &FlattenConfig { expand_all: true })?;
    unflatten(&flat, tree.id)
}

/// Move the item at `source` to `destination`.
///
/// An absent destination is a cancelled drag and returns the tree as is.
/// A rejected move returns the error and the caller keeps its tree.
pub fn apply_move(
    tree: &Tree,
    source: &TreeSourcePosition,
    destination: Option<&TreeDestinationPosition>,
) -> TreeResult<Tree> {
    let Some(destination) = destination else {
        log::debug!("move from `{}`[{}] cancelled", source.parent_id, source.index);
        return Ok(tree.clone());
    };
    log::debug!(
        "move `{}`[{}] -> `{}`[{:?}]",
        source.parent_id,
        source.index,
        destination.parent_id,
        destination.index
    );
    let flat = flatten_checked(tree, &FlattenConfig::default())?;
    let moved = move_item(&flat, source, Some(destination))?;
    unflatten(&moved, tree.id)
}

/// A user intent coming from the tree widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeMutation {
    Expand(NodeId),
    Collapse(NodeId),
    ExpandAll,
    Move {
        source: TreeSourcePosition,
        destination: Option<TreeDestinationPosition>,
    },
}

impl TreeMutation {
    /// Run the matching driver function against `tree`.
    pub fn apply_to(&self, tree: &Tree) -> TreeResult<Tree> {
        match self {
            TreeMutation::Expand(id) => expand(tree, *id),
            TreeMutation::Collapse(id) => collapse(tree, *id),
            TreeMutation::ExpandAll => expand_all(tree),
            TreeMutation::Move {
                source,
                destination,
            } => apply_move(tree, source, destination.as_ref()),
        }
    }
}

// ─── Engine ──────────────────────────────────────────────────────────────

/// Holds the authoritative canonical tree and keeps its text form in sync.
pub struct SyncEngine {
    /// The current canonical tree (single source of truth).
    tree: Tree,

    /// The current text representation (stale while `text_dirty`).
    text: String,

    config: FormatConfig,

    /// Set when the tree changed and the text needs re-emit.
    text_dirty: bool,
}

impl SyncEngine {
    /// Create an engine from source text. The stored text is the canonical
    /// emission, not the input verbatim.
    pub fn from_text(text: &str, config: FormatConfig) -> TreeResult<Self> {
        let tree = parse_tree(text)?;
        Self::new(tree, config)
    }

    /// Create an engine around a tree built in code.
    ///
    /// # Errors
    /// The same id and depth errors `parse_tree` reports for text.
    pub fn new(tree: Tree, config: FormatConfig) -> TreeResult<Self> {
        check_tree(&tree)?;
        let text = stringify_tree(&tree, &config)?;
        Ok(Self {
            tree,
            text,
            config,
            text_dirty: false,
        })
    }

    // ─── Tree → Text direction ───────────────────────────────────────────

    /// Apply a widget intent. On failure the held tree is untouched.
    pub fn apply_mutation(&mut self, mutation: TreeMutation) -> TreeResult<()> {
        let next = mutation.apply_to(&self.tree).inspect_err(|err| {
            log::warn!("rejected {mutation:?}: {err}");
        })?;
        if next != self.tree {
            self.tree = next;
            self.text_dirty = true;
        }
        Ok(())
    }

    /// Re-emit the text from the current tree if it changed.
    pub fn flush_to_text(&mut self) -> TreeResult<()> {
        if self.text_dirty {
            self.text = stringify_tree(&self.tree, &self.config)?;
            self.text_dirty = false;
        }
        Ok(())
    }

    // ─── Text → Tree direction ───────────────────────────────────────────

    /// Replace the whole text and re-parse it into the tree.
    ///
    /// Invalid text is rejected and the last good tree and text stay
    /// authoritative.
    pub fn set_text(&mut self, new_text: &str) -> TreeResult<()> {
        let tree = parse_tree(new_text).inspect_err(|err| {
            log::warn!("text rejected, keeping last good tree: {err}");
        })?;
        self.tree = tree;
        self.text = new_text.to_string();
        self.text_dirty = false;
        Ok(())
    }

    /// Re-indent the held text without changing its content.
    pub fn format_text(&mut self) -> TreeResult<&str> {
        self.flush_to_text()?;
        self.text = format_text(&self.text, &self.config)?;
        Ok(&self.text)
    }

    // ─── Queries ─────────────────────────────────────────────────────────

    /// Get current text (synced).
    pub fn current_text(&mut self) -> TreeResult<&str> {
        self.flush_to_text()?;
        Ok(&self.text)
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// The flattened form for rendering. Rebuilt on every call.
    pub fn flat(&self) -> FlatTree {
        flatten(&self.tree)
    }

    pub fn is_text_dirty(&self) -> bool {
        self.text_dirty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rt_core::depth::depth;
    use rt_core::error::TreeError;
    use rt_core::model::TreeNode;

    fn id(s: &str) -> NodeId {
        NodeId::intern(s)
    }

    fn abc() -> Tree {
        Tree::new(
            "T1",
            TreeNode::label("A", "a").with_children(vec![
                TreeNode::label("B", "b").with_children(vec![TreeNode::label("D", "d")]),
                TreeNode::label("C", "c"),
            ]),
        )
    }

    #[test]
    fn collapse_then_expand_restores_tree() {
        let tree = abc();
        let collapsed = collapse(&tree, id("B")).unwrap();
        assert!(!collapsed.find(id("B")).unwrap().is_expanded);
        assert_eq!(expand(&collapsed, id("B")).unwrap(), tree);
    }

    #[test]
    fn expand_is_idempotent() {
        let once = expand(&abc(), id("B")).unwrap();
        assert_eq!(expand(&once, id("B")).unwrap(), once);
    }

    #[test]
    fn expand_unknown_id_is_noop() {
        assert_eq!(expand(&abc(), id("nope")).unwrap(), abc());
    }

    #[test]
    fn reorder_siblings() {
        let moved = apply_move(
            &abc(),
            &TreeSourcePosition::new("A", 1),
            Some(&TreeDestinationPosition::new("A", 0)),
        )
        .unwrap();
        let order: Vec<NodeId> = moved.root.children.iter().map(|n| n.id).collect();
        assert_eq!(order, vec![id("C"), id("B")]);

        let flat = flatten(&moved);
        for child in ["B", "C"] {
            assert_eq!(flat.get(id(child)).unwrap().parent_id, Some(id("A")));
            assert_eq!(depth(&flat, id(child)), Some(1));
        }
    }

    #[test]
    fn cancelled_move_returns_input() {
        let tree = abc();
        let same = apply_move(&tree, &TreeSourcePosition::new("A", 0), None).unwrap();
        assert_eq!(same, tree);
    }

    #[test]
    fn cyclic_move_is_rejected() {
        let err = apply_move(
            &abc(),
            &TreeSourcePosition::new("A", 0),
            Some(&TreeDestinationPosition::onto("D")),
        )
        .unwrap_err();
        assert!(matches!(err, TreeError::StructuralViolation(_)));
    }

    #[test]
    fn mutation_enum_dispatches() {
        let tree = abc();
        let collapsed = TreeMutation::Collapse(id("B")).apply_to(&tree).unwrap();
        assert_eq!(collapsed, collapse(&tree, id("B")).unwrap());

        let moved = TreeMutation::Move {
            source: TreeSourcePosition::new("B", 0),
            destination: Some(TreeDestinationPosition::onto("C")),
        }
        .apply_to(&tree)
        .unwrap();
        assert!(!moved.find(id("B")).unwrap().has_children());
        assert_eq!(moved.find(id("C")).unwrap().children[0].id, id("D"));
    }

    #[test]
    fn engine_marks_text_dirty_until_flush() {
        let mut engine = SyncEngine::new(abc(), FormatConfig::default()).unwrap();
        let before = engine.current_text().unwrap().to_string();

        engine
            .apply_mutation(TreeMutation::Collapse(id("C")))
            .unwrap();
        assert!(engine.is_text_dirty());

        let after = engine.current_text().unwrap().to_string();
        assert!(!engine.is_text_dirty());
        assert_ne!(before, after);
        assert_eq!(parse_tree(&after).unwrap(), *engine.tree());
    }

    #[test]
    fn engine_noop_mutation_keeps_text_clean() {
        let mut engine = SyncEngine::new(abc(), FormatConfig::default()).unwrap();
        engine.apply_mutation(TreeMutation::Expand(id("B"))).unwrap();
        assert!(!engine.is_text_dirty());
    }

    #[test]
    fn engine_rejected_mutation_keeps_state() {
        let mut engine = SyncEngine::new(abc(), FormatConfig::default()).unwrap();
        let result = engine.apply_mutation(TreeMutation::Move {
            source: TreeSourcePosition::new("A", 7),
            destination: Some(TreeDestinationPosition::new("A", 0)),
        });
        assert!(matches!(result, Err(TreeError::InvalidPosition(_))));
        assert_eq!(*engine.tree(), abc());
        assert!(!engine.is_text_dirty());
    }

    fn twin_ids() -> Tree {
        Tree::new(
            "T2",
            TreeNode::label("A", "a")
                .with_children(vec![TreeNode::label("B", "one"), TreeNode::label("B", "two")]),
        )
    }

    #[test]
    fn engine_rejects_duplicate_ids_built_in_code() {
        let err = SyncEngine::new(twin_ids(), FormatConfig::default())
            .err()
            .unwrap();
        assert_eq!(err, TreeError::DuplicateId(id("B")));
    }

    #[test]
    fn driver_rejects_duplicate_ids_at_the_boundary() {
        let tree = twin_ids();
        assert_eq!(collapse(&tree, id("A")), Err(TreeError::DuplicateId(id("B"))));
        assert_eq!(expand_all(&tree), Err(TreeError::DuplicateId(id("B"))));
        assert_eq!(
            apply_move(
                &tree,
                &TreeSourcePosition::new("A", 0),
                Some(&TreeDestinationPosition::new("A", 1)),
            ),
            Err(TreeError::DuplicateId(id("B")))
        );
    }

    #[test]
    fn expand_all_opens_every_node() {
        let closed = Tree::new(
            "T1",
            TreeNode::label("A", "a").collapsed().with_children(vec![
                TreeNode::label("B", "b").collapsed().with_children(vec![TreeNode::label("D", "d")]),
                TreeNode::label("C", "c").collapsed(),
            ]),
        );
        let mut engine = SyncEngine::new(closed, FormatConfig::default()).unwrap();
        engine.apply_mutation(TreeMutation::ExpandAll).unwrap();
        assert!(engine.is_text_dirty());
        assert!(engine.tree().iter().all(|node| node.is_expanded));
        assert_eq!(engine.tree().root.children[0].children[0].id, id("D"));
    }
}
