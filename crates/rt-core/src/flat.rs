//! Flattened, id-indexed form of the canonical tree.
//!
//! The interactive widget addresses rows by id and drag positions by
//! `(parent id, ordinal)`, so it works on a `FlatTree`: a map from id to
//! `FlatItem` holding child *ids* rather than owned nodes.
//!
//! A synthetic sentinel item (see `NodeId::sentinel`) is the flat tree's
//! root and the real root is its only child. The sentinel exists only
//! between `flatten` and `unflatten`.
//!
//! `parent_id` is a denormalised back-reference. It is never patched
//! incrementally: every operator that changes `child_ids` calls
//! `FlatTree::reindex`, which recomputes all of them from scratch.

use crate::error::{TreeError, TreeResult};
use crate::id::NodeId;
use crate::model::{Payload, Tree, TreeNode};
use petgraph::Direction;
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use smallvec::{SmallVec, smallvec};
use std::collections::{HashMap, HashSet};

/// One row of the flattened tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatItem {
    pub id: NodeId,
    /// Ordered child ids. References only; the items live in `FlatTree::items`.
    pub child_ids: SmallVec<[NodeId; 4]>,
    /// Derived from `child_ids`; kept in step by `reindex`.
    pub has_children: bool,
    pub is_expanded: bool,
    /// `None` only for the sentinel.
    pub payload: Option<Payload>,
    /// Owning item, `None` only for the sentinel.
    pub parent_id: Option<NodeId>,
}

/// Id-indexed tree rooted at the sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatTree {
    pub root_id: NodeId,
    pub items: HashMap<NodeId, FlatItem>,
}

/// Options for `flatten_with`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlattenConfig {
    /// Start every item expanded, ignoring the canonical flags.
    pub expand_all: bool,
}

// ─── Canonical → flat ────────────────────────────────────────────────────

/// Flatten a canonical tree, preserving expansion flags.
pub fn flatten(tree: &Tree) -> FlatTree {
    flatten_with(tree, &FlattenConfig::default())
}

/// Flatten with options.
///
/// `tree` must already be canonical (`parse_tree` or `check_tree`). Ids are
/// map keys, so a repeated id would silently merge two nodes.
pub fn flatten_with(tree: &Tree, config: &FlattenConfig) -> FlatTree {
    let sentinel = NodeId::sentinel();
    let mut items = HashMap::new();
    items.insert(
        sentinel,
        FlatItem {
            id: sentinel,
            child_ids: smallvec![tree.root.id],
            has_children: true,
            is_expanded: true,
            payload: None,
            parent_id: None,
        },
    );

    // Top-down walk: the parent of every node is known when it is popped.
    let mut stack: Vec<(&TreeNode, NodeId)> = vec![(&tree.root, sentinel)];
    while let Some((node, parent)) = stack.pop() {
        let item = FlatItem {
            id: node.id,
            child_ids: node.children.iter().map(|c| c.id).collect(),
            has_children: node.has_children(),
            is_expanded: config.expand_all || node.is_expanded,
            payload: Some(node.payload.clone()),
            parent_id: Some(parent),
        };
        let replaced = items.insert(node.id, item).is_some();
        debug_assert!(!replaced, "flatten: duplicate id `{}` in unchecked tree", node.id);
        if replaced {
            log::warn!("flatten: duplicate id `{}` in tree `{}`", node.id, tree.id);
        }
        stack.extend(node.children.iter().map(|child| (child, node.id)));
    }

    FlatTree {
        root_id: sentinel,
        items,
    }
}

// ─── Flat → canonical ────────────────────────────────────────────────────

/// Rebuild the canonical tree below the sentinel. `parent_id` and the
/// sentinel itself are discarded.
///
/// # Errors
/// `TreeError::Structure` when the flat tree cannot describe a single
/// rooted tree: missing sentinel, a sentinel without exactly one child,
/// a dangling child id, a payload-less item, or an id reached twice.
pub fn unflatten(flat: &FlatTree, tree_id: NodeId) -> TreeResult<Tree> {
    let root_id = flat.real_root()?;
    let mut visited = HashSet::with_capacity(flat.items.len());
    let root = build_node(flat, root_id, &mut visited)?;
    Ok(Tree { id: tree_id, root })
}

fn build_node(flat: &FlatTree, id: NodeId, visited: &mut HashSet<NodeId>) -> TreeResult<TreeNode> {
    if !visited.insert(id) {
        return Err(TreeError::Structure(format!(
            "item `{id}` is reachable more than once"
        )));
    }
    let item = flat
        .items
        .get(&id)
        .ok_or_else(|| TreeError::Structure(format!("child id `{id}` has no item")))?;
    let payload = item
        .payload
        .clone()
        .ok_or_else(|| TreeError::Structure(format!("item `{id}` has no payload")))?;
    let children = item
        .child_ids
        .iter()
        .map(|&child| build_node(flat, child, visited))
        .collect::<TreeResult<Vec<_>>>()?;

    Ok(TreeNode {
        id,
        payload,
        is_expanded: item.is_expanded,
        children,
    })
}

// ─── FlatTree ────────────────────────────────────────────────────────────

impl FlatTree {
    pub fn get(&self, id: NodeId) -> Option<&FlatItem> {
        self.items.get(&id)
    }

    /// Number of items, sentinel included.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Id of the real root: the sentinel's only child.
    pub fn real_root(&self) -> TreeResult<NodeId> {
        let sentinel = self.items.get(&self.root_id).ok_or_else(|| {
            TreeError::Structure(format!("root item `{}` is missing", self.root_id))
        })?;
        match sentinel.child_ids.as_slice() {
            [only] => Ok(*only),
            other => Err(TreeError::Structure(format!(
                "sentinel must own exactly one item, found {}",
                other.len()
            ))),
        }
    }

    /// Recompute every `parent_id` and `has_children` from `child_ids`.
    pub fn reindex(&mut self) {
        let mut owners: HashMap<NodeId, NodeId> = HashMap::with_capacity(self.items.len());
        for item in self.items.values() {
            for &child in &item.child_ids {
                owners.insert(child, item.id);
            }
        }
        for item in self.items.values_mut() {
            item.parent_id = owners.get(&item.id).copied();
            item.has_children = !item.child_ids.is_empty();
        }
        log::trace!("reindex: {} items, {} owned", self.items.len(), owners.len());
    }

    /// True when `id` lies strictly below `ancestor`. Follows `child_ids`,
    /// so it does not depend on the back-references being current.
    pub fn is_descendant_of(&self, id: NodeId, ancestor: NodeId) -> bool {
        let Some(start) = self.items.get(&ancestor) else {
            return false;
        };
        let mut seen = HashSet::new();
        let mut stack: Vec<NodeId> = start.child_ids.to_vec();
        while let Some(current) = stack.pop() {
            if current == id {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            if let Some(item) = self.items.get(&current) {
                stack.extend(item.child_ids.iter().copied());
            }
        }
        false
    }

    /// Verify the flat-tree invariants:
    /// - every key matches its item's id and every child id is a key;
    /// - the child links form an acyclic graph in which each item except the
    ///   root has exactly one owner, and every item is reachable from the root;
    /// - `parent_id` names the owner and `has_children` matches `child_ids`.
    pub fn check_consistency(&self) -> TreeResult<()> {
        let mut graph: DiGraph<NodeId, ()> = DiGraph::with_capacity(self.items.len(), self.items.len());
        let index: HashMap<NodeId, NodeIndex> = self
            .items
            .keys()
            .map(|&id| (id, graph.add_node(id)))
            .collect();

        for (key, item) in &self.items {
            if *key != item.id {
                return Err(TreeError::Structure(format!(
                    "key `{key}` holds item `{}`",
                    item.id
                )));
            }
            if item.has_children == item.child_ids.is_empty() {
                return Err(TreeError::Structure(format!(
                    "item `{key}` has a stale `has_children` flag"
                )));
            }
            for child in &item.child_ids {
                let Some(&to) = index.get(child) else {
                    return Err(TreeError::Structure(format!(
                        "item `{key}` lists unknown child `{child}`"
                    )));
                };
                graph.add_edge(index[key], to, ());
                let recorded = self.items[child].parent_id;
                if recorded != Some(*key) {
                    return Err(TreeError::Structure(format!(
                        "item `{child}` is owned by `{key}` but records parent {recorded:?}"
                    )));
                }
            }
        }

        if is_cyclic_directed(&graph) {
            return Err(TreeError::Structure("child links contain a cycle".into()));
        }

        let Some(&root) = index.get(&self.root_id) else {
            return Err(TreeError::Structure(format!(
                "root item `{}` is missing",
                self.root_id
            )));
        };
        for (id, &idx) in &index {
            let owners = graph.neighbors_directed(idx, Direction::Incoming).count();
            let expected = usize::from(idx != root);
            if owners != expected {
                return Err(TreeError::Structure(format!(
                    "item `{id}` has {owners} owners, expected {expected}"
                )));
            }
        }
        if self.items[&self.root_id].parent_id.is_some() {
            return Err(TreeError::Structure("root item records a parent".into()));
        }

        let mut dfs = Dfs::new(&graph, root);
        let mut reached = 0;
        while dfs.next(&graph).is_some() {
            reached += 1;
        }
        if reached != self.items.len() {
            return Err(TreeError::Structure(format!(
                "{} items are unreachable from the root",
                self.items.len() - reached
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Condition, Operator};
    use pretty_assertions::assert_eq;

    fn sample() -> Tree {
        Tree::new(
            "T1",
            TreeNode::rule("A", "Default Rule - Do Nothing", vec![]).with_children(vec![
                TreeNode::rule(
                    "B",
                    "When In Designated Area I - Apply Rule A",
                    vec![Condition::new("Area", Operator::In, &["Designated Area I"])],
                )
                .with_children(vec![TreeNode::rule("D", "Apply Rule C", vec![]).collapsed()]),
                TreeNode::rule("C", "When In Designated Area II - Apply Rule B", vec![]),
            ]),
        )
    }

    fn id(s: &str) -> NodeId {
        NodeId::intern(s)
    }

    #[test]
    fn flatten_inserts_sentinel_above_root() {
        let flat = flatten(&sample());
        assert_eq!(flat.len(), 5);
        assert_eq!(flat.root_id, NodeId::sentinel());
        assert_eq!(flat.real_root().unwrap(), id("A"));

        let sentinel = flat.get(NodeId::sentinel()).unwrap();
        assert_eq!(sentinel.parent_id, None);
        assert_eq!(sentinel.payload, None);

        let root = flat.get(id("A")).unwrap();
        assert_eq!(root.parent_id, Some(NodeId::sentinel()));
        assert_eq!(root.child_ids.to_vec(), vec![id("B"), id("C")]);
        assert!(root.has_children);
    }

    #[test]
    fn flatten_records_parents_and_flags() {
        let flat = flatten(&sample());
        let d = flat.get(id("D")).unwrap();
        assert_eq!(d.parent_id, Some(id("B")));
        assert!(!d.is_expanded);
        assert!(!d.has_children);
        flat.check_consistency().unwrap();
    }

    #[test]
    fn flatten_with_expand_all_opens_everything() {
        let flat = flatten_with(&sample(), &FlattenConfig { expand_all: true });
        assert!(flat.items.values().all(|item| item.is_expanded));
    }

    #[test]
    fn unflatten_inverts_flatten() {
        let tree = sample();
        assert_eq!(unflatten(&flatten(&tree), tree.id).unwrap(), tree);
    }

    #[test]
    fn unflatten_rejects_dangling_child() {
        let mut flat = flatten(&sample());
        flat.items.get_mut(&id("C")).unwrap().child_ids.push(id("ghost"));
        assert!(matches!(
            unflatten(&flat, id("T1")),
            Err(TreeError::Structure(_))
        ));
    }

    #[test]
    fn unflatten_rejects_two_roots() {
        let mut flat = flatten(&sample());
        flat.items
            .get_mut(&NodeId::sentinel())
            .unwrap()
            .child_ids
            .push(id("C"));
        assert!(matches!(
            unflatten(&flat, id("T1")),
            Err(TreeError::Structure(_))
        ));
    }

    #[test]
    fn reindex_recomputes_back_references() {
        let mut flat = flatten(&sample());
        // Move D under C by hand, leaving parent ids stale.
        flat.items.get_mut(&id("B")).unwrap().child_ids.clear();
        flat.items.get_mut(&id("C")).unwrap().child_ids.push(id("D"));
        assert!(flat.check_consistency().is_err());

        flat.reindex();
        assert_eq!(flat.get(id("D")).unwrap().parent_id, Some(id("C")));
        assert!(!flat.get(id("B")).unwrap().has_children);
        assert!(flat.get(id("C")).unwrap().has_children);
        flat.check_consistency().unwrap();
    }

    #[test]
    fn consistency_detects_cycle() {
        let mut flat = flatten(&sample());
        // D adopts its grandparent B: B -> D -> B.
        flat.items.get_mut(&id("A")).unwrap().child_ids.retain(|c| *c != id("B"));
        flat.items.get_mut(&id("D")).unwrap().child_ids.push(id("B"));
        flat.reindex();
        assert!(matches!(
            flat.check_consistency(),
            Err(TreeError::Structure(_))
        ));
    }

    #[test]
    fn descendant_query_follows_child_links() {
        let flat = flatten(&sample());
        assert!(flat.is_descendant_of(id("D"), id("A")));
        assert!(flat.is_descendant_of(id("D"), id("B")));
        assert!(!flat.is_descendant_of(id("B"), id("D")));
        assert!(!flat.is_descendant_of(id("B"), id("B")));
        assert!(!flat.is_descendant_of(id("C"), id("B")));
    }
}
