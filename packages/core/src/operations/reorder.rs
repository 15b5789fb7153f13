//! Client-side sibling reorder planning
//!
//! Given the nested snapshot returned by `HierarchyService::find_all`, a
//! dragged item (`active_id`) and the item it was dropped on (`over_id`),
//! `plan_reorder` computes:
//!
//! - the new snapshot, for immediate optimistic display
//! - the `(id, order)` list to hand to `HierarchyService::reorder`
//!
//! # Copy-on-write
//!
//! The snapshot is a forest of `Arc<NodeTree>`. Only the nodes on the path
//! from the root to the parent of the affected sibling group are cloned;
//! every other branch of the new snapshot is the very same `Arc` as in the
//! old one, so concurrent readers of the old snapshot are never disturbed.

use crate::models::{NodeTree, ReorderItem};
use crate::operations::ReorderError;
use std::sync::Arc;

/// Nested snapshot of a tree instance, roots first
pub type Forest = Vec<Arc<NodeTree>>;

/// Result of planning a move
#[derive(Debug, Clone, PartialEq)]
pub struct ReorderPlan {
    /// Snapshot with the move applied
    pub tree: Forest,

    /// Every sibling of the affected group with its new dense order
    /// (empty when the move is a no-op)
    pub siblings: Vec<ReorderItem>,
}

impl ReorderPlan {
    pub fn is_noop(&self) -> bool {
        self.siblings.is_empty()
    }
}

/// Wrap an owned `find_all` result as a shareable snapshot
pub fn into_forest(trees: Vec<NodeTree>) -> Forest {
    trees.into_iter().map(Arc::new).collect()
}

/// Move one element from `from` to `to`, shifting the others
///
/// Standard remove-then-insert semantics: `[A, B, C, D]` with `from = 0`,
/// `to = 2` gives `[B, C, A, D]`. Out-of-range indexes leave `items` unchanged.
pub fn array_move<T>(mut items: Vec<T>, from: usize, to: usize) -> Vec<T> {
    if from >= items.len() || to >= items.len() || from == to {
        return items;
    }
    let item = items.remove(from);
    items.insert(to, item);
    items
}

/// Where an item sits: index path to its parent (empty for roots) and its
/// index inside the parent's children
fn locate(nodes: &[Arc<NodeTree>], id: &str, path: &mut Vec<usize>) -> Option<usize> {
    if let Some(index) = nodes.iter().position(|tree| tree.node.id == id) {
        return Some(index);
    }
    for (index, tree) in nodes.iter().enumerate() {
        path.push(index);
        if let Some(found) = locate(&tree.children, id, path) {
            return Some(found);
        }
        path.pop();
    }
    None
}

fn siblings_at<'a>(forest: &'a [Arc<NodeTree>], path: &[usize]) -> &'a [Arc<NodeTree>] {
    path.iter()
        .fold(forest, |nodes, &index| nodes[index].children.as_slice())
}

/// Rebuild `nodes` with the sibling array at `path` replaced, cloning only
/// the nodes along `path`
fn replace_siblings(nodes: &[Arc<NodeTree>], path: &[usize], siblings: Forest) -> Forest {
    let Some((&index, rest)) = path.split_first() else {
        return siblings;
    };
    let mut rebuilt = nodes.to_vec();
    let parent = &nodes[index];
    rebuilt[index] = Arc::new(NodeTree {
        node: parent.node.clone(),
        children: replace_siblings(&parent.children, rest, siblings),
    });
    rebuilt
}

/// Plan moving `active_id` to the position of `over_id`
///
/// # Errors
///
/// - `ItemNotFound` if either id is missing from `forest`
/// - `CrossBranch` if the two items are not siblings
///
/// # Examples
///
/// ```rust,no_run
/// use syllabus_core::operations::{into_forest, plan_reorder};
/// # async fn example(service: syllabus_core::services::HierarchyService) -> anyhow::Result<()> {
/// let snapshot = into_forest(service.find_all().await?);
/// let plan = plan_reorder(&snapshot, "active-id", "over-id")?;
/// // render plan.tree right away, then persist
/// service.reorder(plan.siblings).await?;
/// # Ok(())
/// # }
/// ```
pub fn plan_reorder(
    forest: &[Arc<NodeTree>],
    active_id: &str,
    over_id: &str,
) -> Result<ReorderPlan, ReorderError> {
    let mut active_path = Vec::new();
    let active_index = locate(forest, active_id, &mut active_path)
        .ok_or_else(|| ReorderError::item_not_found(active_id.to_string()))?;

    let mut over_path = Vec::new();
    let over_index = locate(forest, over_id, &mut over_path)
        .ok_or_else(|| ReorderError::item_not_found(over_id.to_string()))?;

    if active_path != over_path {
        tracing::debug!(active_id, over_id, "Rejected cross-branch reorder");
        return Err(ReorderError::cross_branch(
            active_id.to_string(),
            over_id.to_string(),
        ));
    }

    if active_index == over_index {
        return Ok(ReorderPlan {
            tree: forest.to_vec(),
            siblings: Vec::new(),
        });
    }

    let moved = array_move(
        siblings_at(forest, &active_path).to_vec(),
        active_index,
        over_index,
    );

    let mut items = Vec::with_capacity(moved.len());
    let renumbered: Forest = moved
        .into_iter()
        .enumerate()
        .map(|(position, tree)| {
            let order = position as i64 + 1;
            items.push(ReorderItem::new(tree.node.id.clone(), order));
            if tree.node.order == order {
                tree
            } else {
                let mut node = tree.node.clone();
                node.order = order;
                Arc::new(NodeTree {
                    node,
                    children: tree.children.clone(),
                })
            }
        })
        .collect();

    Ok(ReorderPlan {
        tree: replace_siblings(forest, &active_path, renumbered),
        siblings: items,
    })
}
