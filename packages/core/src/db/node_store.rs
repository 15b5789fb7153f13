//! HierarchyStore Trait - Repository Abstraction
//!
//! This module defines the `HierarchyStore` trait: the persistence primitives the
//! hierarchy engine needs, and nothing more. One store instance backs exactly one
//! tree instance (one collection/table).
//!
//! # Design Decisions
//!
//! 1. **Async-First**: All methods are async so embedded (libsql) and in-memory
//!    backends share one interface
//! 2. **Ownership Semantics**: Methods take ownership of values they persist
//! 3. **Error Handling**: Uses `anyhow::Result`; the engine maps store failures
//!    into its own error taxonomy
//! 4. **Unit of Work**: `apply_batch` is the only multi-write primitive and must
//!    be all-or-nothing
//!
//! # Examples
//!
//! ```rust,no_run
//! use syllabus_core::db::{HierarchyStore, MemoryStore};
//! use syllabus_core::models::{HierarchyNode, NodeFilter};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = MemoryStore::new();
//! let root = HierarchyNode::new("2024".to_string(), 1, "Year", None, 1);
//! store.create_node(root).await?;
//!
//! let roots = store.list_nodes(NodeFilter::siblings(1, None)).await?;
//! assert_eq!(roots.len(), 1);
//! # Ok(())
//! # }
//! ```

use crate::models::{HierarchyNode, LevelAggregate, NodeFilter, NodeUpdate};
use anyhow::Result;
use async_trait::async_trait;

/// Persistence operations for one tree instance
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so the engine can be shared across
/// request handlers behind an `Arc`.
#[async_trait]
pub trait HierarchyStore: Send + Sync {
    //
    // CORE CRUD OPERATIONS
    //

    /// Insert a node. Fails if the id already exists.
    async fn create_node(&self, node: HierarchyNode) -> Result<HierarchyNode>;

    /// Point lookup; `Ok(None)` when the node does not exist
    async fn get_node(&self, id: &str) -> Result<Option<HierarchyNode>>;

    /// Sparse update of one node, returning the full updated node.
    /// Fails if the node does not exist.
    async fn update_node(&self, id: &str, update: NodeUpdate) -> Result<HierarchyNode>;

    /// Physically remove one node (no cascade)
    async fn delete_node(&self, id: &str) -> Result<()>;

    //
    // QUERYING
    //

    /// List nodes matching `filter`, sorted by `order` then creation time
    async fn list_nodes(&self, filter: NodeFilter) -> Result<Vec<HierarchyNode>>;

    /// Highest `order` in a sibling group, `None` if the group is empty
    async fn max_sibling_order(&self, level: u8, parent_id: Option<&str>) -> Result<Option<i64>>;

    /// Number of direct children of `id`
    async fn count_children(&self, id: &str) -> Result<usize>;

    /// Node count and `questionCount` sum grouped by level, ascending
    async fn level_stats(&self) -> Result<Vec<LevelAggregate>>;

    //
    // UNIT OF WORK
    //

    /// Apply several sparse updates atomically.
    ///
    /// Either every update is applied or none is. Returns the updated nodes in
    /// input order.
    async fn apply_batch(&self, updates: Vec<(String, NodeUpdate)>) -> Result<Vec<HierarchyNode>>;

    //
    // PROVIDED OPERATIONS
    //

    /// All descendants of `root_id` down to `depth` levels below it,
    /// excluding the root itself.
    ///
    /// Walks one level at a time (breadth-first) instead of building a nested
    /// include of fixed depth, so the bound is a plain parameter.
    async fn get_subtree(&self, root_id: &str, depth: u8) -> Result<Vec<HierarchyNode>> {
        let mut descendants = Vec::new();
        let mut frontier = vec![root_id.to_string()];

        for _ in 0..depth {
            if frontier.is_empty() {
                break;
            }
            let mut next = Vec::new();
            for parent_id in frontier {
                let children = self.list_nodes(NodeFilter::children_of(parent_id)).await?;
                next.extend(children.iter().map(|child| child.id.clone()));
                descendants.extend(children);
            }
            frontier = next;
        }

        Ok(descendants)
    }
}
