//! Hierarchy Service - Tree Invariant Engine
//!
//! This module provides the business logic layer for one tree instance:
//!
//! - Reads: full nested materialization, single subtree, by level, by parent,
//!   public navigation view, per-level statistics
//! - Writes: create with derived level/type/order, partial update, leaf-only
//!   delete, atomic batch reorder, question counts, publish/unpublish
//!
//! # Invariants Enforced
//!
//! - Level-1 nodes have no parent; every other node's parent is exactly one
//!   level up
//! - `(level, parent_id, order)` stays unique inside a sibling group
//! - Only childless nodes can be deleted
//! - A node can be published only once its parent is published
//! - Unpublishing a node unpublishes its whole subtree (one atomic batch)
//! - `questionCount` lives on the question level only
//! - `type` is always derived from the level, never taken from input
//!
//! # Concurrency
//!
//! The service holds no node state of its own; every call reads the store.
//! Concurrent structural edits to the same sibling group are serialized only
//! by the store and remain racy (a reorder racing a create can still collide).

use crate::db::HierarchyStore;
use crate::models::{
    CreateNodeInput, HierarchyNode, LevelStats, NodeFilter, NodeTree, NodeUpdate,
    NodeWithRelations, ReorderItem, TreeInstanceConfig, ValidationError,
};
use crate::services::error::HierarchyServiceError;
use crate::services::events::{HierarchyChange, HierarchyEvent};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Broadcast channel capacity for hierarchy events.
///
/// Bulk operations (seeding, subtree unpublish) emit one event per call, so a
/// small buffer is enough; slow observers simply lag.
const EVENT_CHANNEL_CAPACITY: usize = 128;

type ServiceResult<T> = Result<T, HierarchyServiceError>;

/// Engine for one tree instance
#[derive(Clone)]
pub struct HierarchyService {
    store: Arc<dyn HierarchyStore>,
    config: &'static TreeInstanceConfig,
    event_tx: broadcast::Sender<HierarchyEvent>,

    /// Optional client identifier copied into emitted events
    client_id: Option<String>,
}

impl std::fmt::Debug for HierarchyService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HierarchyService")
            .field("tree", &self.config.key)
            .field("client_id", &self.client_id)
            .finish()
    }
}

/// Group nodes by parent id, keeping the store's order within each group
fn adjacency(nodes: Vec<HierarchyNode>) -> HashMap<Option<String>, Vec<HierarchyNode>> {
    let mut by_parent: HashMap<Option<String>, Vec<HierarchyNode>> = HashMap::new();
    for node in nodes {
        by_parent.entry(node.parent_id.clone()).or_default().push(node);
    }
    by_parent
}

/// Recursively attach children from the adjacency list, at most `depth` levels deep
fn attach_children(
    node: HierarchyNode,
    by_parent: &mut HashMap<Option<String>, Vec<HierarchyNode>>,
    depth: u8,
) -> NodeTree {
    let children = if depth == 0 {
        Vec::new()
    } else {
        by_parent
            .remove(&Some(node.id.clone()))
            .unwrap_or_default()
            .into_iter()
            .map(|child| Arc::new(attach_children(child, by_parent, depth - 1)))
            .collect()
    };
    NodeTree { node, children }
}

impl HierarchyService {
    /// Create a service for one tree instance on top of `store`
    ///
    /// # Examples
    ///
    /// ```rust
    /// use syllabus_core::db::MemoryStore;
    /// use syllabus_core::models::QUESTION_BANK;
    /// use syllabus_core::services::HierarchyService;
    /// use std::sync::Arc;
    ///
    /// let service = HierarchyService::new(Arc::new(MemoryStore::new()), &QUESTION_BANK);
    /// assert_eq!(service.config().key, "question-bank");
    /// ```
    pub fn new(store: Arc<dyn HierarchyStore>, config: &'static TreeInstanceConfig) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            config,
            event_tx,
            client_id: None,
        }
    }

    pub fn config(&self) -> &'static TreeInstanceConfig {
        self.config
    }

    pub fn store(&self) -> &Arc<dyn HierarchyStore> {
        &self.store
    }

    /// Clone of this service whose events carry `client_id` as their source
    pub fn with_client(&self, client_id: impl Into<String>) -> Self {
        let mut cloned = self.clone();
        cloned.client_id = Some(client_id.into());
        cloned
    }

    /// Subscribe to hierarchy events
    pub fn subscribe_to_events(&self) -> broadcast::Receiver<HierarchyEvent> {
        self.event_tx.subscribe()
    }

    /// Ignores send errors: having no subscriber is normal
    fn emit_event(&self, change: HierarchyChange) {
        let _ = self.event_tx.send(HierarchyEvent {
            tree: self.config.key,
            source_client_id: self.client_id.clone(),
            change,
        });
    }

    async fn require_node(&self, id: &str) -> ServiceResult<HierarchyNode> {
        self.store
            .get_node(id)
            .await
            .map_err(HierarchyServiceError::store)?
            .ok_or_else(|| HierarchyServiceError::node_not_found(id))
    }

    fn label(&self, node: &HierarchyNode) -> String {
        format!("{} '{}'", self.config.type_for_level(node.level), node.name)
    }

    //
    // READS
    //

    /// All level-1 nodes with their complete subtrees, ordered by `order` at
    /// every level
    pub async fn find_all(&self) -> ServiceResult<Vec<NodeTree>> {
        let nodes = self
            .store
            .list_nodes(NodeFilter::default())
            .await
            .map_err(HierarchyServiceError::store)?;
        tracing::debug!(tree = self.config.key, count = nodes.len(), "find_all");

        let mut by_parent = adjacency(nodes);
        let roots = by_parent.remove(&None).unwrap_or_default();
        let depth = self.config.max_level().saturating_sub(1);

        Ok(roots
            .into_iter()
            .filter(|root| root.level == 1)
            .map(|root| attach_children(root, &mut by_parent, depth))
            .collect())
    }

    /// One node with its complete subtree
    pub async fn find_one(&self, id: &str) -> ServiceResult<NodeTree> {
        let node = self.require_node(id).await?;
        let depth = self.config.max_level().saturating_sub(node.level);
        let descendants = self
            .store
            .get_subtree(id, depth)
            .await
            .map_err(HierarchyServiceError::store)?;

        let mut by_parent = adjacency(descendants);
        Ok(attach_children(node, &mut by_parent, depth))
    }

    /// Flat list of one level, each node with its parent and direct children
    pub async fn find_by_level(&self, level: i64) -> ServiceResult<Vec<NodeWithRelations>> {
        let level = self.config.validate_level(level)?;

        let nodes = self
            .store
            .list_nodes(NodeFilter::level(level))
            .await
            .map_err(HierarchyServiceError::store)?;

        let mut parents: HashMap<String, HierarchyNode> = HashMap::new();
        let parent_ids: Vec<String> = nodes
            .iter()
            .filter_map(|node| node.parent_id.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        if !parent_ids.is_empty() {
            let filter = NodeFilter {
                ids: Some(parent_ids),
                ..Default::default()
            };
            for parent in self
                .store
                .list_nodes(filter)
                .await
                .map_err(HierarchyServiceError::store)?
            {
                parents.insert(parent.id.clone(), parent);
            }
        }

        let mut children = if level < self.config.max_level() {
            adjacency(
                self.store
                    .list_nodes(NodeFilter::level(level + 1))
                    .await
                    .map_err(HierarchyServiceError::store)?,
            )
        } else {
            HashMap::new()
        };

        Ok(nodes
            .into_iter()
            .map(|node| NodeWithRelations {
                parent: node
                    .parent_id
                    .as_ref()
                    .and_then(|parent_id| parents.get(parent_id).cloned()),
                children: children.remove(&Some(node.id.clone())).unwrap_or_default(),
                node,
            })
            .collect())
    }

    /// Direct children of `parent_id`, ordered by `order`
    pub async fn find_by_parent(&self, parent_id: &str) -> ServiceResult<Vec<HierarchyNode>> {
        self.store
            .list_nodes(NodeFilter::children_of(parent_id))
            .await
            .map_err(HierarchyServiceError::store)
    }

    /// Public navigation view: published level-1 nodes, each with its
    /// published level-2 children
    pub async fn find_published(&self) -> ServiceResult<Vec<NodeTree>> {
        let roots = self
            .store
            .list_nodes(NodeFilter::siblings(1, None).published(true))
            .await
            .map_err(HierarchyServiceError::store)?;

        let mut trees = Vec::with_capacity(roots.len());
        for root in roots {
            let children = self
                .store
                .list_nodes(NodeFilter::children_of(root.id.clone()).published(true))
                .await
                .map_err(HierarchyServiceError::store)?;
            trees.push(NodeTree::with_children(
                root,
                children.into_iter().map(NodeTree::leaf).collect(),
            ));
        }
        Ok(trees)
    }

    /// Node count and question total per level, labelled with the level type
    pub async fn get_hierarchy_stats(&self) -> ServiceResult<Vec<LevelStats>> {
        let aggregates = self
            .store
            .level_stats()
            .await
            .map_err(HierarchyServiceError::store)?;

        Ok(aggregates
            .into_iter()
            .map(|aggregate| LevelStats {
                level: aggregate.level,
                node_type: self.config.type_for_level(aggregate.level).to_string(),
                count: aggregate.count,
                total_questions: aggregate.total_questions,
            })
            .collect())
    }

    //
    // WRITES
    //

    /// Create a node.
    ///
    /// `type`, `order` and `isPublished` from the input are ignored: the type
    /// comes from the level, the order is `max(sibling order) + 1` and new
    /// nodes start unpublished.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument`: empty name, level out of range, negative
    ///   question count, missing parent for a non-root level
    /// - `NotFound`: `parent_id` given but missing
    /// - `InvalidState`: parent level is not exactly one above
    pub async fn create(&self, input: CreateNodeInput) -> ServiceResult<HierarchyNode> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(HierarchyServiceError::missing_field("name"));
        }
        let level = self.config.validate_level(input.level)?;

        let question_count = match input.question_count {
            Some(count) if count < 0 => {
                return Err(HierarchyServiceError::negative_value("questionCount", count))
            }
            Some(count) if level == self.config.question_level() => count,
            Some(count) => {
                tracing::debug!(
                    tree = self.config.key,
                    level,
                    count,
                    "Ignoring questionCount outside the question level"
                );
                0
            }
            None => 0,
        };

        match (&input.parent_id, self.config.expected_parent_level(level)) {
            (None, None) => {}
            (None, Some(_)) => {
                return Err(HierarchyServiceError::missing_field(format!(
                    "parentId (level {} {} requires a parent)",
                    level,
                    self.config.type_for_level(level)
                )));
            }
            (Some(parent_id), expected) => {
                let parent = self.require_node(parent_id).await?;
                if Some(parent.level) != expected {
                    tracing::warn!(
                        tree = self.config.key,
                        parent_id = %parent.id,
                        parent_level = parent.level,
                        level,
                        "Rejected create: parent level mismatch"
                    );
                    return Err(HierarchyServiceError::invalid_state(format!(
                        "A level {} {} needs a level {} parent, but {} is level {}",
                        level,
                        self.config.type_for_level(level),
                        level.saturating_sub(1),
                        self.label(&parent),
                        parent.level
                    )));
                }
            }
        }

        let max_order = self
            .store
            .max_sibling_order(level, input.parent_id.as_deref())
            .await
            .map_err(HierarchyServiceError::store)?;

        let mut node = HierarchyNode::new(
            name.to_string(),
            level,
            self.config.type_for_level(level),
            input.parent_id,
            max_order.unwrap_or(0) + 1,
        );
        node.color = input.color;
        node.question_count = question_count;

        let created = self
            .store
            .create_node(node)
            .await
            .map_err(HierarchyServiceError::store)?;

        tracing::info!(
            tree = self.config.key,
            id = %created.id,
            level = created.level,
            order = created.order,
            "Created node"
        );
        self.emit_event(HierarchyChange::NodeCreated {
            node: created.clone(),
        });
        Ok(created)
    }

    /// Partial update of `name`, `color`, `order` and `questionCount`.
    ///
    /// Level, parent and type cannot change through this call; any publish
    /// flag in `update` is ignored.
    pub async fn update(&self, id: &str, update: NodeUpdate) -> ServiceResult<HierarchyNode> {
        let existing = self.require_node(id).await?;

        let mut sanitized = NodeUpdate {
            is_published: None,
            ..update
        };

        if let Some(name) = &sanitized.name {
            let trimmed = name.trim();
            if trimmed.is_empty() {
                return Err(HierarchyServiceError::missing_field("name"));
            }
            sanitized.name = Some(trimmed.to_string());
        }

        if let Some(count) = sanitized.question_count {
            if count < 0 {
                return Err(HierarchyServiceError::negative_value("questionCount", count));
            }
            self.ensure_question_level(&existing)?;
        }

        if let Some(order) = sanitized.order {
            if order < 0 {
                return Err(HierarchyServiceError::negative_value("order", order));
            }
            if order != existing.order {
                let siblings = self
                    .store
                    .list_nodes(NodeFilter::siblings(
                        existing.level,
                        existing.parent_id.as_deref(),
                    ))
                    .await
                    .map_err(HierarchyServiceError::store)?;
                if let Some(holder) = siblings
                    .iter()
                    .find(|sibling| {
                        sibling.id != existing.id
                            && sibling.is_sibling_of(&existing)
                            && sibling.order == order
                    })
                {
                    return Err(HierarchyServiceError::invalid_state(format!(
                        "Order {} is already used by sibling {}",
                        order,
                        self.label(holder)
                    )));
                }
            }
        }

        if sanitized.is_empty() {
            return Ok(existing);
        }

        let updated = self
            .store
            .update_node(id, sanitized)
            .await
            .map_err(HierarchyServiceError::store)?;

        tracing::debug!(tree = self.config.key, id, "Updated node");
        self.emit_event(HierarchyChange::NodeUpdated {
            node: updated.clone(),
        });
        Ok(updated)
    }

    /// Delete a childless node, returning what was removed
    pub async fn delete(&self, id: &str) -> ServiceResult<HierarchyNode> {
        let existing = self.require_node(id).await?;

        let child_count = self
            .store
            .count_children(id)
            .await
            .map_err(HierarchyServiceError::store)?;
        if child_count > 0 {
            tracing::warn!(
                tree = self.config.key,
                id,
                child_count,
                "Rejected delete of non-leaf node"
            );
            return Err(HierarchyServiceError::invalid_state(format!(
                "Cannot delete {}: it still has {} child node(s)",
                self.label(&existing),
                child_count
            )));
        }

        self.store
            .delete_node(id)
            .await
            .map_err(HierarchyServiceError::store)?;

        tracing::info!(tree = self.config.key, id, "Deleted node");
        self.emit_event(HierarchyChange::NodeDeleted { id: id.to_string() });
        Ok(existing)
    }

    /// Apply `(id, order)` assignments as one atomic batch.
    ///
    /// Every id must exist and appear once, and the resulting orders must stay
    /// unique inside each affected sibling group. Contiguity is not required.
    pub async fn reorder(&self, items: Vec<ReorderItem>) -> ServiceResult<Vec<HierarchyNode>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let mut seen = HashSet::new();
        for item in &items {
            if !seen.insert(item.id.as_str()) {
                return Err(ValidationError::DuplicateId(item.id.clone()).into());
            }
            if item.order < 0 {
                return Err(HierarchyServiceError::negative_value("order", item.order));
            }
        }

        let mut groups: HashMap<(u8, Option<String>), HashMap<String, i64>> = HashMap::new();
        for item in &items {
            let node = self.require_node(&item.id).await?;
            groups
                .entry((node.level, node.parent_id))
                .or_default()
                .insert(item.id.clone(), item.order);
        }

        for ((level, parent_id), assigned) in &groups {
            let siblings = self
                .store
                .list_nodes(NodeFilter::siblings(*level, parent_id.as_deref()))
                .await
                .map_err(HierarchyServiceError::store)?;

            let mut used: HashMap<i64, &str> = HashMap::new();
            for sibling in &siblings {
                let order = assigned.get(&sibling.id).copied().unwrap_or(sibling.order);
                if let Some(other) = used.insert(order, sibling.id.as_str()) {
                    return Err(HierarchyServiceError::invalid_state(format!(
                        "Reorder would give nodes {} and {} the same order {}",
                        other, sibling.id, order
                    )));
                }
            }
        }

        let updated = self
            .store
            .apply_batch(
                items
                    .iter()
                    .map(|item| (item.id.clone(), NodeUpdate::order(item.order)))
                    .collect(),
            )
            .await
            .map_err(HierarchyServiceError::store)?;

        tracing::info!(
            tree = self.config.key,
            count = items.len(),
            groups = groups.len(),
            "Reordered siblings"
        );
        self.emit_event(HierarchyChange::SiblingsReordered { items });
        Ok(updated)
    }

    fn ensure_question_level(&self, node: &HierarchyNode) -> ServiceResult<()> {
        if node.level != self.config.question_level() {
            return Err(HierarchyServiceError::invalid_state(format!(
                "questionCount can only be set on level {} ({}) nodes, {} is level {}",
                self.config.question_level(),
                self.config.type_for_level(self.config.question_level()),
                self.label(node),
                node.level
            )));
        }
        Ok(())
    }

    /// Set `questionCount` on a question-level node
    pub async fn update_question_count(&self, id: &str, count: i64) -> ServiceResult<HierarchyNode> {
        if count < 0 {
            return Err(HierarchyServiceError::negative_value("questionCount", count));
        }
        let existing = self.require_node(id).await?;
        self.ensure_question_level(&existing)?;

        let updated = self
            .store
            .update_node(
                id,
                NodeUpdate {
                    question_count: Some(count),
                    ..Default::default()
                },
            )
            .await
            .map_err(HierarchyServiceError::store)?;

        self.emit_event(HierarchyChange::NodeUpdated {
            node: updated.clone(),
        });
        Ok(updated)
    }

    /// Publish one node. Requires a published parent; does not cascade.
    pub async fn publish(&self, id: &str) -> ServiceResult<HierarchyNode> {
        let existing = self.require_node(id).await?;

        if let (Some(parent_id), true) = (&existing.parent_id, existing.level > 1) {
            let parent = self.store.get_node(parent_id).await.map_err(HierarchyServiceError::store)?;
            let parent_published = parent.as_ref().map(|p| p.is_published).unwrap_or(false);
            if !parent_published {
                tracing::warn!(
                    tree = self.config.key,
                    id,
                    parent_id = %parent_id,
                    "Rejected publish: parent is not published"
                );
                let parent_label = parent
                    .as_ref()
                    .map(|p| self.label(p))
                    .unwrap_or_else(|| format!("parent {}", parent_id));
                return Err(HierarchyServiceError::invalid_state(format!(
                    "Cannot publish {} before its parent {} is published",
                    self.label(&existing),
                    parent_label
                )));
            }
        }

        if existing.is_published {
            return Ok(existing);
        }

        let updated = self
            .store
            .update_node(id, NodeUpdate::published(true))
            .await
            .map_err(HierarchyServiceError::store)?;

        tracing::info!(tree = self.config.key, id, "Published node");
        self.emit_event(HierarchyChange::PublishStateChanged {
            ids: vec![id.to_string()],
            is_published: true,
        });
        Ok(updated)
    }

    /// Unpublish a node and every descendant, atomically
    pub async fn unpublish(&self, id: &str) -> ServiceResult<HierarchyNode> {
        let existing = self.require_node(id).await?;
        let depth = self.config.max_level().saturating_sub(existing.level);

        let descendants = self
            .store
            .get_subtree(id, depth)
            .await
            .map_err(HierarchyServiceError::store)?;

        let ids: Vec<String> = std::iter::once(existing.id.clone())
            .chain(descendants.into_iter().map(|node| node.id))
            .collect();

        let mut updated = self
            .store
            .apply_batch(
                ids.iter()
                    .map(|node_id| (node_id.clone(), NodeUpdate::published(false)))
                    .collect(),
            )
            .await
            .map_err(HierarchyServiceError::store)?;

        if updated.is_empty() {
            return Err(HierarchyServiceError::node_not_found(id));
        }

        tracing::info!(
            tree = self.config.key,
            id,
            cascaded = ids.len() - 1,
            "Unpublished subtree"
        );
        self.emit_event(HierarchyChange::PublishStateChanged {
            ids,
            is_published: false,
        });

        Ok(updated.swap_remove(0))
    }
}
