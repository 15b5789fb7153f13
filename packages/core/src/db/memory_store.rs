//! MemoryStore - In-Process HierarchyStore
//!
//! Keeps one tree instance in a `HashMap` behind a `tokio::sync::RwLock`.
//! Used by tests, by the in-memory service bundle and as the reference
//! behaviour the libsql adapter must match.

use crate::db::node_store::HierarchyStore;
use crate::models::{sort_by_order, HierarchyNode, LevelAggregate, NodeFilter, NodeUpdate};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemoryStore {
    nodes: RwLock<HashMap<String, HierarchyNode>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored nodes
    pub async fn len(&self) -> usize {
        self.nodes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.nodes.read().await.is_empty()
    }
}

#[async_trait]
impl HierarchyStore for MemoryStore {
    async fn create_node(&self, node: HierarchyNode) -> Result<HierarchyNode> {
        let mut nodes = self.nodes.write().await;
        if nodes.contains_key(&node.id) {
            bail!("Node already exists: {}", node.id);
        }
        nodes.insert(node.id.clone(), node.clone());
        Ok(node)
    }

    async fn get_node(&self, id: &str) -> Result<Option<HierarchyNode>> {
        Ok(self.nodes.read().await.get(id).cloned())
    }

    async fn update_node(&self, id: &str, update: NodeUpdate) -> Result<HierarchyNode> {
        let mut nodes = self.nodes.write().await;
        let node = nodes
            .get_mut(id)
            .ok_or_else(|| anyhow!("Node not found: {}", id))?;
        node.apply_update(&update);
        Ok(node.clone())
    }

    async fn delete_node(&self, id: &str) -> Result<()> {
        self.nodes.write().await.remove(id);
        Ok(())
    }

    async fn list_nodes(&self, filter: NodeFilter) -> Result<Vec<HierarchyNode>> {
        let nodes = self.nodes.read().await;
        let mut matching: Vec<HierarchyNode> = nodes
            .values()
            .filter(|node| filter.matches(node))
            .cloned()
            .collect();
        sort_by_order(&mut matching);
        Ok(matching)
    }

    async fn max_sibling_order(&self, level: u8, parent_id: Option<&str>) -> Result<Option<i64>> {
        let filter = NodeFilter::siblings(level, parent_id);
        Ok(self
            .nodes
            .read()
            .await
            .values()
            .filter(|node| filter.matches(node))
            .map(|node| node.order)
            .max())
    }

    async fn count_children(&self, id: &str) -> Result<usize> {
        Ok(self
            .nodes
            .read()
            .await
            .values()
            .filter(|node| node.parent_id.as_deref() == Some(id))
            .count())
    }

    async fn level_stats(&self) -> Result<Vec<LevelAggregate>> {
        let nodes = self.nodes.read().await;
        let mut by_level: BTreeMap<u8, LevelAggregate> = BTreeMap::new();
        for node in nodes.values() {
            let entry = by_level.entry(node.level).or_insert(LevelAggregate {
                level: node.level,
                count: 0,
                total_questions: 0,
            });
            entry.count += 1;
            entry.total_questions += node.question_count;
        }
        Ok(by_level.into_values().collect())
    }

    async fn apply_batch(&self, updates: Vec<(String, NodeUpdate)>) -> Result<Vec<HierarchyNode>> {
        let mut nodes = self.nodes.write().await;

        // Validate the whole batch before touching anything
        if let Some((missing, _)) = updates.iter().find(|(id, _)| !nodes.contains_key(id)) {
            bail!("Batch aborted, node not found: {}", missing);
        }

        let mut updated = Vec::with_capacity(updates.len());
        for (id, update) in &updates {
            if let Some(node) = nodes.get_mut(id) {
                node.apply_update(update);
                updated.push(node.clone());
            }
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str, level: u8, parent: Option<&str>, order: i64) -> HierarchyNode {
        HierarchyNode::new(
            name.to_string(),
            level,
            "Year",
            parent.map(str::to_string),
            order,
        )
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_id() {
        let store = MemoryStore::new();
        let root = node("2024", 1, None, 1);
        store.create_node(root.clone()).await.unwrap();
        assert!(store.create_node(root).await.is_err());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_list_sorted_by_order() {
        let store = MemoryStore::new();
        store.create_node(node("b", 1, None, 2)).await.unwrap();
        store.create_node(node("c", 1, None, 3)).await.unwrap();
        store.create_node(node("a", 1, None, 1)).await.unwrap();

        let names: Vec<String> = store
            .list_nodes(NodeFilter::siblings(1, None))
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.name)
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_max_sibling_order_scoped_to_group() {
        let store = MemoryStore::new();
        let root = node("2024", 1, None, 7);
        let root_id = root.id.clone();
        store.create_node(root).await.unwrap();
        store
            .create_node(node("Physics", 2, Some(&root_id), 3))
            .await
            .unwrap();

        assert_eq!(store.max_sibling_order(1, None).await.unwrap(), Some(7));
        assert_eq!(
            store.max_sibling_order(2, Some(&root_id)).await.unwrap(),
            Some(3)
        );
        assert_eq!(store.max_sibling_order(2, Some("other")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_batch_is_all_or_nothing() {
        let store = MemoryStore::new();
        let a = node("a", 1, None, 1);
        let a_id = a.id.clone();
        store.create_node(a).await.unwrap();

        let result = store
            .apply_batch(vec![
                (a_id.clone(), NodeUpdate::order(5)),
                ("missing".to_string(), NodeUpdate::order(6)),
            ])
            .await;

        assert!(result.is_err());
        assert_eq!(store.get_node(&a_id).await.unwrap().unwrap().order, 1);
    }

    #[tokio::test]
    async fn test_subtree_respects_depth() {
        let store = MemoryStore::new();
        let root = node("2024", 1, None, 1);
        let child = node("Physics", 2, Some(&root.id), 1);
        let grandchild = node("Mechanics", 3, Some(&child.id), 1);
        let root_id = root.id.clone();
        store.create_node(root).await.unwrap();
        store.create_node(child).await.unwrap();
        store.create_node(grandchild).await.unwrap();

        assert_eq!(store.get_subtree(&root_id, 1).await.unwrap().len(), 1);
        assert_eq!(store.get_subtree(&root_id, 4).await.unwrap().len(), 2);
    }

    #[test]
    fn test_level_stats_groups_by_level() {
        tokio_test::block_on(async {
            let store = MemoryStore::new();
            let mut a = node("a", 5, Some("p"), 1);
            a.question_count = 3;
            let mut b = node("b", 5, Some("p"), 2);
            b.question_count = 5;
            store.create_node(a).await.unwrap();
            store.create_node(b).await.unwrap();
            store.create_node(node("r", 1, None, 1)).await.unwrap();

            let stats = store.level_stats().await.unwrap();
            assert_eq!(stats.len(), 2);
            assert_eq!(stats[0].level, 1);
            assert_eq!(stats[1].count, 2);
            assert_eq!(stats[1].total_questions, 8);
        });
    }
}
