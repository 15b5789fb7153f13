//! Tests for the hierarchy engine rules
//!
//! Runs against `MemoryStore`; the libsql adapter has its own tests and the
//! integration suite repeats the scenarios on a real database.

#[cfg(test)]
mod hierarchy_tests {
    use crate::db::{HierarchyStore, MemoryStore};
    use crate::models::{
        CreateNodeInput, HierarchyNode, LevelAggregate, NodeFilter, NodeUpdate, ReorderItem,
        PREVIOUS_PAPERS, QUESTION_BANK,
    };
    use async_trait::async_trait;
    use crate::services::{ErrorKind, HierarchyChange, HierarchyService};
    use std::collections::HashSet;
    use std::sync::Arc;

    fn create_test_service() -> HierarchyService {
        HierarchyService::new(Arc::new(MemoryStore::new()), &QUESTION_BANK)
    }

    /// Year → Subject → Part → Section → Chapter, one node per level
    async fn create_chain(service: &HierarchyService) -> Vec<HierarchyNode> {
        let mut chain = Vec::new();
        let root = service.create(CreateNodeInput::root("2024")).await.unwrap();
        chain.push(root);
        for (level, name) in [(2, "Physics"), (3, "Part A"), (4, "Mechanics"), (5, "Kinematics")] {
            let parent_id = chain.last().unwrap().id.clone();
            let node = service
                .create(CreateNodeInput::child(name, level, parent_id))
                .await
                .unwrap();
            chain.push(node);
        }
        chain
    }

    // ========================================================================
    // create
    // ========================================================================

    #[tokio::test]
    async fn test_create_root_derives_type_and_order() {
        let service = create_test_service();

        let first = service.create(CreateNodeInput::root("  2023 ")).await.unwrap();
        let second = service.create(CreateNodeInput::root("2024")).await.unwrap();

        assert_eq!(first.name, "2023");
        assert_eq!(first.node_type, "Year");
        assert_eq!(first.level, 1);
        assert_eq!(first.order, 1);
        assert_eq!(second.order, 2);
        assert!(!first.is_published);
        assert!(first.parent_id.is_none());
    }

    #[tokio::test]
    async fn test_create_ignores_caller_type_order_and_publish_flag() {
        let service = create_test_service();
        let root = service.create(CreateNodeInput::root("2024")).await.unwrap();

        let mut input = CreateNodeInput::child("Physics", 2, root.id.clone());
        input.node_type = Some("Chapter".to_string());
        input.order = Some(42);
        input.is_published = Some(true);

        let node = service.create(input).await.unwrap();
        assert_eq!(node.node_type, "Subject");
        assert_eq!(node.order, 1);
        assert!(!node.is_published);
    }

    #[tokio::test]
    async fn test_create_rejects_parent_level_mismatch() {
        let service = create_test_service();
        let root = service.create(CreateNodeInput::root("2024")).await.unwrap();

        let err = service
            .create(CreateNodeInput::child("Mechanics", 3, root.id.clone()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let mut root_with_parent = CreateNodeInput::root("2025");
        root_with_parent.parent_id = Some(root.id.clone());
        let err = service.create(root_with_parent).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn test_create_requires_parent_below_root_level() {
        let service = create_test_service();

        let mut orphan = CreateNodeInput::root("Physics");
        orphan.level = 2;
        let err = service.create(orphan).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = service
            .create(CreateNodeInput::child("Physics", 2, "missing"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_create_validates_input() {
        let service = create_test_service();

        let err = service.create(CreateNodeInput::root("   ")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let mut too_deep = CreateNodeInput::root("x");
        too_deep.level = 6;
        assert_eq!(
            service.create(too_deep).await.unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );

        let mut negative = CreateNodeInput::root("x");
        negative.question_count = Some(-1);
        assert_eq!(
            service.create(negative).await.unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }

    #[tokio::test]
    async fn test_question_count_only_kept_at_question_level() {
        let service = create_test_service();
        let chain = create_chain(&service).await;

        let mut section = CreateNodeInput::child("Optics", 4, chain[2].id.clone());
        section.question_count = Some(9);
        assert_eq!(service.create(section).await.unwrap().question_count, 0);

        let mut chapter = CreateNodeInput::child("Projectiles", 5, chain[3].id.clone());
        chapter.question_count = Some(9);
        assert_eq!(service.create(chapter).await.unwrap().question_count, 9);
    }

    #[tokio::test]
    async fn test_sibling_orders_stay_unique_across_creates_and_reorders() {
        let service = create_test_service();
        let root = service.create(CreateNodeInput::root("2024")).await.unwrap();

        let mut ids = Vec::new();
        for name in ["Physics", "Chemistry", "Biology"] {
            let node = service
                .create(CreateNodeInput::child(name, 2, root.id.clone()))
                .await
                .unwrap();
            ids.push(node.id);
        }
        service
            .reorder(vec![
                ReorderItem::new(ids[0].clone(), 10),
                ReorderItem::new(ids[2].clone(), 1),
            ])
            .await
            .unwrap();
        service
            .create(CreateNodeInput::child("Maths", 2, root.id.clone()))
            .await
            .unwrap();

        let siblings = service.find_by_parent(&root.id).await.unwrap();
        let orders: HashSet<i64> = siblings.iter().map(|n| n.order).collect();
        assert_eq!(orders.len(), siblings.len());
        assert_eq!(siblings.last().unwrap().name, "Maths");
        assert_eq!(siblings.last().unwrap().order, 11);
    }

    // ========================================================================
    // reads
    // ========================================================================

    #[tokio::test]
    async fn test_find_all_nests_full_depth_in_order() {
        let service = create_test_service();
        let chain = create_chain(&service).await;
        service.create(CreateNodeInput::root("2025")).await.unwrap();

        let forest = service.find_all().await.unwrap();
        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0].node.name, "2024");
        assert_eq!(forest[1].node.name, "2025");
        assert_eq!(forest[0].descendant_count(), 4);

        let leaf = forest[0].find(&chain[4].id).unwrap();
        assert_eq!(leaf.node.node_type, "Chapter");
        assert!(leaf.children.is_empty());
    }

    #[tokio::test]
    async fn test_find_one_returns_subtree() {
        let service = create_test_service();
        let chain = create_chain(&service).await;

        let subtree = service.find_one(&chain[2].id).await.unwrap();
        assert_eq!(subtree.node.id, chain[2].id);
        assert_eq!(subtree.descendant_count(), 2);

        let err = service.find_one("missing").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_find_by_level_attaches_parent_and_children() {
        let service = create_test_service();
        let chain = create_chain(&service).await;

        let level_two = service.find_by_level(2).await.unwrap();
        assert_eq!(level_two.len(), 1);
        assert_eq!(level_two[0].node.id, chain[1].id);
        assert_eq!(level_two[0].parent.as_ref().unwrap().id, chain[0].id);
        assert_eq!(level_two[0].children.len(), 1);
        assert_eq!(level_two[0].children[0].id, chain[2].id);

        let roots = service.find_by_level(1).await.unwrap();
        assert!(roots[0].parent.is_none());

        let leaves = service.find_by_level(5).await.unwrap();
        assert!(leaves[0].children.is_empty());

        assert_eq!(
            service.find_by_level(0).await.unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }

    // ========================================================================
    // update / delete
    // ========================================================================

    #[tokio::test]
    async fn test_update_is_partial() {
        let service = create_test_service();
        let root = service.create(CreateNodeInput::root("2024")).await.unwrap();

        let updated = service
            .update(
                &root.id,
                NodeUpdate {
                    color: Some(Some("#ff0000".to_string())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "2024");
        assert_eq!(updated.color.as_deref(), Some("#ff0000"));

        let renamed = service
            .update(
                &root.id,
                NodeUpdate {
                    name: Some(" 2024/25 ".to_string()),
                    is_published: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.name, "2024/25");
        assert_eq!(renamed.color.as_deref(), Some("#ff0000"));
        assert!(!renamed.is_published);
    }

    #[tokio::test]
    async fn test_update_rejects_taken_order_and_misplaced_count() {
        let service = create_test_service();
        let first = service.create(CreateNodeInput::root("2023")).await.unwrap();
        service.create(CreateNodeInput::root("2024")).await.unwrap();

        let err = service.update(&first.id, NodeUpdate::order(2)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let err = service
            .update(
                &first.id,
                NodeUpdate {
                    question_count: Some(3),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let err = service.update("missing", NodeUpdate::order(5)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_order_check_is_scoped_to_the_sibling_group() {
        let service = create_test_service();
        let year_a = service.create(CreateNodeInput::root("2023")).await.unwrap();
        let year_b = service.create(CreateNodeInput::root("2024")).await.unwrap();
        let physics = service
            .create(CreateNodeInput::child("Physics", 2, year_a.id.clone()))
            .await
            .unwrap();
        service
            .create(CreateNodeInput::child("Chemistry", 2, year_b.id.clone()))
            .await
            .unwrap();
        service
            .create(CreateNodeInput::child("Biology", 2, year_b.id.clone()))
            .await
            .unwrap();

        // Order 2 is held under 2024 only
        let moved = service.update(&physics.id, NodeUpdate::order(2)).await.unwrap();
        assert_eq!(moved.order, 2);
    }

    #[tokio::test]
    async fn test_delete_only_leaves() {
        let service = create_test_service();
        let chain = create_chain(&service).await;

        let err = service.delete(&chain[3].id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert!(err.to_string().contains("Section 'Mechanics'"));

        let removed = service.delete(&chain[4].id).await.unwrap();
        assert_eq!(removed.id, chain[4].id);
        assert_eq!(
            service.find_one(&chain[4].id).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );

        service.delete(&chain[3].id).await.unwrap();
    }

    // ========================================================================
    // reorder
    // ========================================================================

    #[tokio::test]
    async fn test_reorder_applies_batch() {
        let service = create_test_service();
        let a = service.create(CreateNodeInput::root("A")).await.unwrap();
        let b = service.create(CreateNodeInput::root("B")).await.unwrap();
        let c = service.create(CreateNodeInput::root("C")).await.unwrap();

        service
            .reorder(vec![
                ReorderItem::new(a.id.clone(), 3),
                ReorderItem::new(b.id.clone(), 1),
                ReorderItem::new(c.id.clone(), 2),
            ])
            .await
            .unwrap();

        let names: Vec<String> = service
            .find_all()
            .await
            .unwrap()
            .into_iter()
            .map(|tree| tree.node.name.clone())
            .collect();
        assert_eq!(names, vec!["B", "C", "A"]);
    }

    #[tokio::test]
    async fn test_reorder_is_all_or_nothing() {
        let service = create_test_service();
        let a = service.create(CreateNodeInput::root("A")).await.unwrap();
        let b = service.create(CreateNodeInput::root("B")).await.unwrap();

        let err = service
            .reorder(vec![
                ReorderItem::new(a.id.clone(), 5),
                ReorderItem::new("missing", 6),
            ])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        // Colliding with a sibling that is not part of the batch
        let err = service
            .reorder(vec![ReorderItem::new(a.id.clone(), b.order)])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let err = service
            .reorder(vec![
                ReorderItem::new(a.id.clone(), 1),
                ReorderItem::new(a.id.clone(), 2),
            ])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let unchanged = service.find_one(&a.id).await.unwrap();
        assert_eq!(unchanged.node.order, 1);
    }

    // ========================================================================
    // publish / unpublish
    // ========================================================================

    #[tokio::test]
    async fn test_publish_requires_published_parent() {
        let service = create_test_service();
        let chain = create_chain(&service).await;

        let err = service.publish(&chain[1].id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        assert!(service.publish(&chain[0].id).await.unwrap().is_published);
        assert!(service.publish(&chain[1].id).await.unwrap().is_published);

        // Publishing does not cascade downwards
        let part = service.find_one(&chain[2].id).await.unwrap();
        assert!(!part.node.is_published);
    }

    #[tokio::test]
    async fn test_unpublish_cascades_through_all_levels() {
        let service = create_test_service();
        let chain = create_chain(&service).await;
        for node in &chain {
            service.publish(&node.id).await.unwrap();
        }

        let unpublished = service.unpublish(&chain[0].id).await.unwrap();
        assert!(!unpublished.is_published);

        let tree = service.find_one(&chain[0].id).await.unwrap();
        let mut published = Vec::new();
        tree.walk(&mut |node| {
            if node.is_published {
                published.push(node.id.clone());
            }
        });
        assert!(published.is_empty(), "still published: {:?}", published);
    }

    #[tokio::test]
    async fn test_find_published_returns_two_levels() {
        let service = create_test_service();
        let chain = create_chain(&service).await;
        let hidden = service
            .create(CreateNodeInput::child("Chemistry", 2, chain[0].id.clone()))
            .await
            .unwrap();
        service.create(CreateNodeInput::root("2025")).await.unwrap();

        for node in &chain[..3] {
            service.publish(&node.id).await.unwrap();
        }

        let view = service.find_published().await.unwrap();
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].node.id, chain[0].id);
        assert_eq!(view[0].children.len(), 1);
        assert_eq!(view[0].children[0].node.id, chain[1].id);
        assert!(view[0].children[0].children.is_empty());
        assert!(view[0].find(&hidden.id).is_none());
    }

    #[tokio::test]
    async fn test_publish_scenario_end_to_end() {
        let service = create_test_service();
        let year = service.create(CreateNodeInput::root("2024")).await.unwrap();
        let physics = service
            .create(CreateNodeInput::child("Physics", 2, year.id.clone()))
            .await
            .unwrap();

        let err = service.publish(&physics.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        service.publish(&year.id).await.unwrap();
        service.publish(&physics.id).await.unwrap();

        service.unpublish(&year.id).await.unwrap();
        let tree = service.find_one(&year.id).await.unwrap();
        assert!(!tree.node.is_published);
        assert!(!tree.children[0].node.is_published);
    }

    // ========================================================================
    // question counts and stats
    // ========================================================================

    #[tokio::test]
    async fn test_stats_sum_question_counts() {
        let service = create_test_service();
        let chain = create_chain(&service).await;
        let section_id = chain[3].id.clone();

        service.update_question_count(&chain[4].id, 3).await.unwrap();
        for (name, count) in [("Dynamics", 5), ("Statics", 0)] {
            let mut input = CreateNodeInput::child(name, 5, section_id.clone());
            input.question_count = Some(count);
            service.create(input).await.unwrap();
        }

        let stats = service.get_hierarchy_stats().await.unwrap();
        assert_eq!(stats.len(), 5);
        let chapters = stats.iter().find(|s| s.level == 5).unwrap();
        assert_eq!(chapters.node_type, "Chapter");
        assert_eq!(chapters.count, 3);
        assert_eq!(chapters.total_questions, 8);
        let years = stats.iter().find(|s| s.level == 1).unwrap();
        assert_eq!(years.total_questions, 0);
    }

    #[tokio::test]
    async fn test_update_question_count_rules() {
        let service = create_test_service();
        let chain = create_chain(&service).await;

        assert_eq!(
            service
                .update_question_count(&chain[4].id, -1)
                .await
                .unwrap_err()
                .kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            service
                .update_question_count(&chain[2].id, 4)
                .await
                .unwrap_err()
                .kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(
            service
                .update_question_count(&chain[4].id, 12)
                .await
                .unwrap()
                .question_count,
            12
        );
    }

    // ========================================================================
    // tree instances and events
    // ========================================================================

    #[tokio::test]
    async fn test_previous_papers_labels() {
        let service = HierarchyService::new(Arc::new(MemoryStore::new()), &PREVIOUS_PAPERS);
        let exam = service.create(CreateNodeInput::root("JEE Main")).await.unwrap();
        let year = service
            .create(CreateNodeInput::child("2024", 2, exam.id.clone()))
            .await
            .unwrap();

        assert_eq!(exam.node_type, "Exam");
        assert_eq!(year.node_type, "Year");
    }

    #[tokio::test]
    async fn test_events_carry_tree_and_client() {
        let service = create_test_service().with_client("tab-1");
        let mut events = service.subscribe_to_events();

        let root = service.create(CreateNodeInput::root("2024")).await.unwrap();
        service.publish(&root.id).await.unwrap();

        let created = events.recv().await.unwrap();
        assert_eq!(created.tree, "question-bank");
        assert_eq!(created.source_client_id.as_deref(), Some("tab-1"));
        assert!(matches!(created.change, HierarchyChange::NodeCreated { .. }));

        match events.recv().await.unwrap().change {
            HierarchyChange::PublishStateChanged { ids, is_published } => {
                assert_eq!(ids, vec![root.id.clone()]);
                assert!(is_published);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rejected_write_emits_nothing() {
        let service = create_test_service();
        let mut events = service.subscribe_to_events();

        assert!(service.delete("missing").await.is_err());
        assert!(events.try_recv().is_err());
    }

    /// Delegates to `MemoryStore` but reports every batch as matching nothing,
    /// as if the nodes were removed between the lookup and the write
    struct EmptyBatchStore {
        inner: MemoryStore,
    }

    #[async_trait]
    impl HierarchyStore for EmptyBatchStore {
        async fn create_node(&self, node: HierarchyNode) -> anyhow::Result<HierarchyNode> {
            self.inner.create_node(node).await
        }

        async fn get_node(&self, id: &str) -> anyhow::Result<Option<HierarchyNode>> {
            self.inner.get_node(id).await
        }

        async fn update_node(&self, id: &str, update: NodeUpdate) -> anyhow::Result<HierarchyNode> {
            self.inner.update_node(id, update).await
        }

        async fn delete_node(&self, id: &str) -> anyhow::Result<()> {
            self.inner.delete_node(id).await
        }

        async fn list_nodes(&self, filter: NodeFilter) -> anyhow::Result<Vec<HierarchyNode>> {
            self.inner.list_nodes(filter).await
        }

        async fn max_sibling_order(
            &self,
            level: u8,
            parent_id: Option<&str>,
        ) -> anyhow::Result<Option<i64>> {
            self.inner.max_sibling_order(level, parent_id).await
        }

        async fn count_children(&self, id: &str) -> anyhow::Result<usize> {
            self.inner.count_children(id).await
        }

        async fn level_stats(&self) -> anyhow::Result<Vec<LevelAggregate>> {
            self.inner.level_stats().await
        }

        async fn apply_batch(
            &self,
            _updates: Vec<(String, NodeUpdate)>,
        ) -> anyhow::Result<Vec<HierarchyNode>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_unpublish_of_vanished_node_emits_nothing() {
        let service = HierarchyService::new(
            Arc::new(EmptyBatchStore {
                inner: MemoryStore::new(),
            }),
            &QUESTION_BANK,
        );
        let root = service.create(CreateNodeInput::root("2024")).await.unwrap();
        let mut events = service.subscribe_to_events();

        let err = service.unpublish(&root.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(events.try_recv().is_err());
    }
}
