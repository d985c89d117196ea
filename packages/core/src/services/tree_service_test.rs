//! Tests for TreeService
//!
//! Tests cover:
//! - Creation (validation, cache initialization, duplicate ids)
//! - The generic update path and its guards
//! - Removal cascades and idempotence
//! - Lifecycle hook ordering and vetoes
//! - Domain events and client tagging
//! - NodeHandle operations

#[cfg(test)]
mod tests {
    use crate::config::TreeOptions;
    use crate::db::{MemoryStore, TreeEvent};
    use crate::models::{Levels, Node, NodePatch, ROOT_ID};
    use crate::services::error::{ErrorCode, TreeError};
    use crate::services::hooks::{LifecycleHook, MaterializedPathHook, Removal};
    use crate::services::tree_service::TreeService;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn chain(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn service(options: TreeOptions) -> (TreeService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let service = TreeService::new(store.clone(), options).unwrap();
        (service, store)
    }

    /// 1 → 2 → 3, plus a second child 4 under 1
    async fn small_tree(service: &TreeService) -> Vec<Node> {
        let one = service
            .create(Node::new_with_id("1", json!({})))
            .await
            .unwrap();
        let two = service
            .add_child(&one, Node::new_with_id("2", json!({})))
            .await
            .unwrap();
        let three = service
            .add_child(&two, Node::new_with_id("3", json!({})))
            .await
            .unwrap();
        let four = service
            .add_child(&one, Node::new_with_id("4", json!({})))
            .await
            .unwrap();
        vec![one, two, three, four]
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let options = TreeOptions {
            cascade_concurrency: 0,
            ..TreeOptions::default()
        };
        let err = TreeService::new(Arc::new(MemoryStore::new()), options).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Invalid);
        assert!(err.fields().contains_key("cascadeConcurrency"));
    }

    #[tokio::test]
    async fn test_create_initializes_enabled_caches() {
        let (service, _) = service(TreeOptions::all_caches());
        let nodes = small_tree(&service).await;

        let three = &nodes[2];
        assert_eq!(three.ancestors, chain(&["1", "2"]));
        assert_eq!(three.ancestors_count, Some(2));
        assert_eq!(three.children, Some(Vec::new()));
        assert_eq!(three.children_count, Some(0));

        let one = service.require("1").await.unwrap();
        assert_eq!(one.children, Some(chain(&["2", "4"])));
        assert_eq!(one.children_count, Some(2));
    }

    #[tokio::test]
    async fn test_disabled_caches_stay_absent() {
        let options = TreeOptions {
            store_ancestors_count: false,
            ..TreeOptions::default()
        };
        let (service, _) = service(options);
        let nodes = small_tree(&service).await;

        assert_eq!(nodes[2].ancestors_count, None);
        assert_eq!(nodes[2].children, None);
        assert_eq!(nodes[2].children_count, None);
        assert_eq!(service.require("1").await.unwrap().children, None);
    }

    #[tokio::test]
    async fn test_caller_supplied_caches_are_overwritten() {
        let (service, _) = service(TreeOptions::all_caches());
        let mut node = Node::new_with_id("1", json!({}));
        node.ancestors_count = Some(7);
        node.children = Some(chain(&["ghost"]));
        node.children_count = Some(3);

        let created = service.create(node).await.unwrap();
        assert_eq!(created.ancestors_count, Some(0));
        assert_eq!(created.children, Some(Vec::new()));
        assert_eq!(created.children_count, Some(0));
    }

    #[tokio::test]
    async fn test_malformed_node_is_invalid_without_writes() {
        let (service, store) = service(TreeOptions::default());
        let err = service
            .create(Node::new_with_id(ROOT_ID, json!({})))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Invalid);
        assert!(err.fields().contains_key("id"));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_id_is_invalid() {
        let (service, _) = service(TreeOptions::default());
        service
            .create(Node::new_with_id("1", json!({})))
            .await
            .unwrap();
        let err = service
            .create(Node::new_with_id("1", json!({})))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Invalid);
        assert!(err.to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn test_update_merges_properties() {
        let (service, _) = service(TreeOptions::default());
        service
            .create(Node::new_with_id("1", json!({"title": "a", "done": false})))
            .await
            .unwrap();

        let updated = service
            .update_properties("1", json!({"done": true}))
            .await
            .unwrap();
        assert_eq!(updated.properties, json!({"title": "a", "done": true}));
    }

    #[tokio::test]
    async fn test_update_rejects_tree_fields() {
        let (service, store) = service(TreeOptions::all_caches());
        small_tree(&service).await;
        let writes = store.write_count();

        let err = service
            .update("3", NodePatch::new().with_ancestors(chain(&["1"])))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Invalid);
        assert!(err.fields().contains_key("ancestors"));

        let err = service
            .update("1", NodePatch::new().with_children_count_delta(5))
            .await
            .unwrap_err();
        assert!(err.fields().contains_key("children"));

        assert_eq!(store.write_count(), writes);
    }

    #[tokio::test]
    async fn test_update_rejects_scalar_properties() {
        let (service, store) = service(TreeOptions::default());
        service
            .create(Node::new_with_id("a", json!({"title": "a"})))
            .await
            .unwrap();
        let writes = store.write_count();

        for scalar in [json!(42), json!("text"), json!([1, 2])] {
            let err = service.update_properties("a", scalar).await.unwrap_err();
            assert_eq!(err.code(), ErrorCode::Invalid);
            assert!(err.fields().contains_key("properties"));
        }

        let stored = store.peek("a").await.unwrap();
        assert_eq!(stored.properties, json!({"title": "a"}));
        assert!(stored.validate().is_ok());
        assert_eq!(store.write_count(), writes);
    }

    #[tokio::test]
    async fn test_update_missing_node_is_notfound() {
        let (service, _) = service(TreeOptions::default());
        let err = service
            .update_properties("nope", json!({"x": 1}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_remove_cascades_and_updates_parent() {
        let (service, store) = service(TreeOptions::all_caches());
        small_tree(&service).await;

        let result = service.remove("2").await.unwrap();
        assert!(result.existed);
        assert_eq!(result.removed, 2);

        assert!(store.peek("2").await.is_none());
        assert!(store.peek("3").await.is_none());
        let one = store.peek("1").await.unwrap();
        assert_eq!(one.children, Some(chain(&["4"])));
        assert_eq!(one.children_count, Some(1));
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let (service, store) = service(TreeOptions::default());
        small_tree(&service).await;

        service.remove("1").await.unwrap();
        assert!(store.is_empty().await);

        let writes = store.write_count();
        let again = service.remove("1").await.unwrap();
        assert!(!again.existed);
        assert_eq!(again.removed, 0);
        assert_eq!(store.write_count(), writes);
    }

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl LifecycleHook for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        async fn before_create(&self, node: &mut Node) -> Result<(), TreeError> {
            // Runs after the engine hook, so caches are already initialized
            self.log.lock().unwrap().push(format!(
                "{}:before_create:{}:{:?}",
                self.name, node.id, node.ancestors_count
            ));
            Ok(())
        }

        async fn after_create(&self, node: &Node) -> Result<(), TreeError> {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:after_create:{}", self.name, node.id));
            Ok(())
        }

        async fn after_remove(&self, removal: &Removal) -> Result<(), TreeError> {
            self.log.lock().unwrap().push(format!(
                "{}:after_remove:{}:{}",
                self.name, removal.node.id, removal.descendants_removed
            ));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_hooks_run_after_engine_hook_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (service, _) = service(TreeOptions::default());
        let service = service
            .with_hook(Arc::new(Recorder {
                name: "first",
                log: log.clone(),
            }))
            .with_hook(Arc::new(Recorder {
                name: "second",
                log: log.clone(),
            }));
        assert_eq!(
            service.hooks().names(),
            vec![MaterializedPathHook::NAME, "first", "second"]
        );

        small_tree(&service).await;
        log.lock().unwrap().clear();
        service.remove("2").await.unwrap();
        service
            .create(Node::new_with_id("9", json!({})))
            .await
            .unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "first:after_remove:2:1",
                "second:after_remove:2:1",
                "first:before_create:9:Some(0)",
                "second:before_create:9:Some(0)",
                "first:after_create:9",
                "second:after_create:9",
            ]
        );
    }

    struct Veto;

    #[async_trait]
    impl LifecycleHook for Veto {
        fn name(&self) -> &str {
            "veto"
        }

        async fn before_create(&self, node: &mut Node) -> Result<(), TreeError> {
            if node.properties.get("title").is_none() {
                return Err(TreeError::invalid_field("title", "title is required"));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_hook_veto_aborts_create() {
        let (service, store) = service(TreeOptions::default());
        let service = service.with_hook(Arc::new(Veto));

        let err = service
            .create(Node::new_with_id("1", json!({})))
            .await
            .unwrap_err();
        assert!(err.fields().contains_key("title"));
        assert!(store.is_empty().await);

        service
            .create(Node::new_with_id("1", json!({"title": "ok"})))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_events_follow_successful_operations() {
        let (service, _) = service(TreeOptions::default());
        let mut rx = service.subscribe_to_events();
        let scoped = service.with_client("window-1");

        small_tree(&scoped).await;
        for expected in ["1", "2", "3", "4"] {
            match rx.recv().await.unwrap() {
                TreeEvent::NodeCreated {
                    node,
                    source_client_id,
                } => {
                    assert_eq!(node.id, expected);
                    assert_eq!(source_client_id.as_deref(), Some("window-1"));
                }
                other => panic!("unexpected event {:?}", other),
            }
        }

        // A no-op move emits nothing; a real one does
        service.move_node("3", "2").await.unwrap();
        service.move_node("3", "4").await.unwrap();
        match rx.recv().await.unwrap() {
            TreeEvent::NodeMoved {
                relationship,
                source_client_id,
                ..
            } => {
                assert_eq!(relationship.from_parent, "2");
                assert_eq!(relationship.to_parent, "4");
                assert_eq!(relationship.descendants, 0);
                assert!(source_client_id.is_none());
            }
            other => panic!("unexpected event {:?}", other),
        }

        // Failed operations emit nothing
        assert!(service.move_node("3", "3").await.is_err());
        service.remove("1").await.unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), "subtree:removed");
        assert!(matches!(event, TreeEvent::SubtreeRemoved { removed: 4, .. }));
    }

    #[tokio::test]
    async fn test_node_handle_operations() {
        let (service, store) = service(TreeOptions::all_caches());
        let mut root = service.node(Node::new_with_id("r", json!({})));
        root.create().await.unwrap();

        let a = root
            .add_child(Node::new_with_id("a", json!({})))
            .await
            .unwrap();
        let b = root
            .add_child(Node::new_with_id("b", json!({})))
            .await
            .unwrap();
        let mut leaf = a
            .add_child(Node::new_with_id("leaf", json!({})))
            .await
            .unwrap();

        assert_eq!(leaf.parent().one().await.unwrap().unwrap().id, "a");
        assert_eq!(leaf.ancestors().count().await.unwrap(), 2);
        assert_eq!(leaf.ancestor_at(None).one().await.unwrap().unwrap().id, "r");
        let ordered: Vec<String> = leaf
            .ordered_ancestors()
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(ordered, chain(&["r", "a"]));
        assert_eq!(a.siblings(false).all().await.unwrap()[0].id, "b");
        assert_eq!(root.children().count().await.unwrap(), 2);
        assert_eq!(
            root.descendants(Some(Levels::from(2)))
                .all()
                .await
                .unwrap()[0]
                .id,
            "leaf"
        );

        leaf.move_to("b").await.unwrap();
        assert_eq!(leaf.node().ancestors, chain(&["r", "b"]));
        assert_eq!(store.peek("b").await.unwrap().children, Some(chain(&["leaf"])));

        let result = b.remove().await.unwrap();
        assert_eq!(result.removed, 2);
        assert!(store.peek("leaf").await.is_none());
    }
}
