//! Child Reference Synchronization
//!
//! Maintains the denormalized `children` list and `children_count` on parent
//! records. Everything here is a no-op unless `store_children` or
//! `store_children_count` is enabled, and the root sentinel never receives refs.

use crate::config::TreeOptions;
use crate::models::NodePatch;
use crate::services::error::TreeError;
use crate::services::query_helpers::{is_root_sentinel, QueryHelpers};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct ChildRefSynchronizer {
    queries: QueryHelpers,
    options: Arc<TreeOptions>,
}

impl ChildRefSynchronizer {
    pub fn new(queries: QueryHelpers, options: Arc<TreeOptions>) -> Self {
        Self { queries, options }
    }

    pub fn is_active(&self) -> bool {
        self.options.tracks_children()
    }

    /// Record `child_id` under `parent_id`
    pub async fn add_ref(&self, parent_id: &str, child_id: &str) -> Result<(), TreeError> {
        let Some(patch) = self.patch(child_id, 1) else {
            return Ok(());
        };
        if is_root_sentinel(parent_id) {
            return Ok(());
        }
        self.apply(parent_id, child_id, patch, "adding").await
    }

    /// Drop `child_id` from `parent_id`'s references
    pub async fn remove_ref(&self, parent_id: &str, child_id: &str) -> Result<(), TreeError> {
        let Some(patch) = self.patch(child_id, -1) else {
            return Ok(());
        };
        if is_root_sentinel(parent_id) {
            return Ok(());
        }
        self.apply(parent_id, child_id, patch, "removing").await
    }

    fn patch(&self, child_id: &str, delta: i64) -> Option<NodePatch> {
        if !self.is_active() {
            return None;
        }

        let mut patch = NodePatch::new();
        if self.options.store_children {
            patch = if delta > 0 {
                patch.with_push_child(child_id.to_string())
            } else {
                patch.with_pull_child(child_id.to_string())
            };
        }
        if self.options.store_children_count {
            patch = patch.with_children_count_delta(delta);
        }
        Some(patch)
    }

    async fn apply(
        &self,
        parent_id: &str,
        child_id: &str,
        patch: NodePatch,
        action: &str,
    ) -> Result<(), TreeError> {
        let affected = self
            .queries
            .by_id(parent_id)
            .update(&patch)
            .await
            .map_err(|e| {
                TreeError::store(
                    format!(
                        "{} child reference '{}' on parent '{}'",
                        action, child_id, parent_id
                    ),
                    e,
                )
            })?;

        if affected == 0 {
            warn!(
                "Parent '{}' vanished while {} child reference '{}'",
                parent_id, action, child_id
            );
        } else {
            debug!(
                "Child reference '{}' {} on parent '{}'",
                child_id, action, parent_id
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStore, NodeStore};
    use crate::models::{Node, ROOT_ID};
    use crate::services::error::ErrorCode;
    use serde_json::json;

    async fn setup(options: TreeOptions) -> (ChildRefSynchronizer, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let mut parent = Node::new_with_id("p", json!({}));
        parent.children = Some(Vec::new());
        parent.children_count = Some(0);
        store.insert(parent).await.unwrap();
        let sync = ChildRefSynchronizer::new(QueryHelpers::new(store.clone()), Arc::new(options));
        (sync, store)
    }

    #[tokio::test]
    async fn test_add_and_remove_with_both_caches() {
        let (sync, store) = setup(TreeOptions::all_caches()).await;
        sync.add_ref("p", "a").await.unwrap();
        sync.add_ref("p", "b").await.unwrap();
        sync.remove_ref("p", "a").await.unwrap();

        let parent = store.peek("p").await.unwrap();
        assert_eq!(parent.children, Some(vec!["b".to_string()]));
        assert_eq!(parent.children_count, Some(1));
    }

    #[tokio::test]
    async fn test_count_only() {
        let options = TreeOptions {
            store_children_count: true,
            ..TreeOptions::default()
        };
        let (sync, store) = setup(options).await;
        sync.add_ref("p", "a").await.unwrap();

        let parent = store.peek("p").await.unwrap();
        assert_eq!(parent.children, Some(Vec::new()));
        assert_eq!(parent.children_count, Some(1));
    }

    #[tokio::test]
    async fn test_disabled_issues_no_writes() {
        let (sync, store) = setup(TreeOptions::default()).await;
        let before = store.write_count();
        sync.add_ref("p", "a").await.unwrap();
        sync.remove_ref("p", "a").await.unwrap();
        assert_eq!(store.write_count(), before);
    }

    #[tokio::test]
    async fn test_root_sentinel_is_skipped() {
        let (sync, store) = setup(TreeOptions::all_caches()).await;
        let before = store.write_count();
        sync.add_ref(ROOT_ID, "a").await.unwrap();
        assert_eq!(store.write_count(), before);
    }

    #[tokio::test]
    async fn test_missing_parent_is_tolerated() {
        let (sync, _store) = setup(TreeOptions::all_caches()).await;
        assert!(sync.add_ref("gone", "a").await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_write_is_execfail() {
        let (sync, store) = setup(TreeOptions::all_caches()).await;
        store.fail_writes_after(0);
        let err = sync.add_ref("p", "a").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ExecFail);
        assert!(err.to_string().contains("child reference 'a'"));
    }
}
