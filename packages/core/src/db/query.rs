//! Composable Queries
//!
//! A [`Query`] binds a [`NodeQuery`] to a store without executing it. Relationship
//! helpers (`children`, `descendants`, ...) hand these out so callers can narrow,
//! project or limit them before choosing how to run them.

use super::error::StoreError;
use super::node_store::NodeStore;
use crate::models::{Field, Node, NodePatch, NodeQuery, Predicate};
use std::fmt;
use std::sync::Arc;

/// Deferred query against a [`NodeStore`]
///
/// # Examples
///
/// ```rust
/// use mpath_core::db::{MemoryStore, NodeStore, Query};
/// use mpath_core::models::{Field, Node, Predicate};
/// use serde_json::json;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), mpath_core::db::StoreError> {
/// let store: Arc<dyn NodeStore> = Arc::new(MemoryStore::new());
/// store.insert(Node::new_with_id("1", json!({}))).await?;
///
/// let roots = Query::new(store.clone(), Predicate::roots())
///     .project(vec![Field::Ancestors])
///     .all()
///     .await?;
/// assert_eq!(roots.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Query {
    store: Arc<dyn NodeStore>,
    spec: NodeQuery,
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query").field("spec", &self.spec).finish()
    }
}

impl Query {
    pub fn new(store: Arc<dyn NodeStore>, predicate: Predicate) -> Self {
        Self {
            store,
            spec: NodeQuery::new(predicate),
        }
    }

    /// Narrow the query with an additional predicate
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.spec.predicate = self.spec.predicate.and(predicate);
        self
    }

    /// Return only `id` plus the given fields
    pub fn project(mut self, fields: Vec<Field>) -> Self {
        self.spec.projection = Some(fields);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.spec.limit = Some(limit);
        self
    }

    pub fn predicate(&self) -> &Predicate {
        &self.spec.predicate
    }

    pub fn spec(&self) -> &NodeQuery {
        &self.spec
    }

    pub async fn one(&self) -> Result<Option<Node>, StoreError> {
        self.store.find_one(&self.spec).await
    }

    pub async fn all(&self) -> Result<Vec<Node>, StoreError> {
        self.store.find(&self.spec).await
    }

    pub async fn count(&self) -> Result<usize, StoreError> {
        let ids_only = self.spec.clone().with_projection(Vec::new());
        Ok(self.store.find(&ids_only).await?.len())
    }

    pub async fn exists(&self) -> Result<bool, StoreError> {
        self.store.exists(&self.spec).await
    }

    /// Apply `patch` to every matching record
    pub async fn update(&self, patch: &NodePatch) -> Result<u64, StoreError> {
        self.store.update(&self.spec, patch).await
    }

    /// Remove every matching record
    pub async fn remove(&self) -> Result<u64, StoreError> {
        self.store.remove(&self.spec).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use serde_json::json;

    fn seeded() -> Arc<dyn NodeStore> {
        let store = Arc::new(MemoryStore::new());
        tokio_test::block_on(async {
            store.insert(Node::new_with_id("1", json!({}))).await.unwrap();
            store
                .insert(Node::new_with_id("2", json!({})).with_ancestors(vec!["1".into()]))
                .await
                .unwrap();
            store
                .insert(
                    Node::new_with_id("3", json!({}))
                        .with_ancestors(vec!["1".into(), "2".into()]),
                )
                .await
                .unwrap();
        });
        store
    }

    #[test]
    fn test_filter_narrows_without_executing() {
        let store = seeded();
        let query = Query::new(store, Predicate::ancestors_contain("1"));
        let narrowed = query.clone().filter(Predicate::depth(2));

        let (all, narrow) = tokio_test::block_on(async {
            (query.count().await.unwrap(), narrowed.all().await.unwrap())
        });
        assert_eq!(all, 2);
        assert_eq!(narrow.len(), 1);
        assert_eq!(narrow[0].id, "3");
    }

    #[test]
    fn test_limit_and_exists() {
        let store = seeded();
        let query = Query::new(store.clone(), Predicate::everything()).limit(2);
        let missing = Query::new(store, Predicate::id("nope"));

        tokio_test::block_on(async {
            assert_eq!(query.all().await.unwrap().len(), 2);
            assert!(query.exists().await.unwrap());
            assert!(!missing.exists().await.unwrap());
            assert!(missing.one().await.unwrap().is_none());
        });
    }

    #[test]
    fn test_update_and_remove_report_affected() {
        let store = seeded();
        let subtree = Query::new(store.clone(), Predicate::ancestors_contain("2"));

        tokio_test::block_on(async {
            let patch = NodePatch::new().with_properties(json!({"moved": true}));
            assert_eq!(subtree.update(&patch).await.unwrap(), 1);
            assert_eq!(subtree.remove().await.unwrap(), 1);
            assert_eq!(subtree.remove().await.unwrap(), 0);
        });
    }
}
