//! In-Memory Store
//!
//! An id-keyed arena implementing [`NodeStore`] by evaluating predicates with
//! [`Predicate::matches`](crate::models::Predicate::matches). It backs tests and
//! embedded use, and carries a few switches for exercising failure paths:
//!
//! - `set_offline(true)` makes every call fail with `StoreError::ConnectionFailed`
//! - `fail_writes_after(n)` lets `n` more writes succeed, then fails writes with
//!   `StoreError::QueryFailed`
//! - `write_count()` reports how many writes (insert/update/remove) were issued

use super::error::StoreError;
use super::node_store::NodeStore;
use crate::models::{Node, NodePatch, NodeQuery};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::RwLock;

const UNLIMITED_WRITES: u64 = u64::MAX;

/// Arena of nodes keyed by id; results come back in id order
#[derive(Debug)]
pub struct MemoryStore {
    nodes: RwLock<BTreeMap<String, Node>>,
    offline: AtomicBool,
    writes: AtomicU64,
    write_budget: AtomicU64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(BTreeMap::new()),
            offline: AtomicBool::new(false),
            writes: AtomicU64::new(0),
            write_budget: AtomicU64::new(UNLIMITED_WRITES),
        }
    }

    /// Simulate the store becoming (un)reachable
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Allow `remaining` more successful writes, then fail every write
    pub fn fail_writes_after(&self, remaining: u64) {
        self.write_budget.store(remaining, Ordering::SeqCst);
    }

    /// Lift any write budget set by `fail_writes_after`
    pub fn clear_write_failures(&self) {
        self.write_budget.store(UNLIMITED_WRITES, Ordering::SeqCst);
    }

    /// Writes issued so far, successful or not
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.nodes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.nodes.read().await.is_empty()
    }

    /// Snapshot of a record, bypassing projection and failure switches
    pub async fn peek(&self, id: &str) -> Option<Node> {
        self.nodes.read().await.get(id).cloned()
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::connection_failed("memory store is offline"));
        }
        Ok(())
    }

    fn begin_write(&self, operation: &str) -> Result<(), StoreError> {
        self.check_online()?;
        self.writes.fetch_add(1, Ordering::SeqCst);

        let budget = self.write_budget.load(Ordering::SeqCst);
        if budget == UNLIMITED_WRITES {
            return Ok(());
        }
        if budget == 0 {
            return Err(StoreError::query_failed(format!(
                "{} rejected: write budget exhausted",
                operation
            )));
        }
        self.write_budget.store(budget - 1, Ordering::SeqCst);
        Ok(())
    }

    fn matching_ids(nodes: &BTreeMap<String, Node>, query: &NodeQuery) -> Vec<String> {
        nodes
            .values()
            .filter(|node| query.predicate.matches(node))
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|node| node.id.clone())
            .collect()
    }
}

#[async_trait]
impl NodeStore for MemoryStore {
    async fn insert(&self, node: Node) -> Result<Node, StoreError> {
        self.begin_write("insert")?;
        let mut nodes = self.nodes.write().await;
        if nodes.contains_key(&node.id) {
            return Err(StoreError::duplicate_id(&node.id));
        }
        nodes.insert(node.id.clone(), node.clone());
        Ok(node)
    }

    async fn find(&self, query: &NodeQuery) -> Result<Vec<Node>, StoreError> {
        self.check_online()?;
        let nodes = self.nodes.read().await;
        Ok(nodes
            .values()
            .filter(|node| query.predicate.matches(node))
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|node| query.project(node.clone()))
            .collect())
    }

    async fn update(&self, query: &NodeQuery, patch: &NodePatch) -> Result<u64, StoreError> {
        self.begin_write("update")?;
        let mut nodes = self.nodes.write().await;
        let ids = Self::matching_ids(&nodes, query);
        for id in &ids {
            if let Some(node) = nodes.get_mut(id) {
                patch.apply(node);
            }
        }
        Ok(ids.len() as u64)
    }

    async fn remove(&self, query: &NodeQuery) -> Result<u64, StoreError> {
        self.begin_write("remove")?;
        let mut nodes = self.nodes.write().await;
        let ids = Self::matching_ids(&nodes, query);
        for id in &ids {
            nodes.remove(id);
        }
        Ok(ids.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Predicate;
    use serde_json::json;

    #[tokio::test]
    async fn test_insert_rejects_duplicates() {
        let store = MemoryStore::new();
        store.insert(Node::new_with_id("a", json!({}))).await.unwrap();
        let err = store
            .insert(Node::new_with_id("a", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId { .. }));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_results_are_id_ordered() {
        let store = MemoryStore::new();
        for id in ["c", "a", "b"] {
            store.insert(Node::new_with_id(id, json!({}))).await.unwrap();
        }
        let ids: Vec<String> = store
            .find(&NodeQuery::new(Predicate::everything()))
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_offline_reports_connection_failure() {
        let store = MemoryStore::new();
        store.set_offline(true);
        let err = store.find(&NodeQuery::by_id("a")).await.unwrap_err();
        assert!(err.is_connection());

        store.set_offline(false);
        assert!(store.find(&NodeQuery::by_id("a")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_budget() {
        let store = MemoryStore::new();
        store.fail_writes_after(1);
        store.insert(Node::new_with_id("a", json!({}))).await.unwrap();
        let err = store
            .insert(Node::new_with_id("b", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::QueryFailed { .. }));
        assert_eq!(store.write_count(), 2);

        store.clear_write_failures();
        store.insert(Node::new_with_id("b", json!({}))).await.unwrap();
        assert!(store.peek("b").await.is_some());
    }
}
