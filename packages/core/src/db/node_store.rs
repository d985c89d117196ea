//! NodeStore Trait - Store Abstraction Layer
//!
//! This module defines the `NodeStore` trait the tree engine reads from and writes
//! to. The engine is agnostic to the storage technology behind it: a key-value
//! file, a document database or a remote endpoint all fit, as long as they can
//! evaluate the [`Predicate`](crate::models::Predicate) vocabulary.
//!
//! # Design Decisions
//!
//! 1. **Async-First**: Every method is a single asynchronous round trip
//! 2. **Filtered Writes**: Updates and removals take a query and report how many
//!    records they affected; a conditional update by id that affects nothing is
//!    how callers detect a record that vanished concurrently
//! 3. **No Transactions**: Nothing here spans multiple calls
//!
//! # Examples
//!
//! ```rust
//! use mpath_core::db::{MemoryStore, NodeStore};
//! use mpath_core::models::{Node, NodeQuery};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), mpath_core::db::StoreError> {
//! let store = MemoryStore::new();
//! store.insert(Node::new_with_id("1", json!({}))).await?;
//!
//! let found = store.find_one(&NodeQuery::by_id("1")).await?;
//! assert!(found.is_some());
//! # Ok(())
//! # }
//! ```

use super::error::StoreError;
use crate::models::{Node, NodePatch, NodeQuery};
use async_trait::async_trait;

/// Keyed record storage with filtered read/update/remove
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so they can be shared as
/// `Arc<dyn NodeStore>` across tasks.
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// Insert a new record
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DuplicateId` if the id is already taken.
    async fn insert(&self, node: Node) -> Result<Node, StoreError>;

    /// All records matching the query, projected and limited as requested
    async fn find(&self, query: &NodeQuery) -> Result<Vec<Node>, StoreError>;

    /// First record matching the query
    ///
    /// - `Ok(Some(node))` if a record matches
    /// - `Ok(None)` if nothing matches (not an error)
    async fn find_one(&self, query: &NodeQuery) -> Result<Option<Node>, StoreError> {
        let limited = query.clone().with_limit(1);
        Ok(self.find(&limited).await?.into_iter().next())
    }

    /// Apply `patch` to every matching record, returning the affected count
    async fn update(&self, query: &NodeQuery, patch: &NodePatch) -> Result<u64, StoreError>;

    /// Remove every matching record, returning the affected count
    async fn remove(&self, query: &NodeQuery) -> Result<u64, StoreError>;

    /// Whether any record matches
    async fn exists(&self, query: &NodeQuery) -> Result<bool, StoreError> {
        Ok(self.find_one(query).await?.is_some())
    }
}
