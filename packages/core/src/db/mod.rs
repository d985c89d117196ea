//! Store Layer
//!
//! This module holds everything the tree engine needs from a backing store:
//!
//! - `NodeStore` - the async store contract (filtered find/update/remove)
//! - `Query` - a deferred, composable query bound to a store
//! - `MemoryStore` - an id-keyed in-memory backend
//! - `StoreError` - backend failures
//! - `TreeEvent` - domain events emitted after structural changes
//!
//! # Architecture
//!
//! The engine never talks to a concrete database. It only emits predicates from
//! the closed vocabulary in [`crate::models::Predicate`], so any backend able to
//! evaluate them can sit behind `NodeStore`.

mod error;
pub mod events;
mod memory_store;
mod node_store;
mod query;

pub use error::StoreError;
pub use events::{MoveRelationship, TreeEvent};
pub use memory_store::MemoryStore;
pub use node_store::NodeStore;
pub use query::Query;
