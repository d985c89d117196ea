//! Materialized-Path Tree Engine
//!
//! This crate lets flat records in a generic keyed store represent a forest of
//! trees. Every record stores its full ancestor chain, and the engine keeps those
//! chains consistent across creation, moves and removals.
//!
//! # Architecture
//!
//! - **Materialized path**: `ancestors` holds ids root first, immediate parent last
//! - **Store-agnostic**: the engine only emits predicates from a closed vocabulary
//! - **No transactions**: cascades are fail-fast and never rolled back
//! - **Resolved options**: cache flags are fixed when the service is built
//!
//! # Modules
//!
//! - [`config`] - Cache and cascade options
//! - [`models`] - Node, predicates, patches
//! - [`db`] - Store contract, query handle, in-memory store, events
//! - [`services`] - Tree engine components and the `TreeService` facade

pub mod config;
pub mod db;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use config::TreeOptions;
pub use db::{MemoryStore, NodeStore, Query, StoreError, TreeEvent};
pub use models::*;
pub use services::*;
