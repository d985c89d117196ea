//! Data Models
//!
//! This module contains the data structures the tree engine works with:
//!
//! - `Node` - A record carrying its materialized ancestor chain
//! - `Predicate` / `NodeQuery` - The filter vocabulary handed to stores
//! - `NodePatch` - Sparse updates applied by stores

mod node;
mod patch;
mod predicate;

pub use node::{Node, RemoveResult, ValidationError, ROOT_ID};
pub use patch::NodePatch;
pub use predicate::{Field, Levels, NodeQuery, Predicate};
