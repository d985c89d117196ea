//! Tree Engine Services
//!
//! This module contains the materialized-path tree engine:
//!
//! - `TreeService` - Facade for create/update/move/remove and relationship queries
//! - `QueryHelpers` - Builds parent/ancestor/children/sibling/descendant queries
//! - `PathValidator` - Checks proposed ancestor chains before creation
//! - `ChildRefSynchronizer` - Maintains cached child lists and counts
//! - `MoveOperator` - Relocates subtrees and cascades chain rewrites
//! - `HookChain` - Ordered lifecycle interceptors
//! - `IntegrityChecker` - Detects trees left inconsistent by partial failures
//!
//! Services share one store and one resolved `TreeOptions`; none of them holds
//! node state between calls.

pub mod child_refs;
pub mod error;
pub mod hooks;
pub mod integrity;
pub mod move_operator;
pub mod path_validator;
pub mod query_helpers;
pub mod tree_service;

pub use child_refs::ChildRefSynchronizer;
pub use error::{ErrorBody, ErrorCode, TreeError};
pub use hooks::{HookChain, LifecycleHook, MaterializedPathHook, Removal};
pub use integrity::{IntegrityChecker, IntegrityReport, PathViolation};
pub use move_operator::{MoveOperator, MoveOutcome};
pub use path_validator::PathValidator;
pub use query_helpers::QueryHelpers;
pub use tree_service::{NodeHandle, TreeService};
