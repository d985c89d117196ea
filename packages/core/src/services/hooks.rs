//! Lifecycle Interceptors
//!
//! Create, update and remove run through an explicit, ordered list of
//! interceptors. Each stage calls every hook in order and stops at the first
//! error, which aborts the operation.
//!
//! - `LifecycleHook` - trait with a default no-op per stage
//! - `HookChain` - the ordered list
//! - `MaterializedPathHook` - the engine's own interceptor: validates chains
//!   before create, maintains child refs, guards the generic update path and
//!   cascades removals to descendants
//!
//! # Examples
//!
//! ```rust
//! use async_trait::async_trait;
//! use mpath_core::models::Node;
//! use mpath_core::services::{LifecycleHook, TreeError};
//!
//! /// Refuses nodes without a title
//! struct RequireTitle;
//!
//! #[async_trait]
//! impl LifecycleHook for RequireTitle {
//!     fn name(&self) -> &str {
//!         "require-title"
//!     }
//!
//!     async fn before_create(&self, node: &mut Node) -> Result<(), TreeError> {
//!         if node.properties.get("title").is_none() {
//!             return Err(TreeError::invalid_field("title", "title is required"));
//!         }
//!         Ok(())
//!     }
//! }
//! ```

use crate::config::TreeOptions;
use crate::models::{Node, NodePatch, Predicate};
use crate::services::child_refs::ChildRefSynchronizer;
use crate::services::error::TreeError;
use crate::services::path_validator::PathValidator;
use crate::services::query_helpers::QueryHelpers;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A node on its way out, passed along the remove stages
#[derive(Debug, Clone, PartialEq)]
pub struct Removal {
    /// The node as read before removal
    pub node: Node,
    /// Descendants removed together with the node
    pub descendants_removed: u64,
}

/// Interceptor invoked around node lifecycle operations
#[async_trait]
pub trait LifecycleHook: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// May rewrite the node before it is inserted
    async fn before_create(&self, _node: &mut Node) -> Result<(), TreeError> {
        Ok(())
    }

    async fn after_create(&self, _node: &Node) -> Result<(), TreeError> {
        Ok(())
    }

    /// May rewrite or veto a generic update
    async fn before_update(&self, _id: &str, _patch: &mut NodePatch) -> Result<(), TreeError> {
        Ok(())
    }

    async fn after_update(&self, _node: &Node) -> Result<(), TreeError> {
        Ok(())
    }

    async fn before_remove(&self, _removal: &mut Removal) -> Result<(), TreeError> {
        Ok(())
    }

    async fn after_remove(&self, _removal: &Removal) -> Result<(), TreeError> {
        Ok(())
    }
}

/// Ordered list of interceptors, run front to back
#[derive(Clone, Default)]
pub struct HookChain {
    hooks: Vec<Arc<dyn LifecycleHook>>,
}

impl fmt::Debug for HookChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.hooks.iter().map(|hook| hook.name()))
            .finish()
    }
}

impl HookChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, hook: Arc<dyn LifecycleHook>) {
        self.hooks.push(hook);
    }

    /// Insert `hook` at `index`, shifting later hooks back
    pub fn insert(&mut self, index: usize, hook: Arc<dyn LifecycleHook>) {
        let index = index.min(self.hooks.len());
        self.hooks.insert(index, hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.hooks.iter().map(|hook| hook.name()).collect()
    }

    pub async fn before_create(&self, node: &mut Node) -> Result<(), TreeError> {
        for hook in &self.hooks {
            debug!("before_create: {} on '{}'", hook.name(), node.id);
            hook.before_create(node).await?;
        }
        Ok(())
    }

    pub async fn after_create(&self, node: &Node) -> Result<(), TreeError> {
        for hook in &self.hooks {
            debug!("after_create: {} on '{}'", hook.name(), node.id);
            hook.after_create(node).await?;
        }
        Ok(())
    }

    pub async fn before_update(&self, id: &str, patch: &mut NodePatch) -> Result<(), TreeError> {
        for hook in &self.hooks {
            debug!("before_update: {} on '{}'", hook.name(), id);
            hook.before_update(id, patch).await?;
        }
        Ok(())
    }

    pub async fn after_update(&self, node: &Node) -> Result<(), TreeError> {
        for hook in &self.hooks {
            debug!("after_update: {} on '{}'", hook.name(), node.id);
            hook.after_update(node).await?;
        }
        Ok(())
    }

    pub async fn before_remove(&self, removal: &mut Removal) -> Result<(), TreeError> {
        for hook in &self.hooks {
            debug!("before_remove: {} on '{}'", hook.name(), removal.node.id);
            hook.before_remove(removal).await?;
        }
        Ok(())
    }

    pub async fn after_remove(&self, removal: &Removal) -> Result<(), TreeError> {
        for hook in &self.hooks {
            debug!("after_remove: {} on '{}'", hook.name(), removal.node.id);
            hook.after_remove(removal).await?;
        }
        Ok(())
    }
}

/// The tree engine's own interceptor
pub struct MaterializedPathHook {
    options: Arc<TreeOptions>,
    queries: QueryHelpers,
    validator: PathValidator,
    child_refs: ChildRefSynchronizer,
}

impl MaterializedPathHook {
    pub const NAME: &'static str = "materialized-path";

    pub fn new(
        options: Arc<TreeOptions>,
        queries: QueryHelpers,
        validator: PathValidator,
        child_refs: ChildRefSynchronizer,
    ) -> Self {
        Self {
            options,
            queries,
            validator,
            child_refs,
        }
    }
}

#[async_trait]
impl LifecycleHook for MaterializedPathHook {
    fn name(&self) -> &str {
        Self::NAME
    }

    /// Validate shape and chain, then initialize the enabled caches
    async fn before_create(&self, node: &mut Node) -> Result<(), TreeError> {
        node.validate()?;
        self.validator.validate(&node.ancestors).await?;

        node.ancestors_count = self
            .options
            .store_ancestors_count
            .then_some(node.ancestors.len());
        node.children = self.options.store_children.then(Vec::new);
        node.children_count = self.options.store_children_count.then_some(0);
        Ok(())
    }

    async fn after_create(&self, node: &Node) -> Result<(), TreeError> {
        match node.parent_id() {
            Some(parent_id) => self.child_refs.add_ref(parent_id, &node.id).await,
            None => Ok(()),
        }
    }

    /// Ancestors change only through move; caches only through the engine
    async fn before_update(&self, _id: &str, patch: &mut NodePatch) -> Result<(), TreeError> {
        if patch.touches_ancestors() {
            return Err(TreeError::invalid_field(
                "ancestors",
                "ancestors can only change by moving the node",
            ));
        }
        if patch.touches_children() {
            return Err(TreeError::invalid_field(
                "children",
                "child references are maintained by the tree engine",
            ));
        }
        // A scalar would replace the whole map instead of merging into it
        if let Some(properties) = &patch.properties {
            if !(properties.is_object() || properties.is_null()) {
                return Err(TreeError::invalid_field(
                    "properties",
                    "properties must be a JSON object",
                ));
            }
        }
        Ok(())
    }

    /// Remove the whole subtree below the node, then its ref on the parent
    async fn before_remove(&self, removal: &mut Removal) -> Result<(), TreeError> {
        let id = removal.node.id.clone();
        removal.descendants_removed = self
            .queries
            .query(Predicate::ancestors_contain(id.clone()))
            .remove()
            .await
            .map_err(|e| TreeError::store(format!("removing descendants of '{}'", id), e))?;

        self.child_refs
            .remove_ref(removal.node.parent_ref(), &id)
            .await
    }
}
