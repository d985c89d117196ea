//! Tree Service
//!
//! The facade callers use to work with a materialized-path forest. It owns the
//! resolved [`TreeOptions`], wires the engine components together over one
//! store, runs create/update/remove through the [`HookChain`] and broadcasts a
//! [`TreeEvent`] after every successful structural change.
//!
//! # Examples
//!
//! ```rust
//! use mpath_core::config::TreeOptions;
//! use mpath_core::db::MemoryStore;
//! use mpath_core::models::{Node, ROOT_ID};
//! use mpath_core::services::TreeService;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), mpath_core::services::TreeError> {
//! let service = TreeService::new(Arc::new(MemoryStore::new()), TreeOptions::all_caches())?;
//!
//! let projects = service.create(Node::new_with_id("projects", json!({}))).await?;
//! let launch = service
//!     .add_child(&projects, Node::new(json!({ "title": "Launch" })))
//!     .await?;
//! assert_eq!(launch.ancestors, vec!["projects".to_string()]);
//!
//! let parent = service.parent(&launch).one().await?.unwrap();
//! assert_eq!(parent.id, "projects");
//!
//! let launch = service.move_node(&launch.id, ROOT_ID).await?;
//! assert!(launch.is_root());
//! # Ok(())
//! # }
//! ```

use crate::config::TreeOptions;
use crate::db::{MoveRelationship, NodeStore, Query, StoreError, TreeEvent};
use crate::models::{Levels, Node, NodePatch, RemoveResult};
use crate::services::child_refs::ChildRefSynchronizer;
use crate::services::error::TreeError;
use crate::services::hooks::{HookChain, LifecycleHook, MaterializedPathHook, Removal};
use crate::services::integrity::{IntegrityChecker, IntegrityReport};
use crate::services::move_operator::MoveOperator;
use crate::services::path_validator::PathValidator;
use crate::services::query_helpers::QueryHelpers;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument};

/// Broadcast channel capacity for tree events.
///
/// Lagging subscribers lose the oldest events; they only track current state.
const TREE_EVENT_CHANNEL_CAPACITY: usize = 128;

#[derive(Clone)]
pub struct TreeService {
    options: Arc<TreeOptions>,
    queries: QueryHelpers,
    mover: MoveOperator,
    integrity: IntegrityChecker,
    hooks: Arc<HookChain>,

    /// Broadcast channel for tree events
    event_tx: broadcast::Sender<TreeEvent>,

    /// Tagged onto every emitted event as `source_client_id`
    client_id: Option<String>,
}

impl fmt::Debug for TreeService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeService")
            .field("options", &self.options)
            .field("hooks", &self.hooks)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

impl TreeService {
    /// Create a service over `store`
    ///
    /// Options are validated and resolved once here; every component shares them.
    pub fn new(store: Arc<dyn NodeStore>, options: TreeOptions) -> Result<Self, TreeError> {
        options
            .validate()
            .map_err(|reason| TreeError::invalid_field("cascadeConcurrency", reason))?;
        let options = Arc::new(options);

        let queries = QueryHelpers::new(store);
        let validator = PathValidator::new(queries.clone(), options.strict_path_validation);
        let child_refs = ChildRefSynchronizer::new(queries.clone(), options.clone());
        let mover = MoveOperator::new(queries.clone(), child_refs.clone(), options.clone());
        let integrity = IntegrityChecker::new(queries.clone(), options.clone());

        let mut hooks = HookChain::new();
        hooks.push(Arc::new(MaterializedPathHook::new(
            options.clone(),
            queries.clone(),
            validator,
            child_refs,
        )));

        let (event_tx, _) = broadcast::channel(TREE_EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            options,
            queries,
            mover,
            integrity,
            hooks: Arc::new(hooks),
            event_tx,
            client_id: None,
        })
    }

    /// Append a lifecycle hook; it runs after the engine's own
    pub fn with_hook(mut self, hook: Arc<dyn LifecycleHook>) -> Self {
        Arc::make_mut(&mut self.hooks).push(hook);
        self
    }

    /// Clone of this service whose events carry `client_id`
    pub fn with_client(&self, client_id: impl Into<String>) -> Self {
        let mut cloned = self.clone();
        cloned.client_id = Some(client_id.into());
        cloned
    }

    pub fn subscribe_to_events(&self) -> broadcast::Receiver<TreeEvent> {
        self.event_tx.subscribe()
    }

    pub fn options(&self) -> &TreeOptions {
        &self.options
    }

    pub fn store(&self) -> &Arc<dyn NodeStore> {
        self.queries.store()
    }

    pub fn queries(&self) -> &QueryHelpers {
        &self.queries
    }

    pub fn hooks(&self) -> &HookChain {
        &self.hooks
    }

    fn emit_event(&self, event: TreeEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }

    /// Per-node view over this service
    pub fn node(&self, node: Node) -> NodeHandle {
        NodeHandle {
            service: self.clone(),
            node,
        }
    }

    // Lifecycle

    /// Create a node with the chain it carries (empty = root)
    ///
    /// # Errors
    ///
    /// - `INVALID` for a malformed node or an id that is already taken
    /// - `EXECFAIL` when the chain cannot be resolved or is inconsistent
    #[instrument(skip(self, node), fields(id = %node.id))]
    pub async fn create(&self, node: Node) -> Result<Node, TreeError> {
        let mut node = node;
        self.hooks.before_create(&mut node).await?;

        let created = self.store().insert(node).await.map_err(|e| match e {
            StoreError::DuplicateId { id } => {
                TreeError::invalid_field("id", format!("node '{}' already exists", id))
            }
            other => TreeError::store("inserting node", other),
        })?;

        self.hooks.after_create(&created).await?;

        info!(
            "Created node '{}' at depth {}",
            created.id,
            created.depth()
        );
        self.emit_event(TreeEvent::NodeCreated {
            node: created.clone(),
            source_client_id: self.client_id.clone(),
        });
        Ok(created)
    }

    /// Create `child` directly beneath `parent`
    ///
    /// The chain is derived from `parent` as held by the caller; creation still
    /// validates it against the store.
    pub async fn add_child(&self, parent: &Node, child: Node) -> Result<Node, TreeError> {
        self.create(child.with_ancestors(parent.child_ancestors()))
            .await
    }

    /// Update a node through the generic path
    ///
    /// Only properties may change here; chains move through
    /// [`move_node`](Self::move_node) and caches are maintained by the engine.
    #[instrument(skip(self, patch))]
    pub async fn update(&self, id: &str, patch: NodePatch) -> Result<Node, TreeError> {
        let mut patch = patch;
        self.hooks.before_update(id, &mut patch).await?;

        if patch.is_empty() {
            debug!("Empty patch for '{}'", id);
            return self.require(id).await;
        }

        let affected = self
            .queries
            .by_id(id)
            .update(&patch)
            .await
            .map_err(|e| TreeError::store(format!("updating node '{}'", id), e))?;
        if affected == 0 {
            return Err(TreeError::not_found(id));
        }

        let updated = self.require(id).await?;
        self.hooks.after_update(&updated).await?;

        info!("Updated node '{}'", id);
        self.emit_event(TreeEvent::NodeUpdated {
            node: updated.clone(),
            source_client_id: self.client_id.clone(),
        });
        Ok(updated)
    }

    /// Shallow-merge `properties` into the node's properties
    pub async fn update_properties(&self, id: &str, properties: Value) -> Result<Node, TreeError> {
        self.update(id, NodePatch::new().with_properties(properties))
            .await
    }

    /// Move a node and its subtree under `new_parent_id` (`"root"` for none)
    pub async fn move_node(&self, id: &str, new_parent_id: &str) -> Result<Node, TreeError> {
        let outcome = self.mover.relocate(id, new_parent_id).await?;

        if outcome.changed {
            self.emit_event(TreeEvent::NodeMoved {
                node: outcome.node.clone(),
                relationship: MoveRelationship {
                    node_id: outcome.node.id.clone(),
                    from_parent: outcome.from_parent.clone(),
                    to_parent: new_parent_id.to_string(),
                    descendants: outcome.descendants,
                },
                source_client_id: self.client_id.clone(),
            });
        }
        Ok(outcome.node)
    }

    /// Remove a node together with every descendant
    ///
    /// Idempotent: removing an absent node reports `existed = false`. Nothing is
    /// rolled back if a step fails part way.
    #[instrument(skip(self))]
    pub async fn remove(&self, id: &str) -> Result<RemoveResult, TreeError> {
        let Some(node) = self.get(id).await? else {
            debug!("Node '{}' already absent", id);
            return Ok(RemoveResult::not_found());
        };

        let mut removal = Removal {
            node,
            descendants_removed: 0,
        };
        self.hooks.before_remove(&mut removal).await?;

        let own = self
            .queries
            .by_id(id)
            .remove()
            .await
            .map_err(|e| TreeError::store(format!("removing node '{}'", id), e))?;

        self.hooks.after_remove(&removal).await?;

        let removed = own + removal.descendants_removed;
        info!(
            "Removed node '{}' with {} descendants",
            id, removal.descendants_removed
        );
        self.emit_event(TreeEvent::SubtreeRemoved {
            id: id.to_string(),
            removed,
            source_client_id: self.client_id.clone(),
        });
        Ok(RemoveResult::removed(removed))
    }

    // Reads

    pub async fn get(&self, id: &str) -> Result<Option<Node>, TreeError> {
        self.queries
            .by_id(id)
            .one()
            .await
            .map_err(|e| TreeError::store(format!("reading node '{}'", id), e))
    }

    /// Like [`get`](Self::get) but `NOTFOUND` when absent
    pub async fn require(&self, id: &str) -> Result<Node, TreeError> {
        self.get(id).await?.ok_or_else(|| TreeError::not_found(id))
    }

    pub fn parent(&self, node: &Node) -> Query {
        self.queries.parent_of(node)
    }

    pub fn ancestors(&self, node: &Node) -> Query {
        self.queries.ancestors_of(node)
    }

    pub async fn ordered_ancestors(&self, node: &Node) -> Result<Vec<Node>, TreeError> {
        self.queries.ordered_ancestors(node).await
    }

    pub fn ancestor_at(&self, node: &Node, level: Option<usize>) -> Query {
        self.queries.ancestor_at(node, level)
    }

    pub fn siblings(&self, node: &Node, include_self: bool) -> Query {
        self.queries.siblings_of(node, include_self)
    }

    pub fn children(&self, node: &Node) -> Query {
        self.queries.children_of(node)
    }

    pub fn descendants(&self, node: &Node, levels: Option<Levels>) -> Query {
        self.queries.descendants_of(node, levels)
    }

    // Audit

    pub async fn check_subtree(&self, id: &str) -> Result<IntegrityReport, TreeError> {
        self.integrity.check_subtree(id).await
    }

    pub async fn check_all(&self) -> Result<IntegrityReport, TreeError> {
        self.integrity.check_all().await
    }
}

/// A node bound to the service that manages it
///
/// Structural operations refresh the held node with the persisted result.
#[derive(Clone, Debug)]
pub struct NodeHandle {
    service: TreeService,
    node: Node,
}

impl NodeHandle {
    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn into_node(self) -> Node {
        self.node
    }

    /// Persist the held node
    pub async fn create(&mut self) -> Result<&Node, TreeError> {
        self.node = self.service.create(self.node.clone()).await?;
        Ok(&self.node)
    }

    pub async fn move_to(&mut self, new_parent_id: &str) -> Result<&Node, TreeError> {
        self.node = self.service.move_node(&self.node.id, new_parent_id).await?;
        Ok(&self.node)
    }

    pub async fn remove(self) -> Result<RemoveResult, TreeError> {
        self.service.remove(&self.node.id).await
    }

    /// Create `child` beneath the held node
    pub async fn add_child(&self, child: Node) -> Result<NodeHandle, TreeError> {
        let created = self.service.add_child(&self.node, child).await?;
        Ok(self.service.node(created))
    }

    pub fn parent(&self) -> Query {
        self.service.parent(&self.node)
    }

    pub fn ancestors(&self) -> Query {
        self.service.ancestors(&self.node)
    }

    pub async fn ordered_ancestors(&self) -> Result<Vec<Node>, TreeError> {
        self.service.ordered_ancestors(&self.node).await
    }

    pub fn ancestor_at(&self, level: Option<usize>) -> Query {
        self.service.ancestor_at(&self.node, level)
    }

    pub fn siblings(&self, include_self: bool) -> Query {
        self.service.siblings(&self.node, include_self)
    }

    pub fn children(&self) -> Query {
        self.service.children(&self.node)
    }

    pub fn descendants(&self, levels: Option<Levels>) -> Query {
        self.service.descendants(&self.node, levels)
    }
}

// Comprehensive tests in separate module
#[cfg(test)]
#[path = "tree_service_test.rs"]
mod tree_service_test;
