//! Subtree Relocation
//!
//! Moves a node under a new parent and rewrites the ancestor chains of the node
//! and every descendant, then updates child references on both parents.
//!
//! # Algorithm
//!
//! 1. Reject self-parenting (`INVALID`)
//! 2. Re-read the node from the store (`NOTFOUND` if absent)
//! 3. Return unchanged, without writes, if the target already is the parent
//! 4. Compute the new chain from the new parent (`INVALID` if it does not exist
//!    or sits inside the moved subtree)
//! 5. Conditionally update the node by id (`NOTFOUND` if it vanished)
//! 6. Rewrite each descendant's chain: new prefix + the descendant's suffix
//!    starting at the moved node
//! 7. Add the child ref on the new parent, drop it from the old one
//!
//! # Failure Semantics
//!
//! Any failing step aborts the remaining ones. Nothing is rolled back: an error
//! mid-cascade leaves some descendants rewritten and others not, and the engine
//! never repairs an interrupted cascade. Re-running the same move is a no-op
//! because the node already sits under its new parent. `IntegrityChecker`
//! only reports the stale descendants.

use crate::config::TreeOptions;
use crate::models::{Field, Node, NodePatch, Predicate};
use crate::services::child_refs::ChildRefSynchronizer;
use crate::services::error::TreeError;
use crate::services::query_helpers::{is_root_sentinel, QueryHelpers};
use futures::stream::{self, TryStreamExt};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// What a move did
#[derive(Debug, Clone, PartialEq)]
pub struct MoveOutcome {
    /// The node as persisted after the move
    pub node: Node,
    /// Parent before the move (`"root"` for roots)
    pub from_parent: String,
    /// Descendants whose chains were rewritten
    pub descendants: usize,
    /// False when the move was a no-op
    pub changed: bool,
}

#[derive(Clone)]
pub struct MoveOperator {
    queries: QueryHelpers,
    child_refs: ChildRefSynchronizer,
    options: Arc<TreeOptions>,
}

impl MoveOperator {
    pub fn new(
        queries: QueryHelpers,
        child_refs: ChildRefSynchronizer,
        options: Arc<TreeOptions>,
    ) -> Self {
        Self {
            queries,
            child_refs,
            options,
        }
    }

    /// Move `node_id` (with its subtree) under `new_parent_id`
    ///
    /// Pass [`ROOT_ID`](crate::models::ROOT_ID) as `new_parent_id` to make the node a root.
    #[instrument(skip(self))]
    pub async fn relocate(
        &self,
        node_id: &str,
        new_parent_id: &str,
    ) -> Result<MoveOutcome, TreeError> {
        if node_id == new_parent_id {
            return Err(TreeError::invalid_field(
                "newParentId",
                format!("node '{}' cannot be its own parent", node_id),
            ));
        }

        let node = self
            .queries
            .by_id(node_id)
            .one()
            .await
            .map_err(|e| TreeError::store(format!("reading node '{}'", node_id), e))?
            .ok_or_else(|| TreeError::not_found(node_id))?;

        let from_parent = node.parent_ref().to_string();
        if from_parent == new_parent_id {
            debug!("Node '{}' already sits under '{}'", node_id, new_parent_id);
            return Ok(MoveOutcome {
                node,
                from_parent,
                descendants: 0,
                changed: false,
            });
        }

        let new_ancestors = self.target_chain(node_id, new_parent_id).await?;
        let old_prefix_len = node.depth();

        let mut patch = NodePatch::new().with_ancestors(new_ancestors.clone());
        if self.options.store_ancestors_count {
            patch = patch.with_ancestors_count(new_ancestors.len());
        }
        let affected = self
            .queries
            .by_id(node_id)
            .update(&patch)
            .await
            .map_err(|e| TreeError::store(format!("updating ancestors of '{}'", node_id), e))?;
        if affected == 0 {
            return Err(TreeError::not_found(node_id));
        }

        let descendants = self
            .cascade(node_id, &new_ancestors, old_prefix_len)
            .await?;

        self.child_refs.add_ref(new_parent_id, node_id).await?;
        self.child_refs.remove_ref(&from_parent, node_id).await?;

        let moved = self
            .queries
            .by_id(node_id)
            .one()
            .await
            .map_err(|e| TreeError::store(format!("re-reading node '{}'", node_id), e))?
            .ok_or_else(|| TreeError::not_found(node_id))?;

        info!(
            "Moved node '{}' from '{}' to '{}' ({} descendants rewritten)",
            node_id, from_parent, new_parent_id, descendants
        );

        Ok(MoveOutcome {
            node: moved,
            from_parent,
            descendants,
            changed: true,
        })
    }

    /// Chain the moved node will carry under `new_parent_id`
    async fn target_chain(
        &self,
        node_id: &str,
        new_parent_id: &str,
    ) -> Result<Vec<String>, TreeError> {
        if is_root_sentinel(new_parent_id) {
            return Ok(Vec::new());
        }

        let parent = self
            .queries
            .by_id(new_parent_id)
            .one()
            .await
            .map_err(|e| TreeError::store(format!("reading parent '{}'", new_parent_id), e))?
            .ok_or_else(|| {
                TreeError::invalid_field(
                    "newParentId",
                    format!("invalid parent reference '{}'", new_parent_id),
                )
            })?;

        if parent.is_descendant_of(node_id) {
            return Err(TreeError::invalid_field(
                "newParentId",
                format!(
                    "cannot move node '{}' under its own descendant '{}'",
                    node_id, new_parent_id
                ),
            ));
        }

        Ok(parent.child_ancestors())
    }

    /// Rewrite every descendant of `node_id`; returns how many were found
    async fn cascade(
        &self,
        node_id: &str,
        new_prefix: &[String],
        old_prefix_len: usize,
    ) -> Result<usize, TreeError> {
        let descendants = self
            .queries
            .query(Predicate::ancestors_contain(node_id))
            .project(vec![Field::Ancestors])
            .all()
            .await
            .map_err(|e| {
                TreeError::store(format!("reading descendants of '{}'", node_id), e)
            })?;

        let total = descendants.len();
        debug!(
            "Cascading move of '{}' to {} descendants ({} in flight)",
            node_id, total, self.options.cascade_concurrency
        );

        stream::iter(descendants.into_iter().map(Ok::<Node, TreeError>))
            .try_for_each_concurrent(self.options.cascade_concurrency, |descendant| {
                self.rewrite_descendant(descendant, new_prefix, old_prefix_len)
            })
            .await?;

        Ok(total)
    }

    async fn rewrite_descendant(
        &self,
        descendant: Node,
        new_prefix: &[String],
        old_prefix_len: usize,
    ) -> Result<(), TreeError> {
        let suffix = descendant.ancestors.get(old_prefix_len..).ok_or_else(|| {
            TreeError::exec_failed(format!(
                "descendant '{}' has a chain shorter than its moved ancestor",
                descendant.id
            ))
        })?;

        let mut chain = Vec::with_capacity(new_prefix.len() + suffix.len());
        chain.extend_from_slice(new_prefix);
        chain.extend_from_slice(suffix);

        let mut patch = NodePatch::new();
        if self.options.store_ancestors_count {
            patch = patch.with_ancestors_count(chain.len());
        }
        let patch = patch.with_ancestors(chain);

        let affected = self
            .queries
            .by_id(&descendant.id)
            .update(&patch)
            .await
            .map_err(|e| {
                TreeError::store(
                    format!("cascade update of descendant '{}'", descendant.id),
                    e,
                )
            })?;

        if affected == 0 {
            debug!("Descendant '{}' vanished during cascade", descendant.id);
        }
        Ok(())
    }
}

// Comprehensive tests in separate module
#[cfg(test)]
#[path = "move_operator_test.rs"]
mod move_operator_test;
