//! Relationship Queries
//!
//! Builds the queries for a node's parent, ancestors, children, siblings and
//! descendants. Everything here is a pure function of the node's own chain; no
//! query is executed until the caller runs it (except `ordered_ancestors`, which
//! fetches and re-sorts).

use crate::db::{NodeStore, Query};
use crate::models::{Levels, Node, Predicate, ROOT_ID};
use crate::services::error::TreeError;
use std::sync::Arc;

/// Query builders over a shared store
#[derive(Clone)]
pub struct QueryHelpers {
    store: Arc<dyn NodeStore>,
}

impl QueryHelpers {
    pub fn new(store: Arc<dyn NodeStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn NodeStore> {
        &self.store
    }

    /// Query for an arbitrary predicate
    pub fn query(&self, predicate: Predicate) -> Query {
        Query::new(self.store.clone(), predicate)
    }

    pub fn by_id(&self, id: &str) -> Query {
        self.query(Predicate::id(id))
    }

    pub fn by_ids(&self, ids: &[String]) -> Query {
        self.query(Predicate::id_in(ids.iter().cloned()))
    }

    /// Immediate parent
    ///
    /// For a root this addresses the root sentinel id, which no record carries,
    /// so `.one()` yields `None`.
    pub fn parent_of(&self, node: &Node) -> Query {
        self.by_id(node.parent_ref())
    }

    /// Every ancestor, in store order (see `ordered_ancestors` for chain order)
    pub fn ancestors_of(&self, node: &Node) -> Query {
        self.by_ids(&node.ancestors)
    }

    /// Ancestor at `level` (0 = the root of the node's tree)
    ///
    /// Levels past the chain yield an empty query.
    pub fn ancestor_at(&self, node: &Node, level: Option<usize>) -> Query {
        match node.ancestors.get(level.unwrap_or(0)) {
            Some(id) => self.by_id(id),
            None => self.query(Predicate::nothing()),
        }
    }

    /// Immediate children
    pub fn children_of(&self, node: &Node) -> Query {
        self.descendants_of(node, Some(Levels::from(1)))
    }

    /// Descendants, optionally only at the given relative depths
    pub fn descendants_of(&self, node: &Node, levels: Option<Levels>) -> Query {
        self.query(descendants_predicate(&node.id, node.depth(), levels))
    }

    /// Nodes sharing this node's parent (all other roots for a root)
    pub fn siblings_of(&self, node: &Node, include_self: bool) -> Query {
        let base = match node.parent_id() {
            None => Predicate::roots(),
            Some(parent_id) => descendants_predicate(
                parent_id,
                node.depth() - 1,
                Some(Levels::from(1)),
            ),
        };

        if include_self {
            self.query(base)
        } else {
            self.query(base.and(Predicate::id_ne(node.id.clone())))
        }
    }

    /// Ancestors fetched and sorted into chain order, root first
    ///
    /// Ancestors missing from the store are skipped.
    pub async fn ordered_ancestors(&self, node: &Node) -> Result<Vec<Node>, TreeError> {
        if node.is_root() {
            return Ok(Vec::new());
        }

        let mut fetched = self
            .ancestors_of(node)
            .all()
            .await
            .map_err(|e| TreeError::store(format!("reading ancestors of '{}'", node.id), e))?;

        fetched.sort_by_key(|ancestor| {
            node.ancestors
                .iter()
                .position(|id| id == &ancestor.id)
                .unwrap_or(usize::MAX)
        });
        Ok(fetched)
    }
}

/// "chain contains `id`" and, when given, "chain length is `depth + level`" for
/// some level
fn descendants_predicate(id: &str, depth: usize, levels: Option<Levels>) -> Predicate {
    let contains = Predicate::ancestors_contain(id);
    match levels {
        None => contains,
        Some(Levels(levels)) => {
            let depths = levels
                .into_iter()
                .map(|level| Predicate::depth(depth + level))
                .collect::<Vec<_>>();
            let depth_filter = match depths.len() {
                1 => depths.into_iter().next().unwrap_or_else(Predicate::nothing),
                _ => Predicate::any_of(depths),
            };
            contains.and(depth_filter)
        }
    }
}

/// Whether `id` addresses the root sentinel
pub fn is_root_sentinel(id: &str) -> bool {
    id == ROOT_ID
}
