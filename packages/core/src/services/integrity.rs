//! Tree Integrity Audit
//!
//! Detects tree damage left behind by interrupted cascades or concurrent
//! structural mutations. Detection only: nothing here writes to the store.
//!
//! Checks per node:
//!
//! - every ancestor exists and carries exactly the preceding part of the chain
//!   (which also pins its chain length to its position)
//! - `ancestors_count` equals the chain length, when cached
//! - `children_count` and the `children` list match the node's actual immediate
//!   children, when cached

use crate::config::TreeOptions;
use crate::models::{Node, Predicate};
use crate::services::error::TreeError;
use crate::services::query_helpers::QueryHelpers;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// One inconsistency found by the audit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PathViolation {
    /// The chain references a record that does not exist
    #[serde(rename_all = "camelCase")]
    MissingAncestor { node_id: String, ancestor_id: String },

    /// The ancestor at `position` does not carry the preceding part of the chain
    #[serde(rename_all = "camelCase")]
    InconsistentChain {
        node_id: String,
        ancestor_id: String,
        position: usize,
        ancestor_depth: usize,
    },

    #[serde(rename_all = "camelCase")]
    AncestorsCountMismatch {
        node_id: String,
        cached: Option<usize>,
        actual: usize,
    },

    #[serde(rename_all = "camelCase")]
    ChildrenCountMismatch {
        node_id: String,
        cached: Option<usize>,
        actual: usize,
    },

    /// Cached children differ from the actual immediate children (order ignored)
    #[serde(rename_all = "camelCase")]
    ChildrenListMismatch {
        node_id: String,
        cached: Vec<String>,
        actual: Vec<String>,
    },
}

impl PathViolation {
    pub fn node_id(&self) -> &str {
        match self {
            PathViolation::MissingAncestor { node_id, .. }
            | PathViolation::InconsistentChain { node_id, .. }
            | PathViolation::AncestorsCountMismatch { node_id, .. }
            | PathViolation::ChildrenCountMismatch { node_id, .. }
            | PathViolation::ChildrenListMismatch { node_id, .. } => node_id,
        }
    }
}

impl fmt::Display for PathViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathViolation::MissingAncestor {
                node_id,
                ancestor_id,
            } => write!(f, "'{}' references missing ancestor '{}'", node_id, ancestor_id),
            PathViolation::InconsistentChain {
                node_id,
                ancestor_id,
                position,
                ancestor_depth,
            } => write!(
                f,
                "'{}' has '{}' at position {} but that node sits at depth {} or under other ancestors",
                node_id, ancestor_id, position, ancestor_depth
            ),
            PathViolation::AncestorsCountMismatch {
                node_id,
                cached,
                actual,
            } => write!(
                f,
                "'{}' caches ancestorsCount {:?} for a chain of {}",
                node_id, cached, actual
            ),
            PathViolation::ChildrenCountMismatch {
                node_id,
                cached,
                actual,
            } => write!(
                f,
                "'{}' caches childrenCount {:?} but has {} children",
                node_id, cached, actual
            ),
            PathViolation::ChildrenListMismatch {
                node_id,
                cached,
                actual,
            } => write!(
                f,
                "'{}' caches children {:?} but has {:?}",
                node_id, cached, actual
            ),
        }
    }
}

/// Outcome of an audit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    /// Nodes inspected
    pub checked: usize,
    pub violations: Vec<PathViolation>,
}

impl IntegrityReport {
    pub fn is_consistent(&self) -> bool {
        self.violations.is_empty()
    }
}

#[derive(Clone)]
pub struct IntegrityChecker {
    queries: QueryHelpers,
    options: Arc<TreeOptions>,
}

impl IntegrityChecker {
    pub fn new(queries: QueryHelpers, options: Arc<TreeOptions>) -> Self {
        Self { queries, options }
    }

    /// Audit a node and every record whose chain contains it
    pub async fn check_subtree(&self, id: &str) -> Result<IntegrityReport, TreeError> {
        let root = self
            .queries
            .by_id(id)
            .one()
            .await
            .map_err(|e| TreeError::store(format!("reading node '{}'", id), e))?
            .ok_or_else(|| TreeError::not_found(id))?;

        let mut nodes = self
            .queries
            .query(Predicate::ancestors_contain(id))
            .all()
            .await
            .map_err(|e| TreeError::store(format!("reading descendants of '{}'", id), e))?;
        nodes.insert(0, root);

        self.audit(nodes).await
    }

    /// Audit every record in the store
    pub async fn check_all(&self) -> Result<IntegrityReport, TreeError> {
        let nodes = self
            .queries
            .query(Predicate::everything())
            .all()
            .await
            .map_err(|e| TreeError::store("reading all nodes", e))?;

        self.audit(nodes).await
    }

    async fn audit(&self, nodes: Vec<Node>) -> Result<IntegrityReport, TreeError> {
        let known: HashMap<&str, &Node> = nodes.iter().map(|n| (n.id.as_str(), n)).collect();

        // Ancestors above the audited set still have to be fetched
        let mut outside: Vec<String> = nodes
            .iter()
            .flat_map(|n| n.ancestors.iter())
            .filter(|id| !known.contains_key(id.as_str()))
            .cloned()
            .collect();
        outside.sort();
        outside.dedup();

        let fetched = if outside.is_empty() {
            Vec::new()
        } else {
            self.queries
                .by_ids(&outside)
                .all()
                .await
                .map_err(|e| TreeError::store("reading ancestors outside the audit", e))?
        };

        let mut lookup = known.clone();
        lookup.extend(fetched.iter().map(|n| (n.id.as_str(), n)));

        // Immediate children as derived from the chains
        let mut actual_children: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for node in &nodes {
            if let Some(parent_id) = node.parent_id() {
                actual_children
                    .entry(parent_id)
                    .or_default()
                    .push(node.id.clone());
            }
        }

        let mut violations = Vec::new();
        for node in &nodes {
            self.check_chain(node, &lookup, &mut violations);
            self.check_caches(node, &actual_children, &mut violations);
        }

        if violations.is_empty() {
            debug!("Integrity audit of {} nodes found nothing", nodes.len());
        } else {
            warn!(
                "Integrity audit of {} nodes found {} violations",
                nodes.len(),
                violations.len()
            );
        }

        Ok(IntegrityReport {
            checked: nodes.len(),
            violations,
        })
    }

    fn check_chain(
        &self,
        node: &Node,
        lookup: &HashMap<&str, &Node>,
        violations: &mut Vec<PathViolation>,
    ) {
        for (position, ancestor_id) in node.ancestors.iter().enumerate() {
            match lookup.get(ancestor_id.as_str()) {
                None => violations.push(PathViolation::MissingAncestor {
                    node_id: node.id.clone(),
                    ancestor_id: ancestor_id.clone(),
                }),
                Some(ancestor) if ancestor.ancestors.as_slice() != &node.ancestors[..position] => {
                    violations.push(PathViolation::InconsistentChain {
                        node_id: node.id.clone(),
                        ancestor_id: ancestor_id.clone(),
                        position,
                        ancestor_depth: ancestor.depth(),
                    })
                }
                Some(_) => {}
            }
        }
    }

    fn check_caches(
        &self,
        node: &Node,
        actual_children: &BTreeMap<&str, Vec<String>>,
        violations: &mut Vec<PathViolation>,
    ) {
        if self.options.store_ancestors_count && node.ancestors_count != Some(node.depth()) {
            violations.push(PathViolation::AncestorsCountMismatch {
                node_id: node.id.clone(),
                cached: node.ancestors_count,
                actual: node.depth(),
            });
        }

        let mut actual = actual_children
            .get(node.id.as_str())
            .cloned()
            .unwrap_or_default();

        if self.options.store_children_count && node.children_count != Some(actual.len()) {
            violations.push(PathViolation::ChildrenCountMismatch {
                node_id: node.id.clone(),
                cached: node.children_count,
                actual: actual.len(),
            });
        }

        if self.options.store_children {
            let mut cached = node.children.clone().unwrap_or_default();
            cached.sort();
            actual.sort();
            if cached != actual {
                violations.push(PathViolation::ChildrenListMismatch {
                    node_id: node.id.clone(),
                    cached,
                    actual,
                });
            }
        }
    }
}
