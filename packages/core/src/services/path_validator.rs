//! Ancestor Chain Validation
//!
//! Checks that a proposed ancestor chain is fully resolvable in the store and
//! self-consistent before a node carrying it is created.
//!
//! Two strengths are available (see `TreeOptions::strict_path_validation`):
//!
//! - **strict** (default): every ancestor `ancestors[i]` must itself carry exactly
//!   `ancestors[..i]` as its chain
//! - **lenient**: walking the chain, each ancestor's own chain length must be one
//!   more than the previous ancestor's

use crate::models::Node;
use crate::services::error::TreeError;
use crate::services::query_helpers::QueryHelpers;
use std::collections::HashMap;
use tracing::debug;

#[derive(Clone)]
pub struct PathValidator {
    queries: QueryHelpers,
    strict: bool,
}

impl PathValidator {
    pub fn new(queries: QueryHelpers, strict: bool) -> Self {
        Self { queries, strict }
    }

    /// Validate a proposed chain; an empty chain (a root) is always valid
    ///
    /// # Errors
    ///
    /// - `EXECFAIL` "cannot find all ancestors" when some id does not resolve
    /// - `EXECFAIL` "inconsistent path" when the chain does not line up
    /// - `CONNFAIL` when the store is unreachable
    pub async fn validate(&self, ancestors: &[String]) -> Result<(), TreeError> {
        if ancestors.is_empty() {
            return Ok(());
        }

        let fetched = self
            .queries
            .by_ids(ancestors)
            .all()
            .await
            .map_err(|e| TreeError::store("resolving ancestors", e))?;

        if fetched.len() != ancestors.len() {
            debug!(
                "Ancestor lookup returned {} of {} ids",
                fetched.len(),
                ancestors.len()
            );
            return Err(TreeError::exec_failed("cannot find all ancestors"));
        }

        let by_id: HashMap<&str, &Node> = fetched
            .iter()
            .map(|node| (node.id.as_str(), node))
            .collect();

        let mut previous_len: Option<usize> = None;
        for (position, id) in ancestors.iter().enumerate() {
            let ancestor = by_id
                .get(id.as_str())
                .ok_or_else(|| TreeError::exec_failed("cannot find all ancestors"))?;

            if self.strict {
                if ancestor.ancestors.as_slice() != &ancestors[..position] {
                    debug!(
                        "Ancestor '{}' at position {} carries chain {:?}",
                        id, position, ancestor.ancestors
                    );
                    return Err(TreeError::exec_failed("inconsistent path"));
                }
            } else if let Some(previous) = previous_len {
                if ancestor.depth() != previous + 1 {
                    return Err(TreeError::exec_failed("inconsistent path"));
                }
            }
            previous_len = Some(ancestor.depth());
        }

        Ok(())
    }
}
