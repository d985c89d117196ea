//! Node Data Structures
//!
//! This module defines the `Node` record that participates in a materialized-path
//! tree, together with its structural validation.
//!
//! # Materialized Path
//!
//! Every node stores its full ancestor chain (`ancestors`), ordered from the root
//! down to the immediate parent. An empty chain means the node is a root. The
//! chain length is the node's depth, and "is descendant of X" is a single
//! containment check on the chain.
//!
//! # Cached Fields
//!
//! `ancestors_count`, `children` and `children_count` are denormalized caches that
//! the engine maintains when enabled in [`TreeOptions`](crate::config::TreeOptions).
//! They are `None` when the corresponding cache is disabled.
//!
//! # Examples
//!
//! ```rust
//! use mpath_core::models::Node;
//! use serde_json::json;
//!
//! let root = Node::new_with_id("1", json!({"title": "Root"}));
//! assert!(root.is_root());
//!
//! let child = Node::new_with_id("2", json!({})).with_ancestors(vec!["1".to_string()]);
//! assert_eq!(child.parent_id(), Some("1"));
//! assert_eq!(child.depth(), 1);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use uuid::Uuid;

/// Reserved identifier meaning "no parent" wherever a parent target is required
pub const ROOT_ID: &str = "root";

/// Structural validation errors for a node, raised before the store is consulted
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid node ID: {0}")]
    InvalidId(String),

    #[error("Invalid ancestor chain: {0}")]
    InvalidAncestors(String),

    #[error("Properties validation failed: {0}")]
    InvalidProperties(String),
}

impl ValidationError {
    /// Name of the node field the error refers to
    pub fn field(&self) -> &str {
        match self {
            ValidationError::MissingField(field) => field,
            ValidationError::InvalidId(_) => "id",
            ValidationError::InvalidAncestors(_) => "ancestors",
            ValidationError::InvalidProperties(_) => "properties",
        }
    }

    /// Single-entry field→reason map suitable for validation feedback
    pub fn to_field_map(&self) -> BTreeMap<String, String> {
        let mut fields = BTreeMap::new();
        fields.insert(self.field().to_string(), self.to_string());
        fields
    }
}

/// A record participating in a tree.
///
/// # Fields
///
/// - `id`: Unique identifier
/// - `ancestors`: Ancestor ids, root first, immediate parent last
/// - `ancestors_count`: Cached `ancestors.len()` (when enabled)
/// - `children`: Cached immediate-child ids (when enabled)
/// - `children_count`: Cached number of immediate children (when enabled)
/// - `properties`: Arbitrary record data carried along with the tree fields
/// - `created_at` / `modified_at`: Timestamps maintained by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique identifier
    pub id: String,

    /// Ancestor chain, root-to-immediate-parent order
    #[serde(default)]
    pub ancestors: Vec<String>,

    /// Cached chain length
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ancestors_count: Option<usize>,

    /// Cached immediate-child ids
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<String>>,

    /// Cached number of immediate children
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children_count: Option<usize>,

    /// Record payload
    #[serde(default)]
    pub properties: serde_json::Value,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub modified_at: DateTime<Utc>,
}

impl Node {
    /// Create a new root node with an auto-generated UUID
    pub fn new(properties: serde_json::Value) -> Self {
        Self::new_with_id(Uuid::new_v4().to_string(), properties)
    }

    /// Create a new root node with an explicit id
    pub fn new_with_id(id: impl Into<String>, properties: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            ancestors: Vec::new(),
            ancestors_count: None,
            children: None,
            children_count: None,
            properties,
            created_at: now,
            modified_at: now,
        }
    }

    /// Replace the ancestor chain (builder style, used before creation)
    pub fn with_ancestors(mut self, ancestors: Vec<String>) -> Self {
        self.ancestors = ancestors;
        self
    }

    /// Whether this node has no ancestors
    pub fn is_root(&self) -> bool {
        self.ancestors.is_empty()
    }

    /// Chain length, which is also the depth in the tree
    pub fn depth(&self) -> usize {
        self.ancestors.len()
    }

    /// Immediate parent id, `None` for roots
    pub fn parent_id(&self) -> Option<&str> {
        self.ancestors.last().map(String::as_str)
    }

    /// Immediate parent id, or [`ROOT_ID`] for roots
    pub fn parent_ref(&self) -> &str {
        self.parent_id().unwrap_or(ROOT_ID)
    }

    /// Whether `ancestor_id` appears anywhere in this node's chain
    pub fn is_descendant_of(&self, ancestor_id: &str) -> bool {
        self.ancestors.iter().any(|id| id == ancestor_id)
    }

    /// Whether this node sits directly below `parent_id`
    ///
    /// Passing [`ROOT_ID`] asks whether the node is a root.
    pub fn is_child_of(&self, parent_id: &str) -> bool {
        self.parent_ref() == parent_id
    }

    /// Chain a child of this node would carry
    pub fn child_ancestors(&self) -> Vec<String> {
        let mut chain = Vec::with_capacity(self.ancestors.len() + 1);
        chain.extend(self.ancestors.iter().cloned());
        chain.push(self.id.clone());
        chain
    }

    /// Check the node's own shape without consulting the store
    ///
    /// Rejects an empty or reserved id, a chain that references the node itself or
    /// the root sentinel, duplicate ancestor ids, and non-object properties.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::MissingField("id".to_string()));
        }

        if self.id == ROOT_ID {
            return Err(ValidationError::InvalidId(format!(
                "'{}' is reserved for the root sentinel",
                ROOT_ID
            )));
        }

        let mut seen = HashSet::with_capacity(self.ancestors.len());
        for ancestor in &self.ancestors {
            if ancestor == &self.id {
                return Err(ValidationError::InvalidAncestors(format!(
                    "node '{}' cannot be its own ancestor",
                    self.id
                )));
            }
            if ancestor == ROOT_ID || ancestor.trim().is_empty() {
                return Err(ValidationError::InvalidAncestors(format!(
                    "'{}' is not a valid ancestor id",
                    ancestor
                )));
            }
            if !seen.insert(ancestor.as_str()) {
                return Err(ValidationError::InvalidAncestors(format!(
                    "ancestor '{}' appears more than once",
                    ancestor
                )));
            }
        }

        if !(self.properties.is_object() || self.properties.is_null()) {
            return Err(ValidationError::InvalidProperties(
                "properties must be a JSON object".to_string(),
            ));
        }

        Ok(())
    }
}

/// Result of a remove operation
///
/// Removal is idempotent: removing an absent node succeeds with `existed = false`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RemoveResult {
    /// Whether the node existed before removal
    pub existed: bool,

    /// Records removed, the node itself plus its descendants
    pub removed: u64,
}

impl RemoveResult {
    pub fn not_found() -> Self {
        Self {
            existed: false,
            removed: 0,
        }
    }

    pub fn removed(count: u64) -> Self {
        Self {
            existed: true,
            removed: count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chain(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parent_helpers() {
        let root = Node::new_with_id("1", json!({}));
        assert!(root.is_root());
        assert_eq!(root.parent_id(), None);
        assert_eq!(root.parent_ref(), ROOT_ID);
        assert!(root.is_child_of(ROOT_ID));

        let node = Node::new_with_id("3", json!({})).with_ancestors(chain(&["1", "2"]));
        assert_eq!(node.parent_id(), Some("2"));
        assert!(node.is_child_of("2"));
        assert!(!node.is_child_of("1"));
        assert!(node.is_descendant_of("1"));
        assert!(!node.is_descendant_of("3"));
        assert_eq!(node.child_ancestors(), chain(&["1", "2", "3"]));
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = Node::new(json!({}));
        let b = Node::new(json!({}));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_validate_rejects_reserved_id() {
        let err = Node::new_with_id(ROOT_ID, json!({})).validate().unwrap_err();
        assert_eq!(err.field(), "id");
    }

    #[test]
    fn test_validate_rejects_self_in_chain() {
        let node = Node::new_with_id("a", json!({})).with_ancestors(chain(&["x", "a"]));
        let err = node.validate().unwrap_err();
        assert!(matches!(err, ValidationError::InvalidAncestors(_)));
        assert!(err.to_field_map().contains_key("ancestors"));
    }

    #[test]
    fn test_validate_rejects_duplicates_and_sentinel() {
        let dup = Node::new_with_id("a", json!({})).with_ancestors(chain(&["x", "x"]));
        assert!(dup.validate().is_err());

        let sentinel = Node::new_with_id("a", json!({})).with_ancestors(chain(&[ROOT_ID]));
        assert!(sentinel.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_scalar_properties() {
        let node = Node::new_with_id("a", json!(42));
        assert_eq!(node.validate().unwrap_err().field(), "properties");
    }

    #[test]
    fn test_serialization_skips_disabled_caches() {
        let node = Node::new_with_id("a", json!({"k": 1}));
        let value = serde_json::to_value(&node).unwrap();
        assert!(value.get("childrenCount").is_none());
        assert!(value.get("children").is_none());
        assert_eq!(value["ancestors"], json!([]));

        let back: Node = serde_json::from_value(value).unwrap();
        assert_eq!(back, node);
    }
}
