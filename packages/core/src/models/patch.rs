//! Node Patches
//!
//! A sparse description of the changes an update applies to every matched node.
//! Only provided fields are touched.

use super::node::Node;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sparse update applied by [`NodeStore::update`](crate::db::NodeStore::update)
///
/// # Examples
///
/// ```rust
/// use mpath_core::models::NodePatch;
///
/// // Record a new immediate child and bump the cached count
/// let patch = NodePatch::new()
///     .with_push_child("child-1".to_string())
///     .with_children_count_delta(1);
/// assert!(patch.touches_children());
/// assert!(!patch.touches_ancestors());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePatch {
    /// Replace the ancestor chain
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ancestors: Option<Vec<String>>,

    /// Replace the cached chain length
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ancestors_count: Option<usize>,

    /// Append to the cached children list (creates the list if absent)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_child: Option<String>,

    /// Remove every occurrence from the cached children list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull_child: Option<String>,

    /// Signed increment of the cached children count, saturating at zero
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children_count_delta: Option<i64>,

    /// Shallow merge into `properties`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Value>,
}

impl NodePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ancestors(mut self, ancestors: Vec<String>) -> Self {
        self.ancestors = Some(ancestors);
        self
    }

    pub fn with_ancestors_count(mut self, count: usize) -> Self {
        self.ancestors_count = Some(count);
        self
    }

    pub fn with_push_child(mut self, child_id: String) -> Self {
        self.push_child = Some(child_id);
        self
    }

    pub fn with_pull_child(mut self, child_id: String) -> Self {
        self.pull_child = Some(child_id);
        self
    }

    pub fn with_children_count_delta(mut self, delta: i64) -> Self {
        self.children_count_delta = Some(delta);
        self
    }

    pub fn with_properties(mut self, properties: Value) -> Self {
        self.properties = Some(properties);
        self
    }

    /// Whether the patch changes nothing
    pub fn is_empty(&self) -> bool {
        self.ancestors.is_none()
            && self.ancestors_count.is_none()
            && self.push_child.is_none()
            && self.pull_child.is_none()
            && self.children_count_delta.is_none()
            && self.properties.is_none()
    }

    pub fn touches_ancestors(&self) -> bool {
        self.ancestors.is_some() || self.ancestors_count.is_some()
    }

    pub fn touches_children(&self) -> bool {
        self.push_child.is_some() || self.pull_child.is_some() || self.children_count_delta.is_some()
    }

    /// Reference semantics for applying the patch to a stored node
    pub fn apply(&self, node: &mut Node) {
        if let Some(ancestors) = &self.ancestors {
            node.ancestors = ancestors.clone();
        }
        if let Some(count) = self.ancestors_count {
            node.ancestors_count = Some(count);
        }
        if let Some(child) = &self.push_child {
            node.children.get_or_insert_with(Vec::new).push(child.clone());
        }
        if let Some(child) = &self.pull_child {
            if let Some(children) = node.children.as_mut() {
                children.retain(|id| id != child);
            }
        }
        if let Some(delta) = self.children_count_delta {
            let current = node.children_count.unwrap_or(0) as i64;
            node.children_count = Some((current + delta).max(0) as usize);
        }
        if let Some(updates) = &self.properties {
            merge_properties(&mut node.properties, updates);
        }
        node.modified_at = Utc::now();
    }
}

/// Shallow-merge `updates` into `target`; non-object updates replace the target
fn merge_properties(target: &mut Value, updates: &Value) {
    match (target.as_object_mut(), updates.as_object()) {
        (Some(existing), Some(incoming)) => {
            for (key, value) in incoming {
                existing.insert(key.clone(), value.clone());
            }
        }
        _ => *target = updates.clone(),
    }
}
