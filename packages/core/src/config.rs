/// Configuration for a tree model type
use serde::{Deserialize, Serialize};

/// Cache and cascade settings, resolved once per model type.
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```rust
/// use mpath_core::config::TreeOptions;
///
/// let options = TreeOptions::from_json_str(r#"{ "storeChildren": true }"#).unwrap();
/// assert!(options.store_children);
/// assert!(!options.store_children_count);
/// assert!(options.store_ancestors_count);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TreeOptions {
    /// Persist the immediate-child id list on parents
    pub store_children: bool,

    /// Persist the immediate-child count on parents
    pub store_children_count: bool,

    /// Persist the chain length next to the chain
    pub store_ancestors_count: bool,

    /// Require every ancestor's own chain to equal the matching prefix of the
    /// proposed chain (positional check) instead of only checking that chain
    /// lengths grow by one
    pub strict_path_validation: bool,

    /// Descendant rewrites kept in flight during a move cascade (1 = sequential)
    pub cascade_concurrency: usize,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            store_children: false,
            store_children_count: false,
            store_ancestors_count: true,
            strict_path_validation: true,
            cascade_concurrency: 1,
        }
    }
}

impl TreeOptions {
    /// Options with every cache enabled
    pub fn all_caches() -> Self {
        Self {
            store_children: true,
            store_children_count: true,
            ..Self::default()
        }
    }

    /// Parse options from JSON, filling in defaults for missing keys
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Whether any child-reference cache is maintained
    pub fn tracks_children(&self) -> bool {
        self.store_children || self.store_children_count
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.cascade_concurrency == 0 {
            return Err("cascade_concurrency must be at least 1".to_string());
        }
        Ok(())
    }
}
