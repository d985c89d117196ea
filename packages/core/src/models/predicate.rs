//! Store Predicates
//!
//! The closed predicate vocabulary the tree engine emits against a store:
//! exact match, not-equal, set membership, array containment, array length
//! equality, and conjunction/disjunction. Backends translate these into their
//! own query language; [`Predicate::matches`] is the reference evaluation they
//! must agree with.
//!
//! # Examples
//!
//! ```rust
//! use mpath_core::models::{Field, Node, Predicate};
//! use serde_json::json;
//!
//! // Grandchildren of node "1" (which is a root)
//! let predicate = Predicate::ancestors_contain("1").and(Predicate::depth(2));
//!
//! let node = Node::new_with_id("3", json!({}))
//!     .with_ancestors(vec!["1".to_string(), "2".to_string()]);
//! assert!(predicate.matches(&node));
//! ```

use super::node::Node;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Node field addressed by a predicate or a projection
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Id,
    Ancestors,
    Children,
    /// Top-level key inside `properties`
    Property(String),
}

impl Field {
    /// Read the field from a node as a JSON value (`Null` when absent)
    pub fn read(&self, node: &Node) -> Value {
        match self {
            Field::Id => Value::String(node.id.clone()),
            Field::Ancestors => Value::Array(
                node.ancestors
                    .iter()
                    .map(|id| Value::String(id.clone()))
                    .collect(),
            ),
            Field::Children => match &node.children {
                Some(children) => Value::Array(
                    children
                        .iter()
                        .map(|id| Value::String(id.clone()))
                        .collect(),
                ),
                None => Value::Null,
            },
            Field::Property(key) => node.properties.get(key).cloned().unwrap_or(Value::Null),
        }
    }
}

/// Filter over nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Predicate {
    /// Field equals value
    Eq { field: Field, value: Value },
    /// Field differs from value
    Ne { field: Field, value: Value },
    /// Field is one of the values
    In { field: Field, values: Vec<Value> },
    /// Array field contains value
    Contains { field: Field, value: Value },
    /// Array field has exactly `len` elements
    LenEq { field: Field, len: usize },
    /// Every predicate holds (empty = always true)
    And { all: Vec<Predicate> },
    /// At least one predicate holds (empty = never true)
    Or { any: Vec<Predicate> },
}

impl Predicate {
    /// Node with the given id
    pub fn id(id: impl Into<String>) -> Self {
        Predicate::Eq {
            field: Field::Id,
            value: Value::String(id.into()),
        }
    }

    /// Nodes whose id is one of `ids`
    pub fn id_in<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Predicate::In {
            field: Field::Id,
            values: ids.into_iter().map(|id| Value::String(id.into())).collect(),
        }
    }

    /// Every node except the given one
    pub fn id_ne(id: impl Into<String>) -> Self {
        Predicate::Ne {
            field: Field::Id,
            value: Value::String(id.into()),
        }
    }

    /// Descendants of `id` at any depth
    pub fn ancestors_contain(id: impl Into<String>) -> Self {
        Predicate::Contains {
            field: Field::Ancestors,
            value: Value::String(id.into()),
        }
    }

    /// Nodes at exactly the given depth
    pub fn depth(depth: usize) -> Self {
        Predicate::LenEq {
            field: Field::Ancestors,
            len: depth,
        }
    }

    /// Nodes without ancestors
    pub fn roots() -> Self {
        Self::depth(0)
    }

    /// Matches every node
    pub fn everything() -> Self {
        Predicate::And { all: Vec::new() }
    }

    /// Matches no node
    pub fn nothing() -> Self {
        Predicate::Or { any: Vec::new() }
    }

    /// Conjunction, flattening nested `And`s
    pub fn and(self, other: Predicate) -> Self {
        match (self, other) {
            (Predicate::And { mut all }, Predicate::And { all: rest }) => {
                all.extend(rest);
                Predicate::And { all }
            }
            (Predicate::And { mut all }, other) => {
                all.push(other);
                Predicate::And { all }
            }
            (this, Predicate::And { mut all }) => {
                all.insert(0, this);
                Predicate::And { all }
            }
            (this, other) => Predicate::And {
                all: vec![this, other],
            },
        }
    }

    /// Disjunction of every predicate in `any`
    pub fn any_of(any: Vec<Predicate>) -> Self {
        Predicate::Or { any }
    }

    /// Reference evaluation against a node
    pub fn matches(&self, node: &Node) -> bool {
        match self {
            Predicate::Eq { field, value } => &field.read(node) == value,
            Predicate::Ne { field, value } => &field.read(node) != value,
            Predicate::In { field, values } => {
                let actual = field.read(node);
                values.iter().any(|v| v == &actual)
            }
            Predicate::Contains { field, value } => match field.read(node) {
                Value::Array(items) => items.iter().any(|item| item == value),
                _ => false,
            },
            Predicate::LenEq { field, len } => match field.read(node) {
                Value::Array(items) => items.len() == *len,
                _ => false,
            },
            Predicate::And { all } => all.iter().all(|p| p.matches(node)),
            Predicate::Or { any } => any.iter().any(|p| p.matches(node)),
        }
    }
}

/// One or more relative depths below a node
///
/// `Levels::from(1)` addresses immediate children; `Levels::from(vec![1, 2])`
/// children and grandchildren.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Levels(pub Vec<usize>);

impl From<usize> for Levels {
    fn from(level: usize) -> Self {
        Levels(vec![level])
    }
}

impl From<Vec<usize>> for Levels {
    fn from(levels: Vec<usize>) -> Self {
        Levels(levels)
    }
}

impl From<&[usize]> for Levels {
    fn from(levels: &[usize]) -> Self {
        Levels(levels.to_vec())
    }
}

/// A predicate plus read options, as handed to a store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeQuery {
    pub predicate: Predicate,

    /// Fields to return besides `id` (`None` returns whole records)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection: Option<Vec<Field>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl NodeQuery {
    pub fn new(predicate: Predicate) -> Self {
        Self {
            predicate,
            projection: None,
            limit: None,
        }
    }

    pub fn by_id(id: impl Into<String>) -> Self {
        Self::new(Predicate::id(id))
    }

    pub fn with_projection(mut self, fields: Vec<Field>) -> Self {
        self.projection = Some(fields);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Strip the fields a projection leaves out; `id` and timestamps always survive
    pub fn project(&self, mut node: Node) -> Node {
        let Some(fields) = &self.projection else {
            return node;
        };

        if !fields.contains(&Field::Ancestors) {
            node.ancestors = Vec::new();
            node.ancestors_count = None;
        }
        if !fields.contains(&Field::Children) {
            node.children = None;
            node.children_count = None;
        }

        let keep: Vec<&String> = fields
            .iter()
            .filter_map(|f| match f {
                Field::Property(key) => Some(key),
                _ => None,
            })
            .collect();
        node.properties = match node.properties {
            Value::Object(map) if !keep.is_empty() => Value::Object(
                map.into_iter()
                    .filter(|(key, _)| keep.contains(&key))
                    .collect(),
            ),
            _ => Value::Null,
        };

        node
    }
}
