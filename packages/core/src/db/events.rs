//! Domain Events
//!
//! Events emitted by `TreeService` after a structural change has completed.
//! Subscribers receive them through a tokio broadcast channel, so other parts of
//! the system can react to tree changes without coupling to the engine.
//!
//! # Event Flow
//!
//! 1. `TreeService` performs an operation (create, update, move, remove)
//! 2. Only if every step succeeded, an event is sent on the broadcast channel
//! 3. All subscribers receive the event asynchronously

use crate::models::Node;
use serde::{Deserialize, Serialize};

/// A relocation of one node and its subtree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRelationship {
    pub node_id: String,
    /// Previous parent, `"root"` if the node was a root
    pub from_parent: String,
    /// New parent, `"root"` if the node became a root
    pub to_parent: String,
    /// Descendants whose chains were rewritten
    pub descendants: usize,
}

/// Domain events emitted by `TreeService`
#[derive(Debug, Clone)]
pub enum TreeEvent {
    /// A node was created
    NodeCreated {
        node: Node,
        source_client_id: Option<String>,
    },

    /// A node's properties were updated
    NodeUpdated {
        node: Node,
        source_client_id: Option<String>,
    },

    /// A node (with its subtree) moved under a new parent
    NodeMoved {
        node: Node,
        relationship: MoveRelationship,
        source_client_id: Option<String>,
    },

    /// A node and its descendants were removed
    SubtreeRemoved {
        id: String,
        removed: u64,
        source_client_id: Option<String>,
    },
}

impl TreeEvent {
    /// String form of the event type, for logging and wire protocols
    pub fn event_type(&self) -> &str {
        match self {
            TreeEvent::NodeCreated { .. } => "node:created",
            TreeEvent::NodeUpdated { .. } => "node:updated",
            TreeEvent::NodeMoved { .. } => "node:moved",
            TreeEvent::SubtreeRemoved { .. } => "subtree:removed",
        }
    }

    /// Client that caused the event, if the service was scoped to one
    pub fn source_client_id(&self) -> Option<&str> {
        match self {
            TreeEvent::NodeCreated {
                source_client_id, ..
            }
            | TreeEvent::NodeUpdated {
                source_client_id, ..
            }
            | TreeEvent::NodeMoved {
                source_client_id, ..
            }
            | TreeEvent::SubtreeRemoved {
                source_client_id, ..
            } => source_client_id.as_deref(),
        }
    }
}
