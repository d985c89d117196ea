//! Store Error Types
//!
//! This module defines the errors a [`NodeStore`](super::NodeStore) backend reports.
//! The tree engine maps them onto its own taxonomy: connection failures bubble up
//! unchanged, everything else becomes an execution failure.

use thiserror::Error;

/// Store operation errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backing store could not be reached
    #[error("Store unreachable: {message}")]
    ConnectionFailed { message: String },

    /// A query or write was rejected by the backend
    #[error("Store operation failed: {context}")]
    QueryFailed { context: String },

    /// Insert collided with an existing record
    #[error("Duplicate node id: {id}")]
    DuplicateId { id: String },

    /// Record could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Create a connection failed error
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            message: message.into(),
        }
    }

    /// Create a query failed error
    pub fn query_failed(context: impl Into<String>) -> Self {
        Self::QueryFailed {
            context: context.into(),
        }
    }

    /// Create a duplicate id error
    pub fn duplicate_id(id: impl Into<String>) -> Self {
        Self::DuplicateId { id: id.into() }
    }

    /// Whether the error means the store itself is unavailable
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::ConnectionFailed { .. })
    }
}
