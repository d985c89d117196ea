//! Tree Engine Error Types
//!
//! Every engine operation fails with a [`TreeError`] carrying one of four
//! discriminator codes:
//!
//! - `INVALID` - malformed request (self-parenting move, bad chain shape, ...),
//!   with a field→reason map
//! - `NOTFOUND` - the node or the parent it references no longer exists, or a
//!   conditional write by id affected nothing
//! - `EXECFAIL` - a store operation failed inside the engine's own logic
//!   (unresolvable or inconsistent ancestors, failed cascade or child-ref write)
//! - `CONNFAIL` - the store was unreachable; the store error is passed through
//!
//! Store errors stay reachable through `std::error::Error::source`.

use crate::db::StoreError;
use crate::models::ValidationError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Discriminator code of a [`TreeError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorCode {
    #[serde(rename = "INVALID")]
    Invalid,
    #[serde(rename = "NOTFOUND")]
    NotFound,
    #[serde(rename = "EXECFAIL")]
    ExecFail,
    #[serde(rename = "CONNFAIL")]
    ConnFail,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Invalid => "INVALID",
            ErrorCode::NotFound => "NOTFOUND",
            ErrorCode::ExecFail => "EXECFAIL",
            ErrorCode::ConnFail => "CONNFAIL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tree engine errors
#[derive(Error, Debug)]
pub enum TreeError {
    /// Structurally malformed request
    #[error("Invalid request: {message}")]
    Invalid {
        message: String,
        fields: BTreeMap<String, String>,
    },

    /// Node (or referenced parent) does not exist
    #[error("Node not found: {id}")]
    NotFound { id: String },

    /// Store operation failed for a reason internal to the engine's logic
    #[error("Execution failed: {context}")]
    ExecFailed {
        context: String,
        #[source]
        source: Option<StoreError>,
    },

    /// Store unreachable
    #[error("Store connection failed: {0}")]
    ConnFailed(#[source] StoreError),
}

impl TreeError {
    /// Create an invalid-request error without field details
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Create an invalid-request error blaming a single field
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        let mut fields = BTreeMap::new();
        fields.insert(field.into(), reason.clone());
        Self::Invalid {
            message: reason,
            fields,
        }
    }

    /// Create a not-found error
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Create an execution failure that did not originate in the store
    pub fn exec_failed(context: impl Into<String>) -> Self {
        Self::ExecFailed {
            context: context.into(),
            source: None,
        }
    }

    /// Wrap a store error with the step that was running
    ///
    /// Connection failures pass through unchanged as `CONNFAIL`.
    pub fn store(context: impl Into<String>, err: StoreError) -> Self {
        if err.is_connection() {
            return Self::ConnFailed(err);
        }
        Self::ExecFailed {
            context: context.into(),
            source: Some(err),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            TreeError::Invalid { .. } => ErrorCode::Invalid,
            TreeError::NotFound { .. } => ErrorCode::NotFound,
            TreeError::ExecFailed { .. } => ErrorCode::ExecFail,
            TreeError::ConnFailed(_) => ErrorCode::ConnFail,
        }
    }

    /// Field-level details; empty for everything but `INVALID`
    pub fn fields(&self) -> BTreeMap<String, String> {
        match self {
            TreeError::Invalid { fields, .. } => fields.clone(),
            _ => BTreeMap::new(),
        }
    }

    /// User-facing rendering of the error
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code(),
            message: self.to_string(),
            fields: self.fields(),
        }
    }
}

impl From<StoreError> for TreeError {
    fn from(err: StoreError) -> Self {
        TreeError::store("store operation failed", err)
    }
}

impl From<ValidationError> for TreeError {
    fn from(err: ValidationError) -> Self {
        TreeError::Invalid {
            message: err.to_string(),
            fields: err.to_field_map(),
        }
    }
}

/// Serializable error payload for surfacing to callers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
}
