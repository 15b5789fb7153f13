//! Service Layer Error Types
//!
//! The hierarchy engine reports every failure as one of three business kinds
//! (`NotFound`, `InvalidArgument`, `InvalidState`) or as a store failure.
//! A transport layer maps `ErrorKind` to its own status codes.

use crate::models::ValidationError;
use serde::Serialize;
use thiserror::Error;

/// Coarse classification of a service error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    InvalidArgument,
    InvalidState,
    Store,
}

/// Hierarchy engine errors
#[derive(Error, Debug)]
pub enum HierarchyServiceError {
    /// Referenced node or parent does not exist
    #[error("Node not found: {id}")]
    NodeNotFound { id: String },

    /// Malformed input (level out of range, negative count, missing field)
    #[error("Invalid argument: {0}")]
    InvalidArgument(#[from] ValidationError),

    /// Operation would break a tree invariant
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The backing store failed
    #[error("Store operation failed: {0}")]
    Store(#[source] anyhow::Error),
}

impl HierarchyServiceError {
    pub fn node_not_found(id: impl Into<String>) -> Self {
        Self::NodeNotFound { id: id.into() }
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::InvalidArgument(ValidationError::MissingField(field.into()))
    }

    pub fn negative_value(field: impl Into<String>, value: i64) -> Self {
        Self::InvalidArgument(ValidationError::NegativeValue {
            field: field.into(),
            value,
        })
    }

    pub fn store(err: anyhow::Error) -> Self {
        Self::Store(err)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NodeNotFound { .. } => ErrorKind::NotFound,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::Store(_) => ErrorKind::Store,
        }
    }

    /// Whether retrying the same call could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}
