//! Error types for drag-and-drop reordering
//!
//! Planning a move is pure and fails only on ids it cannot place. Persistence
//! failures are not errors here: the queue reconciles them into an outcome.

use crate::services::HierarchyServiceError;
use thiserror::Error;

/// Errors that can occur while planning or reconciling a reorder
///
/// # Examples
///
/// ```rust
/// use syllabus_core::operations::ReorderError;
///
/// let err = ReorderError::cross_branch("physics".to_string(), "2025".to_string());
/// assert!(err.to_string().contains("not supported"));
/// ```
#[derive(Error, Debug)]
pub enum ReorderError {
    /// Dragged or target id is not present in the snapshot
    #[error("Item '{id}' is not in the current tree")]
    ItemNotFound { id: String },

    /// Dragged and target items belong to different sibling groups
    ///
    /// Moving a node under another parent or to another level is not a
    /// reorder; the snapshot is left untouched.
    #[error("Moving '{active_id}' next to '{over_id}' crosses branches, which is not supported")]
    CrossBranch { active_id: String, over_id: String },

    /// Persisting failed and the authoritative tree could not be re-fetched
    #[error("Failed to re-fetch the tree after a rejected reorder: {0}")]
    ReconcileFailed(#[source] HierarchyServiceError),
}

impl ReorderError {
    pub fn item_not_found(id: String) -> Self {
        Self::ItemNotFound { id }
    }

    pub fn cross_branch(active_id: String, over_id: String) -> Self {
        Self::CrossBranch { active_id, over_id }
    }
}
