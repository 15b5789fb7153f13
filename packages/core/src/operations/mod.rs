//! Reorder Operations
//!
//! Drag-and-drop reordering of siblings on top of the hierarchy engine:
//!
//! - `plan_reorder` - pure, copy-on-write rebuild of a nested snapshot
//! - `ReorderQueue` - persists a plan with retry, reconciling on failure

pub mod error;
pub mod reorder;
pub mod reorder_queue;

pub use error::ReorderError;
pub use reorder::{array_move, into_forest, plan_reorder, Forest, ReorderPlan};
pub use reorder_queue::{
    ReorderOutcome, ReorderQueue, DEFAULT_REORDER_RETRIES, MAX_REORDER_RETRIES,
};
