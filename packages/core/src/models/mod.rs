//! Data Models
//!
//! This module contains the data structures of the hierarchy engine:
//!
//! - `HierarchyNode` - one node of a fixed-depth curriculum tree
//! - `NodeTree` / `NodeWithRelations` - nested and flat read shapes
//! - `TreeInstanceConfig` - per-instance level/type policy

mod node;
mod tree_instance;

pub use node::{
    sort_by_order, CreateNodeInput, HierarchyNode, LevelAggregate, LevelStats, NodeFilter,
    NodeTree, NodeUpdate, NodeWithRelations, ParentFilter, ReorderItem, ValidationError,
};
pub use tree_instance::{TreeInstance, TreeInstanceConfig, PREVIOUS_PAPERS, QUESTION_BANK};
