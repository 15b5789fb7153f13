//! Hierarchy Node Data Structures
//!
//! This module defines `HierarchyNode`, the single entity of a curriculum tree,
//! together with the nested and flat shapes the engine returns and the input
//! types it accepts.
//!
//! # Shapes
//!
//! - **HierarchyNode**: one stored row, no relations attached
//! - **NodeTree**: a node with its full nested subtree (children behind `Arc`
//!   so snapshots can share untouched branches)
//! - **NodeWithRelations**: a node with its parent and direct children only
//!
//! # Examples
//!
//! ```rust
//! use syllabus_core::models::{HierarchyNode, NodeTree};
//!
//! let year = HierarchyNode::new("2024".to_string(), 1, "Year", None, 1);
//! let physics = HierarchyNode::new("Physics".to_string(), 2, "Subject", Some(year.id.clone()), 1);
//!
//! let tree = NodeTree::with_children(year, vec![NodeTree::leaf(physics)]);
//! assert_eq!(tree.children.len(), 1);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Validation errors for malformed node input
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Level {level} is outside the valid range 1..={max}")]
    LevelOutOfRange { level: i64, max: u8 },

    #[error("Field {field} must not be negative (got {value})")]
    NegativeValue { field: String, value: i64 },

    #[error("Duplicate id in batch: {0}")]
    DuplicateId(String),

    #[error("Unknown tree instance: {0}")]
    UnknownTreeInstance(String),
}

/// One entry of a fixed-depth curriculum tree.
///
/// # Fields
///
/// - `id`: UUID assigned at creation, immutable
/// - `name`: display label
/// - `level`: depth position (1 = root), immutable
/// - `node_type`: label derived from `level` and the tree instance, serialized as `type`
/// - `color`: optional display hint
/// - `order`: position among siblings (same `level` + `parent_id`)
/// - `parent_id`: `None` only for level-1 nodes
/// - `question_count`: meaningful only at the question level
/// - `is_published`: public visibility flag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyNode {
    pub id: String,

    pub name: String,

    pub level: u8,

    #[serde(rename = "type")]
    pub node_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    pub order: i64,

    pub parent_id: Option<String>,

    #[serde(default)]
    pub question_count: i64,

    #[serde(default)]
    pub is_published: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl HierarchyNode {
    /// Create a new unpublished node with a generated UUID
    pub fn new(
        name: String,
        level: u8,
        node_type: &str,
        parent_id: Option<String>,
        order: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            level,
            node_type: node_type.to_string(),
            color: None,
            order,
            parent_id,
            question_count: 0,
            is_published: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether `other` belongs to the same sibling group
    pub fn is_sibling_of(&self, other: &HierarchyNode) -> bool {
        self.level == other.level && self.parent_id == other.parent_id
    }

    /// Apply a partial update in place and bump `updated_at`
    pub fn apply_update(&mut self, update: &NodeUpdate) {
        if let Some(name) = &update.name {
            self.name = name.clone();
        }
        if let Some(color) = &update.color {
            self.color = color.clone();
        }
        if let Some(order) = update.order {
            self.order = order;
        }
        if let Some(count) = update.question_count {
            self.question_count = count;
        }
        if let Some(published) = update.is_published {
            self.is_published = published;
        }
        self.updated_at = Utc::now();
    }
}

/// A node with its full nested subtree attached.
///
/// Children are ordered by `order` ascending. They are stored behind `Arc`
/// so a rebuilt snapshot can reuse every branch it did not touch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeTree {
    #[serde(flatten)]
    pub node: HierarchyNode,

    #[serde(default)]
    pub children: Vec<Arc<NodeTree>>,
}

impl NodeTree {
    /// Tree node without children
    pub fn leaf(node: HierarchyNode) -> Self {
        Self {
            node,
            children: Vec::new(),
        }
    }

    pub fn with_children(node: HierarchyNode, children: Vec<NodeTree>) -> Self {
        Self {
            node,
            children: children.into_iter().map(Arc::new).collect(),
        }
    }

    /// Depth-first lookup of `id` in this subtree (including the root)
    pub fn find(&self, id: &str) -> Option<&NodeTree> {
        if self.node.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    /// Number of nodes below this one
    pub fn descendant_count(&self) -> usize {
        self.children
            .iter()
            .map(|child| 1 + child.descendant_count())
            .sum()
    }

    /// Visit every node of the subtree in depth-first pre-order
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a HierarchyNode)) {
        visit(&self.node);
        for child in &self.children {
            child.walk(visit);
        }
    }
}

/// A node with its parent and direct children, without deeper nesting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeWithRelations {
    #[serde(flatten)]
    pub node: HierarchyNode,

    pub parent: Option<HierarchyNode>,

    pub children: Vec<HierarchyNode>,
}

/// Input for creating a node.
///
/// `type`, `order` and `isPublished` are accepted so clients can send full
/// objects, but the engine ignores them: type comes from the level policy,
/// order from the sibling group and every node starts unpublished.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNodeInput {
    pub name: String,

    pub level: i64,

    #[serde(default)]
    pub parent_id: Option<String>,

    #[serde(default)]
    pub color: Option<String>,

    #[serde(default)]
    pub question_count: Option<i64>,

    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_published: Option<bool>,
}

impl CreateNodeInput {
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            level: 1,
            ..Default::default()
        }
    }

    pub fn child(name: impl Into<String>, level: i64, parent_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            level,
            parent_id: Some(parent_id.into()),
            ..Default::default()
        }
    }
}

/// Helper function for double-Option deserialization
fn deserialize_optional_field<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Some(Option::<T>::deserialize(deserializer)?))
}

/// Partial node update
///
/// Only `name`, `color`, `order` and `questionCount` can be changed by clients.
/// `level`, `parentId` and `type` are not part of the update shape at all.
///
/// `color` uses the double-Option pattern:
/// - `None`: leave unchanged
/// - `Some(None)`: clear the color
/// - `Some(Some(c))`: set the color
///
/// `is_published` is never read from the wire; the engine sets it only
/// through publish/unpublish.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_field"
    )]
    pub color: Option<Option<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_count: Option<i64>,

    #[serde(skip)]
    pub is_published: Option<bool>,
}

impl NodeUpdate {
    pub fn order(order: i64) -> Self {
        Self {
            order: Some(order),
            ..Default::default()
        }
    }

    pub fn published(is_published: bool) -> Self {
        Self {
            is_published: Some(is_published),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.color.is_none()
            && self.order.is_none()
            && self.question_count.is_none()
            && self.is_published.is_none()
    }
}

/// One `(id, order)` assignment of a batch reorder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderItem {
    pub id: String,
    pub order: i64,
}

impl ReorderItem {
    pub fn new(id: impl Into<String>, order: i64) -> Self {
        Self {
            id: id.into(),
            order,
        }
    }
}

/// Raw per-level aggregate returned by a store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelAggregate {
    pub level: u8,
    pub count: i64,
    pub total_questions: i64,
}

/// Per-level statistics annotated with the level's semantic type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelStats {
    pub level: u8,
    #[serde(rename = "type")]
    pub node_type: String,
    pub count: i64,
    pub total_questions: i64,
}

/// Parent constraint of a `NodeFilter`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ParentFilter {
    /// No constraint on the parent
    #[default]
    Any,
    /// Only nodes without a parent
    Root,
    /// Only direct children of the given node
    Id(String),
}

/// Filter for listing nodes; all set fields are combined with AND
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeFilter {
    pub level: Option<u8>,
    pub parent: ParentFilter,
    pub is_published: Option<bool>,
    pub ids: Option<Vec<String>>,
}

impl NodeFilter {
    pub fn level(level: u8) -> Self {
        Self {
            level: Some(level),
            ..Default::default()
        }
    }

    pub fn children_of(parent_id: impl Into<String>) -> Self {
        Self {
            parent: ParentFilter::Id(parent_id.into()),
            ..Default::default()
        }
    }

    /// Sibling group: same level and same parent
    pub fn siblings(level: u8, parent_id: Option<&str>) -> Self {
        Self {
            level: Some(level),
            parent: match parent_id {
                Some(id) => ParentFilter::Id(id.to_string()),
                None => ParentFilter::Root,
            },
            ..Default::default()
        }
    }

    pub fn published(mut self, is_published: bool) -> Self {
        self.is_published = Some(is_published);
        self
    }

    /// In-memory evaluation of the filter
    pub fn matches(&self, node: &HierarchyNode) -> bool {
        if let Some(level) = self.level {
            if node.level != level {
                return false;
            }
        }
        match &self.parent {
            ParentFilter::Any => {}
            ParentFilter::Root => {
                if node.parent_id.is_some() {
                    return false;
                }
            }
            ParentFilter::Id(id) => {
                if node.parent_id.as_deref() != Some(id.as_str()) {
                    return false;
                }
            }
        }
        if let Some(published) = self.is_published {
            if node.is_published != published {
                return false;
            }
        }
        if let Some(ids) = &self.ids {
            if !ids.iter().any(|id| id == &node.id) {
                return false;
            }
        }
        true
    }
}

/// Sort nodes the way every listing returns them: `order`, then creation time
pub fn sort_by_order(nodes: &mut [HierarchyNode]) {
    nodes.sort_by(|a, b| {
        a.order
            .cmp(&b.order)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
}
