//! Domain Events for the Hierarchy Engine
//!
//! `HierarchyService` emits one event after each successful write, using a
//! tokio broadcast channel so any number of observers (a live-update
//! transport, a cache invalidator) can follow changes without coupling to the
//! engine.
//!
//! # Event Flow
//!
//! 1. The engine validates and persists a change
//! 2. A `HierarchyEvent` is sent on the broadcast channel
//! 3. Subscribers receive it asynchronously; lagging subscribers drop old events

use crate::models::{HierarchyNode, ReorderItem};
use serde::Serialize;

/// What changed
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum HierarchyChange {
    NodeCreated { node: HierarchyNode },

    NodeUpdated { node: HierarchyNode },

    NodeDeleted { id: String },

    /// A batch of order assignments was applied
    SiblingsReordered { items: Vec<ReorderItem> },

    /// Publish state changed for `ids` (one id on publish, a subtree on unpublish)
    PublishStateChanged { ids: Vec<String>, is_published: bool },
}

impl HierarchyChange {
    /// Short name, handy for logs and metrics labels
    pub fn event_type(&self) -> &'static str {
        match self {
            HierarchyChange::NodeCreated { .. } => "node_created",
            HierarchyChange::NodeUpdated { .. } => "node_updated",
            HierarchyChange::NodeDeleted { .. } => "node_deleted",
            HierarchyChange::SiblingsReordered { .. } => "siblings_reordered",
            HierarchyChange::PublishStateChanged { .. } => "publish_state_changed",
        }
    }
}

/// Envelope broadcast to subscribers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyEvent {
    /// Tree instance key (`question-bank`, `previous-papers`)
    pub tree: &'static str,

    /// Client that caused the change, so it can ignore its own echoes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_client_id: Option<String>,

    pub change: HierarchyChange,
}
