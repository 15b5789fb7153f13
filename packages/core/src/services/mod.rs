//! Business Services
//!
//! This module contains the hierarchy engine:
//!
//! - `HierarchyService` - invariant-enforcing reads and writes for one tree instance
//! - `HierarchyServices` - one service per shipped tree instance
//! - `HierarchyEvent` - change notifications broadcast after each write
//!
//! Services coordinate between the store layer and callers, implementing the
//! tree rules (level/parent consistency, sibling ordering, publish cascade).

pub mod error;
pub mod events;
pub mod hierarchy_service;
pub mod registry;

#[cfg(test)]
mod hierarchy_service_test;

pub use error::{ErrorKind, HierarchyServiceError};
pub use events::{HierarchyChange, HierarchyEvent};
pub use hierarchy_service::HierarchyService;
pub use registry::HierarchyServices;
