//! Syllabus Core Business Logic Layer
//!
//! This crate provides the hierarchy engine behind curriculum navigation: fixed
//! depth trees (Year → Subject → Part → Section → Chapter for the question bank,
//! Exam → Year → Subject → Section → Chapter for previous papers) with ordered
//! siblings, publish state and per-chapter question counts.
//!
//! # Architecture
//!
//! - **One engine, many trees**: `HierarchyService` is parameterized by a
//!   `TreeInstanceConfig`; each instance owns its own table
//! - **Store trait**: persistence goes through `HierarchyStore` (libsql/Turso
//!   or in-memory)
//! - **Events**: every successful write is broadcast as a `HierarchyEvent`
//!
//! # Modules
//!
//! - [`models`] - Data structures (HierarchyNode, NodeTree, TreeInstanceConfig)
//! - [`services`] - The hierarchy engine and its events
//! - [`operations`] - Drag-and-drop reorder planning and persistence
//! - [`db`] - Store trait, in-memory store and libsql integration
//! - [`config`] / [`logging`] - Runtime configuration and tracing setup

pub mod config;
pub mod db;
pub mod logging;
pub mod models;
pub mod operations;
pub mod services;

// Re-export commonly used types
pub use models::*;
pub use services::*;
