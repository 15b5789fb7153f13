//! Persistence Layer
//!
//! The hierarchy engine talks to storage only through the `HierarchyStore`
//! trait. Two adapters ship with the crate:
//!
//! - `MemoryStore` - in-process map, used by tests and ephemeral setups
//! - `TursoStore` - libsql/Turso embedded database (feature `turso`, default)
//!
//! One store instance always backs exactly one tree instance.

mod memory_store;
mod node_store;

#[cfg(feature = "turso")]
mod database;
#[cfg(feature = "turso")]
mod error;
#[cfg(feature = "turso")]
mod turso_store;

pub use memory_store::MemoryStore;
pub use node_store::HierarchyStore;

#[cfg(feature = "turso")]
pub use database::DatabaseService;
#[cfg(feature = "turso")]
pub use error::DatabaseError;
#[cfg(feature = "turso")]
pub use turso_store::TursoStore;
