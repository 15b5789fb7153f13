//! Service bundle for all shipped tree instances
//!
//! Each tree instance gets its own store (its own table) and its own
//! `HierarchyService`, so the two trees never see each other's nodes.

use crate::db::{HierarchyStore, MemoryStore};
use crate::models::TreeInstance;
use crate::services::HierarchyService;
use std::sync::Arc;

#[cfg(feature = "turso")]
use crate::db::{DatabaseService, TursoStore};

/// One `HierarchyService` per tree instance
#[derive(Debug, Clone)]
pub struct HierarchyServices {
    question_bank: HierarchyService,
    previous_papers: HierarchyService,
}

impl HierarchyServices {
    /// Build the bundle from a store factory called once per instance
    pub fn from_stores<F>(mut make_store: F) -> Self
    where
        F: FnMut(TreeInstance) -> Arc<dyn HierarchyStore>,
    {
        let question_bank = HierarchyService::new(
            make_store(TreeInstance::QuestionBank),
            TreeInstance::QuestionBank.config(),
        );
        let previous_papers = HierarchyService::new(
            make_store(TreeInstance::PreviousPapers),
            TreeInstance::PreviousPapers.config(),
        );
        Self {
            question_bank,
            previous_papers,
        }
    }

    /// Ephemeral services backed by `MemoryStore`
    pub fn in_memory() -> Self {
        Self::from_stores(|_| Arc::new(MemoryStore::new()))
    }

    /// Services backed by the tables of one libsql database
    #[cfg(feature = "turso")]
    pub fn with_database(db: Arc<DatabaseService>) -> Self {
        Self::from_stores(|instance| Arc::new(TursoStore::new(db.clone(), instance.config())))
    }

    pub fn for_instance(&self, instance: TreeInstance) -> &HierarchyService {
        match instance {
            TreeInstance::QuestionBank => &self.question_bank,
            TreeInstance::PreviousPapers => &self.previous_papers,
        }
    }

    pub fn question_bank(&self) -> &HierarchyService {
        &self.question_bank
    }

    pub fn previous_papers(&self) -> &HierarchyService {
        &self.previous_papers
    }
}
