//! Reorder persistence with retry and reconciliation
//!
//! A planned move is shown optimistically before it is written. This queue
//! persists the plan through `HierarchyService::reorder`:
//!
//! - store failures are retried with exponential backoff (10ms, 20ms, 40ms, ...)
//! - if the store keeps failing, or the engine rejects the batch (a sibling was
//!   deleted or moved meanwhile), the authoritative tree is re-fetched and
//!   returned as `ReorderOutcome::Reconciled` so the caller can replace its
//!   optimistic snapshot
//!
//! # Example
//!
//! ```rust,no_run
//! use syllabus_core::operations::{into_forest, ReorderOutcome, ReorderQueue};
//! use std::sync::Arc;
//!
//! # async fn example(service: Arc<syllabus_core::services::HierarchyService>) -> anyhow::Result<()> {
//! let queue = ReorderQueue::new(service.clone(), 3);
//! let snapshot = into_forest(service.find_all().await?);
//!
//! match queue.move_item(&snapshot, "active-id", "over-id").await? {
//!     ReorderOutcome::Persisted { tree } => println!("{} roots", tree.len()),
//!     ReorderOutcome::Reconciled { tree, error } => {
//!         eprintln!("reorder rolled back: {}", error);
//!         println!("{} roots", tree.len());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use crate::models::NodeTree;
use crate::operations::reorder::{into_forest, plan_reorder, Forest, ReorderPlan};
use crate::operations::ReorderError;
use crate::services::{HierarchyService, HierarchyServiceError};
use std::sync::Arc;
use tokio::time::Duration;

/// Default retry budget for store failures
pub const DEFAULT_REORDER_RETRIES: usize = 3;

/// Largest accepted retry budget
pub const MAX_REORDER_RETRIES: usize = 10;

/// Upper bound for a single backoff sleep
const MAX_BACKOFF_MS: u64 = 1_000;

/// Exponential backoff: 10ms, 20ms, 40ms, ... capped at `MAX_BACKOFF_MS`
fn backoff_delay(attempt: usize) -> Duration {
    let backoff_ms = 1u64
        .checked_shl(attempt as u32)
        .and_then(|factor| factor.checked_mul(10))
        .map_or(MAX_BACKOFF_MS, |ms| ms.min(MAX_BACKOFF_MS));
    Duration::from_millis(backoff_ms)
}

/// How a reorder ended
#[derive(Debug)]
pub enum ReorderOutcome {
    /// The plan was written; `tree` is the optimistic snapshot
    Persisted { tree: Forest },

    /// The plan was not written; `tree` is freshly fetched from the store
    Reconciled {
        tree: Forest,
        error: HierarchyServiceError,
    },
}

impl ReorderOutcome {
    pub fn tree(&self) -> &Forest {
        match self {
            ReorderOutcome::Persisted { tree } | ReorderOutcome::Reconciled { tree, .. } => tree,
        }
    }

    pub fn is_persisted(&self) -> bool {
        matches!(self, ReorderOutcome::Persisted { .. })
    }
}

/// Persists planned reorders for one tree instance
pub struct ReorderQueue {
    service: Arc<HierarchyService>,
    max_retries: usize,
}

impl ReorderQueue {
    /// `max_retries` counts retries after the first attempt (0 = single attempt),
    /// clamped to `MAX_REORDER_RETRIES`
    pub fn new(service: Arc<HierarchyService>, max_retries: usize) -> Self {
        Self {
            service,
            max_retries: max_retries.min(MAX_REORDER_RETRIES),
        }
    }

    /// Plan and persist moving `active_id` onto `over_id`'s position
    ///
    /// Planning errors (unknown id, cross-branch drop) are returned as is and
    /// nothing is written.
    pub async fn move_item(
        &self,
        snapshot: &[Arc<NodeTree>],
        active_id: &str,
        over_id: &str,
    ) -> Result<ReorderOutcome, ReorderError> {
        let plan = plan_reorder(snapshot, active_id, over_id)?;
        self.persist(plan).await
    }

    /// Persist an already planned move
    pub async fn persist(&self, plan: ReorderPlan) -> Result<ReorderOutcome, ReorderError> {
        if plan.is_noop() {
            return Ok(ReorderOutcome::Persisted { tree: plan.tree });
        }

        let mut attempt = 0;
        loop {
            match self.service.reorder(plan.siblings.clone()).await {
                Ok(_) => {
                    if attempt > 0 {
                        tracing::debug!(
                            tree = self.service.config().key,
                            "Reorder persisted after {} retry(ies)",
                            attempt
                        );
                    }
                    return Ok(ReorderOutcome::Persisted { tree: plan.tree });
                }

                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    tracing::debug!(
                        tree = self.service.config().key,
                        "Reorder attempt {}/{} failed: {}. Retrying...",
                        attempt + 1,
                        self.max_retries + 1,
                        e
                    );

                    tokio::time::sleep(backoff_delay(attempt)).await;

                    attempt += 1;
                    continue;
                }

                Err(e) => return self.reconcile(e).await,
            }
        }
    }

    async fn reconcile(&self, error: HierarchyServiceError) -> Result<ReorderOutcome, ReorderError> {
        tracing::warn!(
            tree = self.service.config().key,
            error = %error,
            "Reorder not persisted, re-fetching authoritative tree"
        );
        let fresh = self
            .service
            .find_all()
            .await
            .map_err(ReorderError::ReconcileFailed)?;

        Ok(ReorderOutcome::Reconciled {
            tree: into_forest(fresh),
            error,
        })
    }
}
