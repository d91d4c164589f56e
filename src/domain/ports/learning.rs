//! Learning store port.
//!
//! The store is process-wide mutable state with an explicit lifecycle:
//! opened at run start, passed into the engine as a dependency, flushed
//! at run end. Store failures must never block the pipeline - callers
//! degrade to no-history behavior.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{FailurePattern, LearningRecord, TaskId};

/// Append-only attempt history with aggregate queries.
#[async_trait]
pub trait LearningStore: Send + Sync {
    /// Append one attempt record. Ordered per task: attempt *n* is
    /// recorded before attempt *n+1* begins.
    async fn append(&self, record: LearningRecord) -> DomainResult<()>;

    /// Number of recorded failures for this task with this worker.
    async fn failure_count(&self, task_id: TaskId, worker: &str) -> DomainResult<u32>;

    /// Best-performing worker among records carrying the given pattern,
    /// ranked by success rate. `None` when no worker has a recorded
    /// success for the pattern.
    async fn best_worker_for_pattern(
        &self,
        pattern: FailurePattern,
    ) -> DomainResult<Option<String>>;

    /// Highest run number seen so far (0 when empty).
    async fn last_run_number(&self) -> DomainResult<u32>;
}

/// Null store: remembers nothing, suggests nothing.
///
/// Used when learning is disabled or the real store failed to open;
/// the retry loop then makes no history-based decisions.
#[derive(Debug, Clone, Default)]
pub struct NullLearningStore;

#[async_trait]
impl LearningStore for NullLearningStore {
    async fn append(&self, _record: LearningRecord) -> DomainResult<()> {
        Ok(())
    }

    async fn failure_count(&self, _task_id: TaskId, _worker: &str) -> DomainResult<u32> {
        Ok(0)
    }

    async fn best_worker_for_pattern(
        &self,
        _pattern: FailurePattern,
    ) -> DomainResult<Option<String>> {
        Ok(None)
    }

    async fn last_run_number(&self) -> DomainResult<u32> {
        Ok(0)
    }
}
