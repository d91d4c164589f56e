//! Plan updater port.
//!
//! The engine never writes plan files. It emits state-change events; the
//! updater is responsible for serializing its own writes so concurrent
//! task completions cannot corrupt the persisted plan.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{AttemptRecord, TaskId, TaskStatus};

/// Receives task state-change events.
#[async_trait]
pub trait PlanUpdater: Send + Sync {
    /// Called after every task status change. `attempt` is present for
    /// changes produced by an execution attempt.
    async fn task_updated(
        &self,
        task_id: TaskId,
        status: TaskStatus,
        attempt: Option<&AttemptRecord>,
    ) -> DomainResult<()>;
}

/// Updater that drops every event.
#[derive(Debug, Clone, Default)]
pub struct NullPlanUpdater;

#[async_trait]
impl PlanUpdater for NullPlanUpdater {
    async fn task_updated(
        &self,
        _task_id: TaskId,
        _status: TaskStatus,
        _attempt: Option<&AttemptRecord>,
    ) -> DomainResult<()> {
        Ok(())
    }
}
