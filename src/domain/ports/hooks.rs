//! Optional execution hooks: pre-wave failure prediction and
//! rate-limit pause/resume.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Task, TaskId};

/// A predicted failure returned by the pre-wave gate.
#[derive(Debug, Clone)]
pub struct PredictedFailure {
    pub task_id: TaskId,
    pub reason: String,
}

/// Pre-wave failure-prediction gate.
///
/// Consulted before a wave is dispatched; may mark specific tasks
/// blocked with a predicted-failure reason. The coordinator treats any
/// error from this hook as "no predictions" - the gate fails open and
/// never blocks a wave.
#[async_trait]
pub trait FailureGate: Send + Sync {
    async fn assess(&self, tasks: &[Task]) -> DomainResult<Vec<PredictedFailure>>;
}

/// Gate that predicts nothing.
#[derive(Debug, Clone, Default)]
pub struct NullFailureGate;

#[async_trait]
impl FailureGate for NullFailureGate {
    async fn assess(&self, _tasks: &[Task]) -> DomainResult<Vec<PredictedFailure>> {
        Ok(Vec::new())
    }
}

/// Rate-limit pause/resume hook.
///
/// The dispatch unit consults this when a worker invocation signals a
/// backoff condition. Implementations may pause the caller until the
/// condition clears. Errors are logged and ignored (fail open).
#[async_trait]
pub trait PauseHook: Send + Sync {
    /// Called when `worker` signaled a backoff condition. Returns when
    /// the caller may retry the invocation.
    async fn on_backoff(&self, worker: &str) -> DomainResult<()>;
}

/// Hook that resumes immediately.
#[derive(Debug, Clone, Default)]
pub struct NullPauseHook;

#[async_trait]
impl PauseHook for NullPauseHook {
    async fn on_backoff(&self, _worker: &str) -> DomainResult<()> {
        Ok(())
    }
}
