//! Reviewer port - interface for quality reviewers.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::Task;

/// A reviewer judges a task's output.
///
/// Reviewers return raw response text; parsing and aggregation are the
/// verdict engine's job, so an unparseable response can fail closed
/// instead of erroring out of the pipeline.
#[async_trait]
pub trait Reviewer: Send + Sync {
    /// Name recorded against this reviewer's judgments.
    fn name(&self) -> &str;

    /// Review a task's output. For tasks with criteria the reviewer is
    /// expected to judge each criterion individually; for tasks without
    /// criteria it returns a single blob verdict.
    async fn review(&self, task: &Task, output: &str) -> DomainResult<String>;
}
