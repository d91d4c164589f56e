//! Reviewer adapter backed by a worker process.
//!
//! A reviewer is itself a registered worker: it receives a review
//! prompt on stdin and prints its judgment. The adapter only shapes the
//! prompt and returns the raw response; parsing stays in the verdict
//! engine so malformed responses fail closed there.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Task, WorkerRequest};
use crate::domain::ports::{Reviewer, WorkerInvoker, WorkerRegistry};

/// Reviewer that dispatches review prompts to a named worker.
pub struct WorkerReviewer {
    name: String,
    registry: Arc<dyn WorkerRegistry>,
    invoker: Arc<dyn WorkerInvoker>,
    timeout_secs: u64,
}

impl WorkerReviewer {
    pub fn new(
        name: impl Into<String>,
        registry: Arc<dyn WorkerRegistry>,
        invoker: Arc<dyn WorkerInvoker>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            name: name.into(),
            registry,
            invoker,
            timeout_secs,
        }
    }
}

#[async_trait]
impl Reviewer for WorkerReviewer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn review(&self, task: &Task, output: &str) -> DomainResult<String> {
        let handle = self
            .registry
            .resolve(&self.name)
            .await?
            .ok_or_else(|| DomainError::WorkerNotFound(self.name.clone()))?;

        let request = WorkerRequest {
            task_id: task.id,
            prompt: review_prompt(task, output),
            timeout_secs: self.timeout_secs,
        };

        let deadline = std::time::Duration::from_secs(self.timeout_secs);
        let invocation = tokio::time::timeout(
            deadline,
            self.invoker.invoke(&handle, request, CancellationToken::new()),
        )
        .await
        .map_err(|_| {
            DomainError::ReviewFailed(format!(
                "reviewer '{}' timed out after {}s",
                self.name, self.timeout_secs
            ))
        })??;

        if !invocation.succeeded() {
            return Err(DomainError::ReviewFailed(format!(
                "reviewer '{}' exited with code {:?}",
                self.name, invocation.exit_code
            )));
        }
        Ok(invocation.output)
    }
}

/// Shape the review prompt. With criteria the reviewer is asked for a
/// per-criterion JSON report; without, for a single blob verdict.
fn review_prompt(task: &Task, output: &str) -> String {
    let criteria = task.review_criteria();
    let mut prompt = String::new();

    prompt.push_str("You are reviewing the output of a task.\n\n");
    prompt.push_str(&format!("Task: {}\n", task.name));
    prompt.push_str(&format!("Instructions given to the worker:\n{}\n\n", task.prompt));
    prompt.push_str(&format!("Worker output:\n{output}\n\n"));

    if criteria.is_empty() {
        prompt.push_str(
            "Respond with a JSON object: {\"verdict\": \"pass\"|\"fail\"|\"pass_with_warnings\", \
             \"feedback\": \"...\", \"concerns\": [\"...\"], \"suggested_worker\": null}\n",
        );
    } else {
        prompt.push_str("Judge each criterion:\n");
        for (index, criterion) in criteria.iter().enumerate() {
            prompt.push_str(&format!("{index}. {criterion}\n"));
        }
        prompt.push_str(
            "\nRespond with a JSON object: {\"criteria\": [{\"index\": <number>, \
             \"passed\": <bool>, \"evidence\": \"...\"}], \"concerns\": [\"...\"], \
             \"suggested_worker\": null}\nJudge every criterion by its index.\n",
        );
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::WorkerHandle;
    use crate::infrastructure::workers::mock::{MockWorkerInvoker, StaticRegistry};

    fn reviewer(invoker: MockWorkerInvoker) -> WorkerReviewer {
        let registry = StaticRegistry::new(vec![WorkerHandle::new("critic", "/bin/critic")]);
        WorkerReviewer::new("critic", Arc::new(registry), Arc::new(invoker), 5)
    }

    #[tokio::test]
    async fn test_review_returns_raw_response() {
        let invoker = MockWorkerInvoker::new().with_output(r#"{"verdict": "pass"}"#);
        let r = reviewer(invoker);
        let task = Task::new(1, "t", "p");

        let raw = r.review(&task, "the output").await.unwrap();
        assert_eq!(raw, r#"{"verdict": "pass"}"#);
    }

    #[tokio::test]
    async fn test_prompt_lists_criteria_with_indices() {
        let invoker = Arc::new(MockWorkerInvoker::new().with_output("{}"));
        let registry = StaticRegistry::new(vec![WorkerHandle::new("critic", "/bin/critic")]);
        let r = WorkerReviewer::new("critic", Arc::new(registry), invoker.clone(), 5);
        let task = Task::new(1, "t", "p").with_success_criteria(vec![
            "MUST: compiles".to_string(),
            "SHOULD: documented".to_string(),
        ]);

        let _ = r.review(&task, "out").await.unwrap();
        let seen = invoker.invocations();
        assert!(seen[0].prompt.contains("0. MUST: compiles"));
        assert!(seen[0].prompt.contains("1. SHOULD: documented"));
        assert!(seen[0].prompt.contains("\"criteria\""));
    }

    #[tokio::test]
    async fn test_unregistered_reviewer_errors() {
        let registry = StaticRegistry::new(vec![]);
        let r = WorkerReviewer::new(
            "critic",
            Arc::new(registry),
            Arc::new(MockWorkerInvoker::new()),
            5,
        );
        let task = Task::new(1, "t", "p");

        assert!(matches!(
            r.review(&task, "out").await,
            Err(DomainError::WorkerNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_reviewer_process_errors() {
        let invoker = MockWorkerInvoker::new().with_exit(1, "crashed");
        let r = reviewer(invoker);
        let task = Task::new(1, "t", "p");

        assert!(matches!(
            r.review(&task, "out").await,
            Err(DomainError::ReviewFailed(_))
        ));
    }
}
