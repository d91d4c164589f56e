//! Task dispatch unit.
//!
//! Runs a single attempt of a task end to end: resolve the worker,
//! assemble the effective prompt (dependency context included), invoke
//! the worker under timeout and cancellation, honor backoff signals,
//! and run the hard-gate test commands before review.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::models::{Task, WorkerInvocation, WorkerRequest};
use crate::domain::ports::{GateRunner, PauseHook, WorkerInvoker, WorkerRegistry};

/// Grace period after cancelling an in-flight invocation, letting the
/// invoker shut the worker down cooperatively.
const CANCEL_GRACE: Duration = Duration::from_secs(10);

/// Why an attempt produced no reviewable output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchFailure {
    /// The attempt could not be performed: worker unknown, spawn failed.
    /// Not retryable; does not consume a retry slot.
    SystemError(String),
    /// The worker exceeded the per-task timeout and was cancelled.
    Timeout,
    /// The worker ran but exited non-zero.
    WorkerFailed(String),
    /// A configured test command exited non-zero. Reviewers are skipped.
    HardGate { command: String, output: String },
    /// The run-level deadline fired mid-attempt.
    Canceled,
}

/// Result of one dispatch attempt.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    /// Worker the attempt ran on
    pub worker: String,
    /// Captured worker stdout (empty when the attempt never produced any)
    pub raw_output: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// `None` means the output is ready for review
    pub failure: Option<DispatchFailure>,
}

enum InvokeEnd {
    Finished(WorkerInvocation),
    TimedOut,
    Canceled,
    Error(String),
}

/// Dispatches single task attempts to workers.
pub struct TaskDispatcher {
    registry: Arc<dyn WorkerRegistry>,
    invoker: Arc<dyn WorkerInvoker>,
    gate: Arc<dyn GateRunner>,
    pause: Arc<dyn PauseHook>,
    timeout_secs: u64,
}

impl TaskDispatcher {
    pub fn new(
        registry: Arc<dyn WorkerRegistry>,
        invoker: Arc<dyn WorkerInvoker>,
        gate: Arc<dyn GateRunner>,
        pause: Arc<dyn PauseHook>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            registry,
            invoker,
            gate,
            pause,
            timeout_secs,
        }
    }

    /// Run one attempt of `task` on `worker_name`. `dependencies` are the
    /// already-passed upstream tasks whose context is prepended to the
    /// prompt.
    pub async fn dispatch(
        &self,
        task: &Task,
        worker_name: &str,
        dependencies: &[Task],
        cancel: &CancellationToken,
    ) -> DispatchOutcome {
        let started_at = Utc::now();
        let clock = Instant::now();
        let outcome = |raw: String, failure: Option<DispatchFailure>| DispatchOutcome {
            worker: worker_name.to_string(),
            raw_output: raw,
            started_at,
            duration_ms: u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX),
            failure,
        };

        let handle = match self.registry.resolve(worker_name).await {
            Ok(Some(handle)) => handle,
            Ok(None) => {
                return outcome(
                    String::new(),
                    Some(DispatchFailure::SystemError(format!(
                        "worker '{worker_name}' is not registered"
                    ))),
                );
            }
            Err(err) => {
                return outcome(
                    String::new(),
                    Some(DispatchFailure::SystemError(format!(
                        "worker lookup failed: {err}"
                    ))),
                );
            }
        };

        let prompt = effective_prompt(task, dependencies);

        // One invocation, plus a single re-invocation after a signaled
        // backoff condition.
        let mut backoff_seen = false;
        let invocation = loop {
            let request = WorkerRequest {
                task_id: task.id,
                prompt: prompt.clone(),
                timeout_secs: self.timeout_secs,
            };
            match self.invoke_bounded(&handle, request, cancel).await {
                InvokeEnd::Finished(inv) if inv.backoff && !backoff_seen => {
                    backoff_seen = true;
                    debug!(task_id = task.id, worker = worker_name, "worker signaled backoff");
                    if let Err(err) = self.pause.on_backoff(worker_name).await {
                        warn!(task_id = task.id, %err, "pause hook failed; retrying anyway");
                    }
                }
                InvokeEnd::Finished(inv) => break inv,
                InvokeEnd::TimedOut => {
                    return outcome(String::new(), Some(DispatchFailure::Timeout));
                }
                InvokeEnd::Canceled => {
                    return outcome(String::new(), Some(DispatchFailure::Canceled));
                }
                InvokeEnd::Error(detail) => {
                    return outcome(String::new(), Some(DispatchFailure::SystemError(detail)));
                }
            }
        };

        if !invocation.succeeded() {
            let detail = if invocation.stderr.trim().is_empty() {
                format!("worker exited with code {:?}", invocation.exit_code)
            } else {
                invocation.stderr.trim().to_string()
            };
            return outcome(invocation.output, Some(DispatchFailure::WorkerFailed(detail)));
        }

        // Hard gate: every test command must exit zero before review.
        for command in &task.test_commands {
            if cancel.is_cancelled() {
                return outcome(invocation.output, Some(DispatchFailure::Canceled));
            }
            match self.gate.run(command, cancel.child_token()).await {
                Ok(result) if result.passed() => {}
                // A command interrupted by the run deadline is not a
                // gate verdict; the attempt never settled.
                _ if cancel.is_cancelled() => {
                    return outcome(invocation.output, Some(DispatchFailure::Canceled));
                }
                Ok(result) => {
                    return outcome(
                        invocation.output,
                        Some(DispatchFailure::HardGate {
                            command: command.clone(),
                            output: result.output,
                        }),
                    );
                }
                Err(err) => {
                    return outcome(
                        invocation.output,
                        Some(DispatchFailure::HardGate {
                            command: command.clone(),
                            output: format!("command could not be run: {err}"),
                        }),
                    );
                }
            }
        }

        outcome(invocation.output, None)
    }

    /// Invoke under the per-task timeout and the run-level cancellation
    /// token. Either condition cancels the invoker's child token and
    /// waits out a grace period before giving up on it.
    async fn invoke_bounded(
        &self,
        handle: &crate::domain::models::WorkerHandle,
        request: WorkerRequest,
        cancel: &CancellationToken,
    ) -> InvokeEnd {
        let child = cancel.child_token();
        let fut = self.invoker.invoke(handle, request, child.clone());
        tokio::pin!(fut);

        // Biased so that an already-fired cancellation or timeout always
        // classifies the attempt, even when the invoker finishes in the
        // same poll.
        let interrupted = tokio::select! {
            biased;
            () = cancel.cancelled() => InvokeEnd::Canceled,
            () = tokio::time::sleep(Duration::from_secs(self.timeout_secs)) => InvokeEnd::TimedOut,
            result = &mut fut => {
                return match result {
                    Ok(inv) => InvokeEnd::Finished(inv),
                    Err(err) => InvokeEnd::Error(err.to_string()),
                };
            }
        };

        child.cancel();
        // Let the invoker wind the worker down; its result no longer
        // changes the attempt's classification.
        if tokio::time::timeout(CANCEL_GRACE, &mut fut).await.is_err() {
            warn!("worker did not stop within the cancellation grace period");
        }
        interrupted
    }
}

/// Assemble the prompt handed to the worker: the task prompt, preceded
/// by an upstream-context section naming each dependency and the files
/// it touched.
pub fn effective_prompt(task: &Task, dependencies: &[Task]) -> String {
    if dependencies.is_empty() {
        return task.prompt.clone();
    }

    let mut prompt = String::from("## Upstream context\n\n");
    prompt.push_str("The following prerequisite tasks have already completed:\n");
    for dep in dependencies {
        prompt.push_str(&format!("- task {} ({})", dep.id, dep.name));
        if !dep.files.is_empty() {
            prompt.push_str(&format!(" touching {}", dep.files.join(", ")));
        }
        prompt.push('\n');
    }
    prompt.push_str("\n## Task\n\n");
    prompt.push_str(&task.prompt);
    prompt
}
