//! Retry/adaptation loop.
//!
//! Per-task state machine: ATTEMPTING -> {PASSED, RETRYING, EXHAUSTED}.
//! On a failing verdict with retries remaining, the loop decides whether
//! the next attempt should swap to a better-suited worker, based on the
//! reviewer's suggestion and the learning store's failure history.
//!
//! The learning store is advisory only: if it is unavailable the loop
//! degrades to no-swap, no-history behavior and execution proceeds.

use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::models::{FailurePattern, LearningRecord, Task, Verdict};
use crate::domain::ports::LearningStore;
use crate::services::patterns;

/// Outcome of the loop after one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Verdict passed; the task is done.
    Passed,
    /// Retry with the given worker (the current one unless swapped).
    Retry { worker: String },
    /// No retries remaining; the task is terminally failed.
    Exhausted,
}

/// Decides retries and worker swaps, and records attempt history.
pub struct AdaptationLoop {
    store: Arc<dyn LearningStore>,
    max_retries: u32,
    swap_on_retry: bool,
    min_failures_before_adapt: u32,
    session_id: Uuid,
    run_number: u32,
}

impl AdaptationLoop {
    pub fn new(
        store: Arc<dyn LearningStore>,
        max_retries: u32,
        swap_on_retry: bool,
        min_failures_before_adapt: u32,
        session_id: Uuid,
        run_number: u32,
    ) -> Self {
        Self {
            store,
            max_retries,
            swap_on_retry,
            min_failures_before_adapt: min_failures_before_adapt.max(1),
            session_id,
            run_number,
        }
    }

    /// Append this attempt to the learning store, classifying failure
    /// text into patterns. A success is tagged with `prior_patterns`,
    /// the patterns of the failed attempt it recovered from, which is
    /// what lets pattern queries credit the worker that overcame them.
    /// Store failures never block the pipeline.
    pub async fn record_attempt(
        &self,
        task: &Task,
        worker: &str,
        succeeded: bool,
        failure_text: &str,
        prior_patterns: &[FailurePattern],
    ) -> Vec<FailurePattern> {
        let detected = if succeeded {
            prior_patterns.to_vec()
        } else {
            patterns::detect(failure_text)
        };

        let record = LearningRecord::new(
            task.id,
            worker,
            succeeded,
            detected.clone(),
            self.session_id,
            self.run_number,
        );
        if let Err(err) = self.store.append(record).await {
            warn!(task_id = task.id, %err, "learning store append failed; continuing");
        }
        detected
    }

    /// Decide the next transition after an attempt.
    ///
    /// `attempts_made` counts the attempt just finished, so the retry
    /// bound `attempts <= max_retries + 1` holds structurally.
    pub async fn decide(
        &self,
        task: &Task,
        verdict: &Verdict,
        current_worker: &str,
        attempts_made: u32,
        detected: &[FailurePattern],
    ) -> RetryDecision {
        if verdict.kind.is_passing() {
            return RetryDecision::Passed;
        }
        if !verdict.should_retry || attempts_made > self.max_retries {
            return RetryDecision::Exhausted;
        }

        let worker = self
            .pick_retry_worker(task, verdict, current_worker, detected)
            .await;
        RetryDecision::Retry { worker }
    }

    /// Pick the worker for the next attempt. Swaps only when enabled,
    /// an alternative is known, and the history shows enough failures
    /// with the current worker. The swap is scoped to the retry; the
    /// task's persisted default worker is never mutated.
    async fn pick_retry_worker(
        &self,
        task: &Task,
        verdict: &Verdict,
        current_worker: &str,
        detected: &[FailurePattern],
    ) -> String {
        if !self.swap_on_retry {
            return current_worker.to_string();
        }

        let failures = match self.store.failure_count(task.id, current_worker).await {
            Ok(n) => n,
            Err(err) => {
                warn!(task_id = task.id, %err, "learning store query failed; not swapping");
                return current_worker.to_string();
            }
        };
        if failures < self.min_failures_before_adapt {
            return current_worker.to_string();
        }

        // Reviewer suggestion first; otherwise mine the history for the
        // best-performing worker on the detected failure pattern.
        if let Some(suggested) = verdict.suggested_worker.as_deref() {
            if suggested != current_worker {
                debug!(
                    task_id = task.id,
                    from = current_worker,
                    to = suggested,
                    "swapping worker on retry (reviewer suggestion)"
                );
                return suggested.to_string();
            }
        }

        for &pattern in detected {
            match self.store.best_worker_for_pattern(pattern).await {
                Ok(Some(best)) if best != current_worker => {
                    debug!(
                        task_id = task.id,
                        from = current_worker,
                        to = %best,
                        pattern = pattern.as_str(),
                        "swapping worker on retry (history)"
                    );
                    return best;
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(task_id = task.id, %err, "learning store query failed; not swapping");
                    return current_worker.to_string();
                }
            }
        }

        current_worker.to_string()
    }
}
