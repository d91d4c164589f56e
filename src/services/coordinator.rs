//! Wave coordinator.
//!
//! Executes a plan wave by wave: tasks inside a wave run concurrently
//! under a semaphore bound, waves run strictly in sequence. Failure in
//! one task never aborts its wave; it blocks the failed task's
//! descendants and everything else proceeds. An optional run-level
//! deadline cancels in-flight work cooperatively.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AttemptRecord, EngineConfig, ExecutionEvent, ExecutionReport, Plan, ReviewerMode,
    ReviewerResponse, Task, TaskId, TaskRunResult, TaskStatus, Verdict,
};
use crate::domain::ports::{FailureGate, LearningStore, PlanUpdater, Reviewer};
use crate::services::adaptation::{AdaptationLoop, RetryDecision};
use crate::services::dispatch::{DispatchFailure, TaskDispatcher};
use crate::services::{graph, scheduler, verdict};

/// Orchestrates plan execution across waves.
pub struct WaveCoordinator {
    dispatcher: Arc<TaskDispatcher>,
    reviewers: Vec<Arc<dyn Reviewer>>,
    learning: Arc<dyn LearningStore>,
    updater: Arc<dyn PlanUpdater>,
    failure_gate: Arc<dyn FailureGate>,
    config: EngineConfig,
}

impl WaveCoordinator {
    pub fn new(
        dispatcher: Arc<TaskDispatcher>,
        reviewers: Vec<Arc<dyn Reviewer>>,
        learning: Arc<dyn LearningStore>,
        updater: Arc<dyn PlanUpdater>,
        failure_gate: Arc<dyn FailureGate>,
        config: EngineConfig,
    ) -> Self {
        Self {
            dispatcher,
            reviewers,
            learning,
            updater,
            failure_gate,
            config,
        }
    }

    /// Execute a plan without event streaming.
    pub async fn execute(&self, plan: &Plan) -> DomainResult<ExecutionReport> {
        let (tx, _rx) = mpsc::channel(100);
        self.execute_with_events(plan, tx).await
    }

    /// Execute a plan, streaming progress events to `tx`.
    ///
    /// Send failures on `tx` are ignored: a slow or absent consumer must
    /// never stall execution.
    pub async fn execute_with_events(
        &self,
        plan: &Plan,
        tx: mpsc::Sender<ExecutionEvent>,
    ) -> DomainResult<ExecutionReport> {
        plan.validate().map_err(DomainError::ValidationFailed)?;
        let dep_graph = graph::build(&plan.tasks)?;
        let waves = scheduler::schedule(&dep_graph);
        let clock = Instant::now();

        let session_id = Uuid::new_v4();
        let run_number = match self.learning.last_run_number().await {
            Ok(n) => n + 1,
            Err(err) => {
                warn!(%err, "learning store unavailable for run numbering");
                1
            }
        };

        info!(
            total_tasks = plan.tasks.len(),
            wave_count = waves.len(),
            %session_id,
            run_number,
            "starting execution"
        );
        let _ = tx
            .send(ExecutionEvent::Started {
                total_tasks: plan.tasks.len(),
                wave_count: waves.len(),
            })
            .await;

        // Terminal statuses already carried by the plan survive into this
        // run; everything else starts over as pending.
        let mut statuses: HashMap<TaskId, TaskStatus> = plan
            .tasks
            .iter()
            .map(|t| {
                let initial = if t.status == TaskStatus::Passed {
                    TaskStatus::Passed
                } else {
                    TaskStatus::Pending
                };
                (t.id, initial)
            })
            .collect();
        let mut attempts: HashMap<TaskId, Vec<AttemptRecord>> = HashMap::new();
        let mut feedback: HashMap<TaskId, String> = HashMap::new();
        let mut blocked_reasons: HashMap<TaskId, String> = HashMap::new();

        let cancel = CancellationToken::new();
        let deadline_watcher = if self.config.overall_deadline_secs > 0 {
            let token = cancel.clone();
            let deadline = Duration::from_secs(self.config.overall_deadline_secs);
            Some(tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                warn!("overall deadline expired; cancelling in-flight tasks");
                token.cancel();
            }))
        } else {
            None
        };

        let runner = Arc::new(TaskRunner {
            dispatcher: self.dispatcher.clone(),
            reviewers: self.reviewers.clone(),
            updater: self.updater.clone(),
            adaptation: AdaptationLoop::new(
                self.learning.clone(),
                plan.quality.max_retries.unwrap_or(self.config.max_retries),
                self.config.swap_on_retry,
                self.config.min_failures_before_adapt,
                session_id,
                run_number,
            ),
            default_worker: plan.default_worker.clone(),
            reviewer_mode: plan.quality.reviewer_mode,
            max_attempts: plan.quality.max_retries.unwrap_or(self.config.max_retries) + 1,
            task_timeout_secs: self.config.task_timeout_secs,
        });

        for (wave_index, wave) in waves.iter().enumerate() {
            if cancel.is_cancelled() {
                break;
            }
            let wave_number = wave_index + 1;
            let _ = tx
                .send(ExecutionEvent::WaveStarted {
                    wave_number,
                    task_count: wave.len(),
                })
                .await;

            // Pre-wave failure predictions demote dispatchable tasks to
            // blocked; the hook fails open on error.
            let (mut dispatchable, mut blocked) = self.partition_wave(plan, wave, &statuses);
            match self.failure_gate.assess(&dispatchable).await {
                Ok(predictions) => {
                    for prediction in predictions {
                        if let Some(pos) =
                            dispatchable.iter().position(|t| t.id == prediction.task_id)
                        {
                            let task = dispatchable.remove(pos);
                            blocked.push((task.id, format!("predicted failure: {}", prediction.reason)));
                        }
                    }
                }
                Err(err) => warn!(%err, "failure gate unavailable; dispatching the full wave"),
            }

            for (id, reason) in &blocked {
                statuses.insert(*id, TaskStatus::Blocked);
                blocked_reasons.insert(*id, reason.clone());
                if let Err(err) = self
                    .updater
                    .task_updated(*id, TaskStatus::Blocked, None)
                    .await
                {
                    warn!(task_id = id, %err, "plan updater failed");
                }
                let _ = tx
                    .send(ExecutionEvent::TaskBlocked {
                        task_id: *id,
                        reason: reason.clone(),
                    })
                    .await;
            }

            if dispatchable.is_empty() {
                debug!(wave_number, "no dispatchable tasks in wave");
                self.send_wave_completed(&tx, wave_number, wave, &statuses).await;
                continue;
            }

            let permits = if self.config.max_concurrency == 0 {
                dispatchable.len()
            } else {
                self.config.max_concurrency
            };
            let semaphore = Arc::new(Semaphore::new(permits));

            let mut handles = Vec::with_capacity(dispatchable.len());
            for task in dispatchable {
                let deps: Vec<Task> = task
                    .depends_on
                    .iter()
                    .filter_map(|dep| plan.task(*dep).cloned())
                    .collect();
                let runner = runner.clone();
                let semaphore = semaphore.clone();
                let cancel = cancel.clone();
                let tx = tx.clone();
                handles.push(tokio::spawn(async move {
                    // Closed only when the semaphore is dropped, which
                    // cannot happen while this task holds a clone.
                    let Ok(_permit) = semaphore.acquire().await else {
                        return TaskRun {
                            task_id: task.id,
                            status: TaskStatus::Pending,
                            attempts: Vec::new(),
                            feedback: String::new(),
                        };
                    };
                    runner.run(task, deps, cancel, tx).await
                }));
            }

            for joined in future::join_all(handles).await {
                match joined {
                    Ok(run) => {
                        statuses.insert(run.task_id, run.status);
                        attempts.insert(run.task_id, run.attempts);
                        feedback.insert(run.task_id, run.feedback);
                    }
                    Err(err) => warn!(%err, "task execution panicked"),
                }
            }

            self.send_wave_completed(&tx, wave_number, wave, &statuses).await;
        }

        if let Some(watcher) = deadline_watcher {
            watcher.abort();
        }

        let deadline_expired = self.config.overall_deadline_secs > 0 && cancel.is_cancelled();
        let report = build_report(
            plan,
            &statuses,
            &mut attempts,
            &blocked_reasons,
            deadline_expired,
            u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX),
        );

        info!(
            passed = report.passed_tasks,
            failed = report.failed_tasks,
            blocked = report.blocked_tasks,
            pending = report.pending_tasks,
            status = ?report.status(),
            "execution finished"
        );
        let _ = tx
            .send(ExecutionEvent::Completed {
                status: report.status(),
                report: report.clone(),
            })
            .await;

        Ok(report)
    }

    /// Split a wave into dispatchable tasks and tasks blocked by an
    /// upstream outcome. Tasks already passed (prior run) are skipped
    /// entirely; tasks whose dependencies never ran stay pending.
    fn partition_wave(
        &self,
        plan: &Plan,
        wave: &[TaskId],
        statuses: &HashMap<TaskId, TaskStatus>,
    ) -> (Vec<Task>, Vec<(TaskId, String)>) {
        let mut dispatchable = Vec::new();
        let mut blocked = Vec::new();

        for &id in wave {
            let Some(task) = plan.task(id) else { continue };
            if statuses.get(&id) == Some(&TaskStatus::Passed) {
                debug!(task_id = id, "already passed; skipping");
                continue;
            }

            let failed_dep = task.depends_on.iter().find(|dep| {
                matches!(
                    statuses.get(dep),
                    Some(TaskStatus::Failed | TaskStatus::Blocked)
                )
            });
            if let Some(&dep) = failed_dep {
                blocked.push((id, format!("dependency {dep} did not pass")));
                continue;
            }

            let unsettled_dep = task
                .depends_on
                .iter()
                .any(|dep| statuses.get(dep) != Some(&TaskStatus::Passed));
            if unsettled_dep {
                // Dependency never reached a terminal state (deadline
                // cancellation); leave this task pending for a resume.
                continue;
            }

            dispatchable.push(task.clone());
        }

        (dispatchable, blocked)
    }

    async fn send_wave_completed(
        &self,
        tx: &mpsc::Sender<ExecutionEvent>,
        wave_number: usize,
        wave: &[TaskId],
        statuses: &HashMap<TaskId, TaskStatus>,
    ) {
        let count = |status: TaskStatus| {
            wave.iter()
                .filter(|id| statuses.get(id) == Some(&status))
                .count()
        };
        let _ = tx
            .send(ExecutionEvent::WaveCompleted {
                wave_number,
                passed: count(TaskStatus::Passed),
                failed: count(TaskStatus::Failed),
                blocked: count(TaskStatus::Blocked),
            })
            .await;
    }
}

/// Per-run outcome of one task.
struct TaskRun {
    task_id: TaskId,
    status: TaskStatus,
    attempts: Vec<AttemptRecord>,
    feedback: String,
}

/// Everything one spawned task needs, shared across the wave.
struct TaskRunner {
    dispatcher: Arc<TaskDispatcher>,
    reviewers: Vec<Arc<dyn Reviewer>>,
    updater: Arc<dyn PlanUpdater>,
    adaptation: AdaptationLoop,
    default_worker: String,
    reviewer_mode: ReviewerMode,
    max_attempts: u32,
    task_timeout_secs: u64,
}

impl TaskRunner {
    /// Drive one task through its attempt/review/retry lifecycle.
    async fn run(
        &self,
        task: Task,
        deps: Vec<Task>,
        cancel: CancellationToken,
        tx: mpsc::Sender<ExecutionEvent>,
    ) -> TaskRun {
        let mut worker = task.effective_worker(&self.default_worker).to_string();
        let mut attempts: Vec<AttemptRecord> = Vec::new();
        let mut attempt_number = 1u32;
        let mut prior_patterns = Vec::new();

        if let Err(err) = self
            .updater
            .task_updated(task.id, TaskStatus::Running, None)
            .await
        {
            warn!(task_id = task.id, %err, "plan updater failed");
        }

        loop {
            let _ = tx
                .send(ExecutionEvent::TaskStarted {
                    task_id: task.id,
                    name: task.name.clone(),
                    worker: worker.clone(),
                    attempt: attempt_number,
                })
                .await;

            let outcome = self
                .dispatcher
                .dispatch(&task, &worker, &deps, &cancel)
                .await;

            let verdict = match outcome.failure {
                Some(DispatchFailure::Canceled) => {
                    debug!(task_id = task.id, "attempt cancelled by run deadline");
                    return TaskRun {
                        task_id: task.id,
                        status: TaskStatus::Pending,
                        attempts,
                        feedback: "cancelled by run deadline".to_string(),
                    };
                }
                Some(DispatchFailure::SystemError(ref detail)) => {
                    let record = AttemptRecord {
                        attempt_number,
                        worker: worker.clone(),
                        verdict: crate::domain::models::VerdictKind::Fail,
                        raw_output: String::new(),
                        reviewer_feedback: detail.clone(),
                        system_error: true,
                        started_at: outcome.started_at,
                        duration_ms: outcome.duration_ms,
                    };
                    attempts.push(record.clone());
                    self.adaptation
                        .record_attempt(&task, &worker, false, detail, &[])
                        .await;
                    return self
                        .finish(&task, TaskStatus::Failed, attempts, detail.clone(), &record, &tx)
                        .await;
                }
                Some(DispatchFailure::Timeout) => Verdict::fail(format!(
                    "worker timed out after {}s",
                    self.task_timeout_secs
                )),
                Some(DispatchFailure::WorkerFailed(ref detail)) => {
                    Verdict::fail(format!("worker failed: {detail}"))
                }
                Some(DispatchFailure::HardGate {
                    ref command,
                    ref output,
                }) => Verdict::fail(format!("test command `{command}` failed:\n{output}")),
                None => {
                    let responses = self.collect_reviews(&task, &outcome.raw_output).await;
                    verdict::review(&task, &responses)
                }
            };

            let record = AttemptRecord {
                attempt_number,
                worker: worker.clone(),
                verdict: verdict.kind,
                raw_output: outcome.raw_output.clone(),
                reviewer_feedback: verdict.feedback.clone(),
                system_error: false,
                started_at: outcome.started_at,
                duration_ms: outcome.duration_ms,
            };
            attempts.push(record.clone());

            let failure_text = format!("{}\n{}", verdict.feedback, outcome.raw_output);
            let detected = self
                .adaptation
                .record_attempt(
                    &task,
                    &worker,
                    verdict.kind.is_passing(),
                    &failure_text,
                    &prior_patterns,
                )
                .await;
            prior_patterns.clone_from(&detected);

            match self
                .adaptation
                .decide(&task, &verdict, &worker, attempt_number, &detected)
                .await
            {
                RetryDecision::Passed => {
                    return self
                        .finish(&task, TaskStatus::Passed, attempts, verdict.feedback, &record, &tx)
                        .await;
                }
                RetryDecision::Exhausted => {
                    return self
                        .finish(&task, TaskStatus::Failed, attempts, verdict.feedback, &record, &tx)
                        .await;
                }
                RetryDecision::Retry { worker: next } => {
                    if let Err(err) = self
                        .updater
                        .task_updated(task.id, TaskStatus::Running, Some(&record))
                        .await
                    {
                        warn!(task_id = task.id, %err, "plan updater failed");
                    }
                    attempt_number += 1;
                    info!(
                        task_id = task.id,
                        attempt = attempt_number,
                        max_attempts = self.max_attempts,
                        worker = %next,
                        "retrying task"
                    );
                    let _ = tx
                        .send(ExecutionEvent::TaskRetrying {
                            task_id: task.id,
                            attempt: attempt_number,
                            max_attempts: self.max_attempts,
                            worker: next.clone(),
                        })
                        .await;
                    worker = next;
                }
            }
        }
    }

    /// Gather raw responses from the assigned reviewers. A reviewer
    /// error fails closed: it contributes an unparseable response, which
    /// the verdict engine counts as dissent.
    async fn collect_reviews(&self, task: &Task, output: &str) -> Vec<ReviewerResponse> {
        let panel: &[Arc<dyn Reviewer>] = match self.reviewer_mode {
            ReviewerMode::Single => &self.reviewers[..self.reviewers.len().min(1)],
            ReviewerMode::Panel => &self.reviewers,
        };

        let mut responses = Vec::with_capacity(panel.len());
        for reviewer in panel {
            let raw = match reviewer.review(task, output).await {
                Ok(raw) => raw,
                Err(err) => {
                    warn!(
                        task_id = task.id,
                        reviewer = reviewer.name(),
                        %err,
                        "reviewer failed; counting as dissent"
                    );
                    String::new()
                }
            };
            responses.push(ReviewerResponse {
                reviewer: reviewer.name().to_string(),
                raw,
            });
        }
        responses
    }

    async fn finish(
        &self,
        task: &Task,
        status: TaskStatus,
        attempts: Vec<AttemptRecord>,
        feedback: String,
        last_attempt: &AttemptRecord,
        tx: &mpsc::Sender<ExecutionEvent>,
    ) -> TaskRun {
        if let Err(err) = self
            .updater
            .task_updated(task.id, status, Some(last_attempt))
            .await
        {
            warn!(task_id = task.id, %err, "plan updater failed");
        }
        let _ = tx
            .send(ExecutionEvent::TaskCompleted {
                task_id: task.id,
                status,
                feedback: feedback.clone(),
            })
            .await;
        TaskRun {
            task_id: task.id,
            status,
            attempts,
            feedback,
        }
    }
}

fn build_report(
    plan: &Plan,
    statuses: &HashMap<TaskId, TaskStatus>,
    attempts: &mut HashMap<TaskId, Vec<AttemptRecord>>,
    blocked_reasons: &HashMap<TaskId, String>,
    deadline_expired: bool,
    total_duration_ms: u64,
) -> ExecutionReport {
    let mut report = ExecutionReport {
        total_tasks: plan.tasks.len(),
        total_duration_ms,
        deadline_expired,
        ..ExecutionReport::default()
    };

    for task in &plan.tasks {
        let status = statuses
            .get(&task.id)
            .copied()
            .unwrap_or(TaskStatus::Pending);
        match status {
            TaskStatus::Passed => report.passed_tasks += 1,
            TaskStatus::Failed => report.failed_tasks += 1,
            TaskStatus::Blocked => report.blocked_tasks += 1,
            TaskStatus::Pending | TaskStatus::Running => report.pending_tasks += 1,
        }
        report.task_results.push(TaskRunResult {
            task_id: task.id,
            name: task.name.clone(),
            status,
            blocked_reason: blocked_reasons.get(&task.id).cloned(),
            attempts: attempts.remove(&task.id).unwrap_or_default(),
        });
    }

    report
}
