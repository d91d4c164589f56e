//! `foreman run` - execute a plan.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use tokio::sync::mpsc;
use tracing::warn;

use crate::cli::output;
use crate::domain::models::{ExecutionEvent, ExecutionStatus};
use crate::domain::ports::{LearningStore, NullFailureGate, NullLearningStore, Reviewer};
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::plan::{load_plan, YamlPlanUpdater};
use crate::infrastructure::workers::{DirWorkerRegistry, ProcessWorkerInvoker};
use crate::infrastructure::{
    ExponentialPauseHook, JsonlLearningStore, ShellGateRunner, WorkerReviewer,
};
use crate::services::{TaskDispatcher, WaveCoordinator};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Override the configured concurrency bound (0 = unbounded)
    #[arg(long)]
    pub max_concurrency: Option<usize>,

    /// Override the configured per-task timeout in seconds
    #[arg(long)]
    pub task_timeout_secs: Option<u64>,

    /// Override the configured overall deadline in seconds (0 = none)
    #[arg(long)]
    pub deadline_secs: Option<u64>,

    /// Disable learning-based worker adaptation for this run
    #[arg(long)]
    pub no_learning: bool,
}

pub async fn execute(plan_path: &str, args: RunArgs, json_mode: bool) -> Result<()> {
    let mut config = ConfigLoader::load()?;
    if let Some(max_concurrency) = args.max_concurrency {
        config.engine.max_concurrency = max_concurrency;
    }
    if let Some(timeout) = args.task_timeout_secs {
        config.engine.task_timeout_secs = timeout;
    }
    if let Some(deadline) = args.deadline_secs {
        config.engine.overall_deadline_secs = deadline;
    }

    let plan = load_plan(plan_path)
        .await
        .with_context(|| format!("failed to load plan {plan_path}"))?;

    let registry = Arc::new(DirWorkerRegistry::load(&config.workers.dir).await?);
    let invoker = Arc::new(ProcessWorkerInvoker::new());
    let gate = Arc::new(ShellGateRunner::new());
    let pause = Arc::new(ExponentialPauseHook::new());

    // The store degrades to a null implementation rather than failing
    // the run: execution without history is still a correct run.
    let learning: Arc<dyn LearningStore> = if args.no_learning || !config.learning.enabled {
        Arc::new(NullLearningStore)
    } else {
        match JsonlLearningStore::open(&config.learning.history_path).await {
            Ok(store) => Arc::new(store),
            Err(err) => {
                warn!(%err, "learning store unavailable; running without history");
                Arc::new(NullLearningStore)
            }
        }
    };

    let reviewer_names = if config.review.reviewers.is_empty() {
        warn!(
            worker = %plan.default_worker,
            "no reviewers configured; the default worker reviews its own output"
        );
        vec![plan.default_worker.clone()]
    } else {
        config.review.reviewers.clone()
    };
    let reviewers: Vec<Arc<dyn Reviewer>> = reviewer_names
        .iter()
        .map(|name| {
            Arc::new(WorkerReviewer::new(
                name.clone(),
                registry.clone(),
                invoker.clone(),
                config.review.timeout_secs,
            )) as Arc<dyn Reviewer>
        })
        .collect();

    let updater = Arc::new(YamlPlanUpdater::new(plan_path, plan.clone()));
    let dispatcher = Arc::new(TaskDispatcher::new(
        registry,
        invoker,
        gate,
        pause,
        config.engine.task_timeout_secs,
    ));
    let coordinator = WaveCoordinator::new(
        dispatcher,
        reviewers,
        learning,
        updater,
        Arc::new(NullFailureGate),
        config.engine.clone(),
    );

    let (event_tx, event_rx) = mpsc::channel::<ExecutionEvent>(100);
    let printer = tokio::spawn(print_events(event_rx, json_mode));

    let report = coordinator.execute_with_events(&plan, event_tx).await?;
    let _ = printer.await;

    if !json_mode {
        println!("\n{}", output::render_report(&report));
        println!("{}", output::render_summary(&report));
    }

    match report.status() {
        ExecutionStatus::Completed => Ok(()),
        ExecutionStatus::PartialSuccess => bail!(
            "run finished with partial success: {} of {} tasks passed",
            report.passed_tasks,
            report.total_tasks
        ),
        ExecutionStatus::Failed => bail!("run failed: no tasks passed"),
        ExecutionStatus::Canceled => bail!(
            "run canceled: overall deadline of {}s expired",
            config.engine.overall_deadline_secs
        ),
    }
}

async fn print_events(mut rx: mpsc::Receiver<ExecutionEvent>, json_mode: bool) {
    while let Some(event) = rx.recv().await {
        if json_mode {
            print_event_json(&event);
            continue;
        }
        match event {
            ExecutionEvent::Started {
                total_tasks,
                wave_count,
            } => println!("Executing {total_tasks} tasks across {wave_count} waves"),
            ExecutionEvent::WaveStarted {
                wave_number,
                task_count,
            } => println!("\nWave {wave_number} ({task_count} tasks)"),
            ExecutionEvent::TaskStarted {
                task_id,
                name,
                worker,
                attempt,
            } => {
                if attempt == 1 {
                    println!("  [{task_id}] {name} -> {worker}");
                }
            }
            ExecutionEvent::TaskRetrying {
                task_id,
                attempt,
                max_attempts,
                worker,
            } => println!("  [{task_id}] retry {attempt}/{max_attempts} -> {worker}"),
            ExecutionEvent::TaskCompleted {
                task_id, status, ..
            } => println!("  [{task_id}] {}", status.as_str()),
            ExecutionEvent::TaskBlocked { task_id, reason } => {
                println!("  [{task_id}] blocked: {reason}");
            }
            ExecutionEvent::WaveCompleted {
                wave_number,
                passed,
                failed,
                blocked,
            } => println!("Wave {wave_number} done: {passed} passed, {failed} failed, {blocked} blocked"),
            ExecutionEvent::Completed { .. } => {}
        }
    }
}

fn print_event_json(event: &ExecutionEvent) {
    let payload = match event {
        ExecutionEvent::TaskCompleted {
            task_id,
            status,
            feedback,
        } => Some(serde_json::json!({
            "event": "task_completed",
            "task_id": task_id,
            "status": status.as_str(),
            "feedback": feedback,
        })),
        ExecutionEvent::TaskBlocked { task_id, reason } => Some(serde_json::json!({
            "event": "task_blocked",
            "task_id": task_id,
            "reason": reason,
        })),
        ExecutionEvent::Completed { status, report } => Some(serde_json::json!({
            "event": "completed",
            "status": status_str(*status),
            "report": report,
        })),
        _ => None,
    };
    if let Some(payload) = payload {
        println!("{payload}");
    }
}

fn status_str(status: ExecutionStatus) -> &'static str {
    match status {
        ExecutionStatus::Completed => "completed",
        ExecutionStatus::PartialSuccess => "partial_success",
        ExecutionStatus::Failed => "failed",
        ExecutionStatus::Canceled => "canceled",
    }
}
