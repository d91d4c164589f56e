//! Plan file adapter: YAML loading, saving, and the updater that
//! persists task state changes during a run.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AttemptRecord, Plan, TaskId, TaskStatus};
use crate::domain::ports::PlanUpdater;

/// Load and validate a plan from a YAML file.
pub async fn load_plan(path: impl AsRef<Path>) -> DomainResult<Plan> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path).await.map_err(|err| {
        DomainError::Io(format!("failed to read plan {}: {err}", path.display()))
    })?;
    let plan: Plan = serde_yaml::from_str(&contents)?;
    plan.validate().map_err(DomainError::ValidationFailed)?;
    Ok(plan)
}

/// Write a plan to a YAML file, atomically (write-then-rename).
pub async fn save_plan(path: impl AsRef<Path>, plan: &Plan) -> DomainResult<()> {
    let path = path.as_ref();
    let contents = serde_yaml::to_string(plan)?;
    let tmp = path.with_extension("yaml.tmp");
    tokio::fs::write(&tmp, contents).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Updater that rewrites the plan file after each status change.
///
/// Holds its own copy of the plan and serializes writes behind a mutex,
/// so concurrent task completions within a wave cannot interleave
/// partial file contents.
pub struct YamlPlanUpdater {
    path: PathBuf,
    plan: Mutex<Plan>,
}

impl YamlPlanUpdater {
    pub fn new(path: impl Into<PathBuf>, plan: Plan) -> Self {
        Self {
            path: path.into(),
            plan: Mutex::new(plan),
        }
    }
}

#[async_trait]
impl PlanUpdater for YamlPlanUpdater {
    async fn task_updated(
        &self,
        task_id: TaskId,
        status: TaskStatus,
        attempt: Option<&AttemptRecord>,
    ) -> DomainResult<()> {
        let mut plan = self.plan.lock().await;
        let Some(task) = plan.tasks.iter_mut().find(|t| t.id == task_id) else {
            return Err(DomainError::TaskNotFound(task_id));
        };

        task.status = status;
        if let Some(attempt) = attempt {
            // Retries re-report earlier attempts; keep the trail deduplicated.
            if task
                .attempts
                .last()
                .is_none_or(|last| last.attempt_number < attempt.attempt_number)
            {
                task.attempts.push(attempt.clone());
            }
        }

        debug!(task_id, status = status.as_str(), "persisting plan update");
        save_plan(&self.path, &plan).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Task, VerdictKind};
    use chrono::Utc;

    const PLAN_YAML: &str = r"
default_worker: alpha
quality:
  max_retries: 1
  reviewer_mode: panel
tasks:
  - id: 1
    name: schema
    prompt: design the schema
  - id: 2
    name: api
    prompt: build the api
    depends_on: [1]
    worker: beta
    success_criteria:
      - 'MUST: endpoints respond'
";

    fn attempt(number: u32) -> AttemptRecord {
        AttemptRecord {
            attempt_number: number,
            worker: "alpha".to_string(),
            verdict: VerdictKind::Fail,
            raw_output: String::new(),
            reviewer_feedback: "nope".to_string(),
            system_error: false,
            started_at: Utc::now(),
            duration_ms: 10,
        }
    }

    #[tokio::test]
    async fn test_load_plan_from_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.yaml");
        tokio::fs::write(&path, PLAN_YAML).await.unwrap();

        let plan = load_plan(&path).await.unwrap();
        assert_eq!(plan.default_worker, "alpha");
        assert_eq!(plan.quality.max_retries, Some(1));
        assert_eq!(plan.tasks.len(), 2);
        assert_eq!(plan.tasks[1].depends_on, vec![1]);
        assert_eq!(plan.tasks[1].worker.as_deref(), Some("beta"));
    }

    #[tokio::test]
    async fn test_load_rejects_invalid_plan() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.yaml");
        tokio::fs::write(
            &path,
            "default_worker: alpha\ntasks:\n  - id: 0\n    name: bad\n    prompt: p\n",
        )
        .await
        .unwrap();

        assert!(matches!(
            load_plan(&path).await,
            Err(DomainError::ValidationFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_save_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.yaml");

        let plan = Plan::new("alpha", vec![Task::new(1, "t", "p")]);
        save_plan(&path, &plan).await.unwrap();

        let loaded = load_plan(&path).await.unwrap();
        assert_eq!(loaded.default_worker, "alpha");
        assert_eq!(loaded.tasks.len(), 1);
    }

    #[tokio::test]
    async fn test_updater_persists_status_and_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.yaml");
        tokio::fs::write(&path, PLAN_YAML).await.unwrap();

        let plan = load_plan(&path).await.unwrap();
        let updater = YamlPlanUpdater::new(&path, plan);

        updater
            .task_updated(1, TaskStatus::Running, None)
            .await
            .unwrap();
        updater
            .task_updated(1, TaskStatus::Failed, Some(&attempt(1)))
            .await
            .unwrap();

        let reloaded = load_plan(&path).await.unwrap();
        let task = reloaded.task(1).unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.attempts.len(), 1);
        assert_eq!(task.attempts[0].reviewer_feedback, "nope");
    }

    #[tokio::test]
    async fn test_updater_deduplicates_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.yaml");
        tokio::fs::write(&path, PLAN_YAML).await.unwrap();

        let plan = load_plan(&path).await.unwrap();
        let updater = YamlPlanUpdater::new(&path, plan);

        updater
            .task_updated(2, TaskStatus::Running, Some(&attempt(1)))
            .await
            .unwrap();
        updater
            .task_updated(2, TaskStatus::Failed, Some(&attempt(1)))
            .await
            .unwrap();

        let reloaded = load_plan(&path).await.unwrap();
        assert_eq!(reloaded.task(2).unwrap().attempts.len(), 1);
    }

    #[tokio::test]
    async fn test_updater_unknown_task_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.yaml");
        tokio::fs::write(&path, PLAN_YAML).await.unwrap();

        let plan = load_plan(&path).await.unwrap();
        let updater = YamlPlanUpdater::new(&path, plan);

        assert!(matches!(
            updater.task_updated(9, TaskStatus::Running, None).await,
            Err(DomainError::TaskNotFound(9))
        ));
    }
}
