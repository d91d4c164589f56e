//! Task domain model.
//!
//! Tasks are discrete units of work dispatched to external workers.
//! They form a DAG through their `depends_on` references.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::verdict::VerdictKind;

/// Plan-scoped task identifier. Positive and unique within a plan.
pub type TaskId = u32;

/// Status of a task in the execution pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task is defined but has not been dispatched yet
    Pending,
    /// Task is currently being executed (covers all attempts)
    Running,
    /// Task output passed review
    Passed,
    /// Task failed terminally (retries exhausted or system error)
    Failed,
    /// An ancestor failed or was blocked; task was never dispatched
    Blocked,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Blocked => "blocked",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "passed" => Some(Self::Passed),
            "failed" => Some(Self::Failed),
            "blocked" => Some(Self::Blocked),
            _ => None,
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Passed | Self::Failed | Self::Blocked)
    }

    /// Valid transitions from this status.
    pub fn valid_transitions(&self) -> Vec<TaskStatus> {
        match self {
            Self::Pending => vec![Self::Running, Self::Blocked],
            Self::Running => vec![Self::Passed, Self::Failed],
            Self::Passed | Self::Failed | Self::Blocked => vec![],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

/// Kind of work a task represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Ordinary implementation work
    Regular,
    /// A self-contained component
    Component,
    /// Integrates work from upstream tasks; reviewed against
    /// `integration_criteria` in addition to `success_criteria`
    Integration,
}

impl Default for TaskKind {
    fn default() -> Self {
        Self::Regular
    }
}

/// One execution attempt of a task. Immutable once appended; the full
/// list is the task's audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// 1-based attempt counter
    pub attempt_number: u32,
    /// Worker that executed this attempt
    pub worker: String,
    /// Outcome of the attempt
    pub verdict: VerdictKind,
    /// Raw output captured from the worker
    pub raw_output: String,
    /// Aggregated reviewer feedback for this attempt
    pub reviewer_feedback: String,
    /// Spawn-level failure (worker missing, process error). Non-retryable.
    #[serde(default)]
    pub system_error: bool,
    /// When the attempt started
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
}

/// A unit of work dispatched to an external worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier within the plan (> 0)
    pub id: TaskId,
    /// Human-readable name
    pub name: String,
    /// Paths this task touches
    #[serde(default)]
    pub files: Vec<String>,
    /// Task ids this task depends on
    #[serde(default)]
    pub depends_on: Vec<TaskId>,
    /// Assigned worker; `None` means "use the plan default"
    #[serde(default)]
    pub worker: Option<String>,
    /// Instruction prompt handed to the worker
    pub prompt: String,
    /// Kind of work
    #[serde(default)]
    pub kind: TaskKind,
    /// Per-criterion review requirements; empty selects legacy review
    #[serde(default)]
    pub success_criteria: Vec<String>,
    /// Extra criteria applied when `kind` is `Integration`
    #[serde(default)]
    pub integration_criteria: Vec<String>,
    /// Shell commands run as a hard gate before review
    #[serde(default)]
    pub test_commands: Vec<String>,
    /// Current status
    #[serde(default)]
    pub status: TaskStatus,
    /// Audit trail of execution attempts
    #[serde(default)]
    pub attempts: Vec<AttemptRecord>,
}

impl Task {
    /// Create a new pending task.
    pub fn new(id: TaskId, name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            files: Vec::new(),
            depends_on: Vec::new(),
            worker: None,
            prompt: prompt.into(),
            kind: TaskKind::default(),
            success_criteria: Vec::new(),
            integration_criteria: Vec::new(),
            test_commands: Vec::new(),
            status: TaskStatus::default(),
            attempts: Vec::new(),
        }
    }

    /// Add a dependency.
    pub fn with_dependency(mut self, task_id: TaskId) -> Self {
        if !self.depends_on.contains(&task_id) && task_id != self.id {
            self.depends_on.push(task_id);
        }
        self
    }

    /// Set the assigned worker.
    pub fn with_worker(mut self, worker: impl Into<String>) -> Self {
        self.worker = Some(worker.into());
        self
    }

    /// Set the task kind.
    pub fn with_kind(mut self, kind: TaskKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the touched files.
    pub fn with_files(mut self, files: Vec<String>) -> Self {
        self.files = files;
        self
    }

    /// Set success criteria.
    pub fn with_success_criteria(mut self, criteria: Vec<String>) -> Self {
        self.success_criteria = criteria;
        self
    }

    /// Set integration criteria.
    pub fn with_integration_criteria(mut self, criteria: Vec<String>) -> Self {
        self.integration_criteria = criteria;
        self
    }

    /// Set hard-gate test commands.
    pub fn with_test_commands(mut self, commands: Vec<String>) -> Self {
        self.test_commands = commands;
        self
    }

    /// Check if can transition to given status.
    pub fn can_transition_to(&self, new_status: TaskStatus) -> bool {
        self.status.can_transition_to(new_status)
    }

    /// Transition to new status.
    pub fn transition_to(&mut self, new_status: TaskStatus) -> Result<(), String> {
        if !self.can_transition_to(new_status) {
            return Err(format!(
                "Cannot transition from {} to {}",
                self.status.as_str(),
                new_status.as_str()
            ));
        }
        self.status = new_status;
        Ok(())
    }

    /// Check if task is terminal.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// The worker this task runs on, falling back to the plan default.
    pub fn effective_worker<'a>(&'a self, default_worker: &'a str) -> &'a str {
        match self.worker.as_deref() {
            Some(w) if !w.is_empty() => w,
            _ => default_worker,
        }
    }

    /// Review criteria in effect for this task: success criteria followed
    /// by integration criteria for integration tasks. Empty selects the
    /// legacy blob review mode.
    pub fn review_criteria(&self) -> Vec<&str> {
        let mut criteria: Vec<&str> = self.success_criteria.iter().map(String::as_str).collect();
        if self.kind == TaskKind::Integration {
            criteria.extend(self.integration_criteria.iter().map(String::as_str));
        }
        criteria
    }

    /// Validate plan-load invariants local to a single task.
    pub fn validate(&self) -> Result<(), String> {
        if self.id == 0 {
            return Err("Task id must be positive".to_string());
        }
        if self.name.trim().is_empty() {
            return Err(format!("Task {} name cannot be empty", self.id));
        }
        if self.prompt.trim().is_empty() {
            return Err(format!("Task {} prompt cannot be empty", self.id));
        }
        if self.depends_on.contains(&self.id) {
            return Err(format!("Task {} cannot depend on itself", self.id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_creation() {
        let task = Task::new(1, "Build parser", "Implement the parser module");
        assert_eq!(task.id, 1);
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.attempts.is_empty());
        assert_eq!(task.kind, TaskKind::Regular);
    }

    #[test]
    fn test_status_transitions() {
        let mut task = Task::new(1, "t", "p");
        assert!(task.can_transition_to(TaskStatus::Running));
        task.transition_to(TaskStatus::Running).unwrap();
        task.transition_to(TaskStatus::Passed).unwrap();
        assert!(task.is_terminal());
        assert!(task.transition_to(TaskStatus::Running).is_err());
    }

    #[test]
    fn test_pending_can_block_but_running_cannot() {
        let mut task = Task::new(1, "t", "p");
        assert!(task.can_transition_to(TaskStatus::Blocked));
        task.transition_to(TaskStatus::Running).unwrap();
        assert!(!task.can_transition_to(TaskStatus::Blocked));
    }

    #[test]
    fn test_self_dependency_ignored_by_builder() {
        let task = Task::new(3, "t", "p").with_dependency(3).with_dependency(1);
        assert_eq!(task.depends_on, vec![1]);
    }

    #[test]
    fn test_effective_worker_falls_back_to_default() {
        let task = Task::new(1, "t", "p");
        assert_eq!(task.effective_worker("alpha"), "alpha");

        let task = task.with_worker("beta");
        assert_eq!(task.effective_worker("alpha"), "beta");

        let mut task = Task::new(2, "t", "p");
        task.worker = Some(String::new());
        assert_eq!(task.effective_worker("alpha"), "alpha");
    }

    #[test]
    fn test_review_criteria_includes_integration_only_for_integration_kind() {
        let task = Task::new(1, "t", "p")
            .with_success_criteria(vec!["MUST: compiles".to_string()])
            .with_integration_criteria(vec!["MUST: links against task 2".to_string()]);
        assert_eq!(task.review_criteria().len(), 1);

        let task = task.with_kind(TaskKind::Integration);
        assert_eq!(task.review_criteria().len(), 2);
    }

    #[test]
    fn test_validate() {
        assert!(Task::new(0, "t", "p").validate().is_err());
        assert!(Task::new(1, " ", "p").validate().is_err());
        assert!(Task::new(1, "t", " ").validate().is_err());
        assert!(Task::new(1, "t", "p").validate().is_ok());

        let mut task = Task::new(1, "t", "p");
        task.depends_on.push(1);
        assert!(task.validate().is_err());
    }
}
