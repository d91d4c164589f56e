//! Execution events and run reporting.

use serde::{Deserialize, Serialize};

use super::task::{AttemptRecord, TaskId, TaskStatus};

/// Status of a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Every task passed
    Completed,
    /// Some tasks passed, some failed or were blocked
    PartialSuccess,
    /// No task passed
    Failed,
    /// The overall deadline expired before the run settled
    Canceled,
}

/// Final state of one task after the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRunResult {
    pub task_id: TaskId,
    pub name: String,
    pub status: TaskStatus,
    /// Reason a task was blocked without dispatch, when applicable
    pub blocked_reason: Option<String>,
    pub attempts: Vec<AttemptRecord>,
}

/// Summary of a whole run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub total_tasks: usize,
    pub passed_tasks: usize,
    pub failed_tasks: usize,
    pub blocked_tasks: usize,
    /// Tasks never started (deadline expired before their wave)
    pub pending_tasks: usize,
    pub total_duration_ms: u64,
    pub deadline_expired: bool,
    pub task_results: Vec<TaskRunResult>,
}

impl ExecutionReport {
    pub fn success_rate(&self) -> f64 {
        if self.total_tasks == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            self.passed_tasks as f64 / self.total_tasks as f64
        }
    }

    pub fn status(&self) -> ExecutionStatus {
        if self.deadline_expired {
            ExecutionStatus::Canceled
        } else if self.passed_tasks == self.total_tasks {
            ExecutionStatus::Completed
        } else if self.passed_tasks > 0 {
            ExecutionStatus::PartialSuccess
        } else {
            ExecutionStatus::Failed
        }
    }
}

/// Event emitted during execution.
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    /// Execution started.
    Started { total_tasks: usize, wave_count: usize },
    /// Wave started.
    WaveStarted { wave_number: usize, task_count: usize },
    /// Task attempt started.
    TaskStarted {
        task_id: TaskId,
        name: String,
        worker: String,
        attempt: u32,
    },
    /// Task is being retried, possibly on a different worker.
    TaskRetrying {
        task_id: TaskId,
        attempt: u32,
        max_attempts: u32,
        worker: String,
    },
    /// Task reached a terminal per-run outcome.
    TaskCompleted {
        task_id: TaskId,
        status: TaskStatus,
        feedback: String,
    },
    /// Task was blocked without dispatch.
    TaskBlocked { task_id: TaskId, reason: String },
    /// Wave settled.
    WaveCompleted {
        wave_number: usize,
        passed: usize,
        failed: usize,
        blocked: usize,
    },
    /// Execution finished.
    Completed {
        status: ExecutionStatus,
        report: ExecutionReport,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(passed: usize, failed: usize, blocked: usize) -> ExecutionReport {
        ExecutionReport {
            total_tasks: passed + failed + blocked,
            passed_tasks: passed,
            failed_tasks: failed,
            blocked_tasks: blocked,
            ..Default::default()
        }
    }

    #[test]
    fn test_status_all_passed() {
        assert_eq!(report(3, 0, 0).status(), ExecutionStatus::Completed);
    }

    #[test]
    fn test_status_partial() {
        assert_eq!(report(2, 1, 1).status(), ExecutionStatus::PartialSuccess);
    }

    #[test]
    fn test_status_failed() {
        assert_eq!(report(0, 2, 1).status(), ExecutionStatus::Failed);
    }

    #[test]
    fn test_status_canceled_wins() {
        let mut r = report(3, 0, 0);
        r.deadline_expired = true;
        assert_eq!(r.status(), ExecutionStatus::Canceled);
    }

    #[test]
    fn test_success_rate() {
        let r = report(8, 2, 0);
        assert!((r.success_rate() - 0.8).abs() < 0.001);
        assert_eq!(report(0, 0, 0).success_rate(), 0.0);
    }
}
