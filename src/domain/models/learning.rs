//! Learning history domain models.
//!
//! Every attempt, pass or fail, is appended to the learning store so
//! later runs (and retries within a run) can pick better workers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::task::TaskId;

/// Keyword-classified category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePattern {
    Compilation,
    Test,
    Dependency,
    Permission,
    Timeout,
    Runtime,
}

impl FailurePattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compilation => "compilation",
            Self::Test => "test",
            Self::Dependency => "dependency",
            Self::Permission => "permission",
            Self::Timeout => "timeout",
            Self::Runtime => "runtime",
        }
    }
}

/// One appended history entry. Immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningRecord {
    pub task_id: TaskId,
    pub worker: String,
    pub succeeded: bool,
    pub detected_patterns: Vec<FailurePattern>,
    pub timestamp: DateTime<Utc>,
    /// Run this record belongs to
    pub session_id: Uuid,
    /// Monotonic run counter across the store's lifetime
    pub run_number: u32,
}

impl LearningRecord {
    pub fn new(
        task_id: TaskId,
        worker: impl Into<String>,
        succeeded: bool,
        detected_patterns: Vec<FailurePattern>,
        session_id: Uuid,
        run_number: u32,
    ) -> Self {
        Self {
            task_id,
            worker: worker.into(),
            succeeded,
            detected_patterns,
            timestamp: Utc::now(),
            session_id,
            run_number,
        }
    }
}
