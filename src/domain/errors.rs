//! Domain errors for the Foreman orchestration engine.

use thiserror::Error;

use crate::domain::models::TaskId;

/// Format a cycle path as a human-readable string: `1 -> 2 -> 1`.
fn format_cycle_path(path: &[TaskId]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Domain-level errors that can occur in the Foreman engine.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Duplicate task id: {0}")]
    DuplicateTaskId(TaskId),

    #[error("Task {task} depends on unknown task {dependency}")]
    UnknownDependency { task: TaskId, dependency: TaskId },

    #[error("Task {0} depends on itself")]
    SelfDependency(TaskId),

    #[error("Task dependency cycle detected: {}", format_cycle_path(.0))]
    DependencyCycle(Vec<TaskId>),

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Worker not found: {0}")]
    WorkerNotFound(String),

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Worker invocation failed: {0}")]
    InvocationFailed(String),

    #[error("Review failed: {0}")]
    ReviewFailed(String),

    #[error("Learning store error: {0}")]
    LearningStoreError(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for DomainError {
    fn from(err: serde_yaml::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_error_reports_id_sequence() {
        let err = DomainError::DependencyCycle(vec![1, 2, 1]);
        assert_eq!(
            err.to_string(),
            "Task dependency cycle detected: 1 -> 2 -> 1"
        );
    }

    #[test]
    fn test_unknown_dependency_message() {
        let err = DomainError::UnknownDependency {
            task: 4,
            dependency: 9,
        };
        assert_eq!(err.to_string(), "Task 4 depends on unknown task 9");
    }
}
