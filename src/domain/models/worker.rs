//! Worker invocation domain models.

use serde::{Deserialize, Serialize};

use super::task::TaskId;

/// A resolved worker definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerHandle {
    /// Name tasks and plans refer to this worker by
    pub name: String,
    /// Executable to spawn
    pub command: String,
    /// Arguments passed before the prompt is written to stdin
    #[serde(default)]
    pub args: Vec<String>,
}

impl WorkerHandle {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }
}

/// Request handed to the worker invocation collaborator.
#[derive(Debug, Clone)]
pub struct WorkerRequest {
    pub task_id: TaskId,
    /// Effective prompt (dependency context already prepended)
    pub prompt: String,
    /// Hard per-task timeout in seconds; the dispatcher enforces it, the
    /// invoker may use it to size its own grace periods
    pub timeout_secs: u64,
}

/// Result of one worker invocation.
#[derive(Debug, Clone)]
pub struct WorkerInvocation {
    /// Captured stdout
    pub output: String,
    /// Captured stderr
    pub stderr: String,
    /// Process exit code; `None` when killed by signal
    pub exit_code: Option<i32>,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
    /// The worker signaled a rate-limit/backoff condition
    pub backoff: bool,
}

impl WorkerInvocation {
    /// Whether the worker exited cleanly.
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_builder() {
        let handle = WorkerHandle::new("alpha", "/usr/bin/alpha")
            .with_args(vec!["--stdin".to_string()]);
        assert_eq!(handle.name, "alpha");
        assert_eq!(handle.args, vec!["--stdin"]);
    }

    #[test]
    fn test_invocation_succeeded() {
        let inv = WorkerInvocation {
            output: String::new(),
            stderr: String::new(),
            exit_code: Some(0),
            duration_ms: 5,
            backoff: false,
        };
        assert!(inv.succeeded());
    }
}
