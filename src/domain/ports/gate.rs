//! Test-command gate port.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::errors::DomainResult;

/// Result of running one gate command.
#[derive(Debug, Clone)]
pub struct GateResult {
    pub command: String,
    pub exit_code: Option<i32>,
    /// Combined stdout/stderr, for failure feedback
    pub output: String,
}

impl GateResult {
    pub fn passed(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs a task's configured test commands.
///
/// A non-zero exit is a hard gate: the task fails without reviewers
/// being invoked.
#[async_trait]
pub trait GateRunner: Send + Sync {
    async fn run(&self, command: &str, cancel: CancellationToken) -> DomainResult<GateResult>;
}
