//! Shell-backed test-command gate.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::{GateResult, GateRunner};

/// Runs gate commands through `sh -c`.
#[derive(Debug, Clone, Default)]
pub struct ShellGateRunner;

impl ShellGateRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl GateRunner for ShellGateRunner {
    async fn run(&self, command: &str, cancel: CancellationToken) -> DomainResult<GateResult> {
        debug!(command, "running gate command");
        let child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                DomainError::InvocationFailed(format!("failed to spawn `{command}`: {err}"))
            })?;

        let output = tokio::select! {
            output = child.wait_with_output() => output.map_err(|err| {
                DomainError::InvocationFailed(format!("failed to run `{command}`: {err}"))
            })?,
            () = cancel.cancelled() => {
                // kill_on_drop reaps the child when we bail out here.
                return Ok(GateResult {
                    command: command.to_string(),
                    exit_code: None,
                    output: "cancelled".to_string(),
                });
            }
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            if !combined.is_empty() {
                combined.push('\n');
            }
            combined.push_str(stderr.trim_end());
        }

        Ok(GateResult {
            command: command.to_string(),
            exit_code: output.status.code(),
            output: combined,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_passing_command() {
        let gate = ShellGateRunner::new();
        let result = gate
            .run("echo tests ok", CancellationToken::new())
            .await
            .unwrap();
        assert!(result.passed());
        assert!(result.output.contains("tests ok"));
    }

    #[tokio::test]
    async fn test_failing_command_captures_output() {
        let gate = ShellGateRunner::new();
        let result = gate
            .run("echo '2 tests failed' >&2; exit 1", CancellationToken::new())
            .await
            .unwrap();
        assert!(!result.passed());
        assert_eq!(result.exit_code, Some(1));
        assert!(result.output.contains("2 tests failed"));
    }

    #[tokio::test]
    async fn test_cancelled_gate_does_not_pass() {
        let gate = ShellGateRunner::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = gate.run("sleep 30", cancel).await.unwrap();
        assert!(!result.passed());
    }
}
