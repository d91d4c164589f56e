//! External worker process invoker.
//!
//! Spawns the worker executable, writes the prompt to its stdin, and
//! captures stdout/stderr. Cancellation is cooperative: the worker's
//! process group gets SIGINT and a grace period before SIGKILL, so it
//! can flush partial artifacts instead of leaving them corrupted.
//! Signals target the group because shell wrappers fork grandchildren
//! that would otherwise survive and hold the output pipes open.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{WorkerHandle, WorkerInvocation, WorkerRequest};
use crate::domain::ports::WorkerInvoker;

/// Marker a worker prints to stderr to signal a rate-limit condition.
pub const BACKOFF_MARKER: &str = "FOREMAN_BACKOFF";

/// Exit code treated as a backoff signal (EX_TEMPFAIL).
pub const BACKOFF_EXIT_CODE: i32 = 75;

const DEFAULT_GRACE_SECS: u64 = 10;

/// Invoker that runs workers as child processes.
pub struct ProcessWorkerInvoker {
    grace: Duration,
}

impl Default for ProcessWorkerInvoker {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(DEFAULT_GRACE_SECS),
        }
    }
}

impl ProcessWorkerInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }
}

#[async_trait]
impl WorkerInvoker for ProcessWorkerInvoker {
    async fn invoke(
        &self,
        handle: &WorkerHandle,
        request: WorkerRequest,
        cancel: CancellationToken,
    ) -> DomainResult<WorkerInvocation> {
        let start = Instant::now();

        let mut child = Command::new(&handle.command)
            .args(&handle.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Own process group, so cancellation signals reach every
            // descendant, not just the direct child.
            .process_group(0)
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                DomainError::InvocationFailed(format!(
                    "failed to spawn worker '{}' ({}): {err}",
                    handle.name, handle.command
                ))
            })?;
        let pid = child.id();

        let mut stdin = child.stdin.take().ok_or_else(|| {
            DomainError::InvocationFailed(format!(
                "no stdin handle for worker '{}'",
                handle.name
            ))
        })?;
        stdin.write_all(request.prompt.as_bytes()).await.map_err(|err| {
            DomainError::InvocationFailed(format!(
                "failed to write prompt to worker '{}': {err}",
                handle.name
            ))
        })?;
        // Close stdin to signal end of input.
        drop(stdin);

        let output_fut = child.wait_with_output();
        tokio::pin!(output_fut);

        let output = tokio::select! {
            result = &mut output_fut => result,
            () = cancel.cancelled() => {
                debug!(worker = %handle.name, task_id = request.task_id, "interrupting worker");
                signal_group(pid, Signal::SIGINT);
                match tokio::time::timeout(self.grace, &mut output_fut).await {
                    Ok(result) => result,
                    Err(_) => {
                        warn!(worker = %handle.name, "worker ignored SIGINT; killing its process group");
                        signal_group(pid, Signal::SIGKILL);
                        match tokio::time::timeout(self.grace, &mut output_fut).await {
                            Ok(result) => result,
                            Err(_) => {
                                return Err(DomainError::InvocationFailed(format!(
                                    "worker '{}' did not exit after SIGKILL",
                                    handle.name
                                )));
                            }
                        }
                    }
                }
            }
        }
        .map_err(|err| {
            DomainError::InvocationFailed(format!(
                "failed to collect output from worker '{}': {err}",
                handle.name
            ))
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let exit_code = output.status.code();
        let backoff = stderr.contains(BACKOFF_MARKER) || exit_code == Some(BACKOFF_EXIT_CODE);

        Ok(WorkerInvocation {
            output: stdout,
            stderr,
            exit_code,
            duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            backoff,
        })
    }
}

// The child is its own group leader (`process_group(0)`), so its pid
// doubles as the pgid.
fn signal_group(pid: Option<u32>, sig: Signal) {
    let Some(pid) = pid else { return };
    let Ok(raw) = i32::try_from(pid) else { return };
    if let Err(err) = signal::killpg(Pid::from_raw(raw), sig) {
        debug!(pid, %err, "signal delivery failed (process group likely gone)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(prompt: &str) -> WorkerRequest {
        WorkerRequest {
            task_id: 1,
            prompt: prompt.to_string(),
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn test_invoke_captures_stdout() {
        let invoker = ProcessWorkerInvoker::new();
        let handle = WorkerHandle::new("cat", "cat");

        let inv = invoker
            .invoke(&handle, request("hello worker"), CancellationToken::new())
            .await
            .unwrap();
        assert!(inv.succeeded());
        assert_eq!(inv.output, "hello worker");
        assert!(!inv.backoff);
    }

    #[tokio::test]
    async fn test_invoke_reports_nonzero_exit() {
        let invoker = ProcessWorkerInvoker::new();
        let handle =
            WorkerHandle::new("false", "sh").with_args(vec!["-c".into(), "exit 3".into()]);

        let inv = invoker
            .invoke(&handle, request(""), CancellationToken::new())
            .await
            .unwrap();
        assert!(!inv.succeeded());
        assert_eq!(inv.exit_code, Some(3));
    }

    #[tokio::test]
    async fn test_missing_executable_is_an_error() {
        let invoker = ProcessWorkerInvoker::new();
        let handle = WorkerHandle::new("ghost", "/nonexistent/worker-binary");

        let result = invoker
            .invoke(&handle, request(""), CancellationToken::new())
            .await;
        assert!(matches!(result, Err(DomainError::InvocationFailed(_))));
    }

    #[tokio::test]
    async fn test_backoff_marker_on_stderr() {
        let invoker = ProcessWorkerInvoker::new();
        let handle = WorkerHandle::new("limited", "sh")
            .with_args(vec!["-c".into(), "echo FOREMAN_BACKOFF >&2".into()]);

        let inv = invoker
            .invoke(&handle, request(""), CancellationToken::new())
            .await
            .unwrap();
        assert!(inv.backoff);
    }

    #[tokio::test]
    async fn test_backoff_exit_code() {
        let invoker = ProcessWorkerInvoker::new();
        let handle =
            WorkerHandle::new("limited", "sh").with_args(vec!["-c".into(), "exit 75".into()]);

        let inv = invoker
            .invoke(&handle, request(""), CancellationToken::new())
            .await
            .unwrap();
        assert!(inv.backoff);
        assert!(!inv.succeeded());
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_a_sleeping_worker() {
        let invoker = ProcessWorkerInvoker::new().with_grace(Duration::from_secs(5));
        let handle =
            WorkerHandle::new("sleeper", "sh").with_args(vec!["-c".into(), "sleep 30".into()]);

        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let started = std::time::Instant::now();
        let inv = invoker.invoke(&handle, request(""), cancel).await.unwrap();
        assert!(!inv.succeeded());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_cancellation_reaches_grandchildren_of_a_shell_wrapper() {
        // The forked grandchild holds the stdout pipe open; only a
        // group-wide signal lets wait_with_output return before the
        // grandchild's own exit.
        let invoker = ProcessWorkerInvoker::new().with_grace(Duration::from_millis(500));
        let handle = WorkerHandle::new("wrapper", "sh")
            .with_args(vec!["-c".into(), "sleep 30 & wait".into()]);

        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let started = std::time::Instant::now();
        let inv = invoker.invoke(&handle, request(""), cancel).await.unwrap();
        assert!(!inv.succeeded());
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
