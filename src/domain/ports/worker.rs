//! Worker ports - interfaces for worker discovery and invocation.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::errors::DomainResult;
use crate::domain::models::{WorkerHandle, WorkerInvocation, WorkerRequest};

/// Resolves worker names to handles.
///
/// The engine treats an unresolved worker as a dispatch-time system
/// error: the task fails immediately without consuming a retry slot.
#[async_trait]
pub trait WorkerRegistry: Send + Sync {
    /// Resolve a worker by name.
    async fn resolve(&self, name: &str) -> DomainResult<Option<WorkerHandle>>;

    /// List all known workers.
    async fn list(&self) -> DomainResult<Vec<WorkerHandle>>;
}

/// Invokes an external worker process.
///
/// Implementations must honor `cancel` cooperatively: on cancellation the
/// worker should be asked to stop (e.g. SIGINT) and given a grace period,
/// not killed outright, so partially written artifacts are not corrupted.
#[async_trait]
pub trait WorkerInvoker: Send + Sync {
    /// Execute a request on the given worker.
    ///
    /// An `Err` return means the invocation could not be performed at all
    /// (spawn failure, executable missing) and is classified as a system
    /// error by the dispatcher. A worker that ran and exited non-zero is
    /// an `Ok` with a non-zero `exit_code`.
    async fn invoke(
        &self,
        handle: &WorkerHandle,
        request: WorkerRequest,
        cancel: CancellationToken,
    ) -> DomainResult<WorkerInvocation>;
}
