//! Engine services: pure graph/scheduling logic and the orchestration
//! layers built on top of it.

pub mod adaptation;
pub mod coordinator;
pub mod dispatch;
pub mod graph;
pub mod patterns;
pub mod scheduler;
pub mod verdict;

pub use adaptation::{AdaptationLoop, RetryDecision};
pub use coordinator::WaveCoordinator;
pub use dispatch::{DispatchFailure, DispatchOutcome, TaskDispatcher};
pub use graph::DependencyGraph;
pub use scheduler::Wave;
