//! Foreman - plan-driven task orchestration engine.
//!
//! Foreman executes a plan of interdependent tasks by dispatching each
//! to an external worker process, gating the output through reviewers,
//! and retrying failures with adaptive worker selection.
//!
//! # Architecture
//!
//! The crate follows hexagonal architecture:
//!
//! - **Domain layer** (`domain`): pure models, errors, and the ports the
//!   engine depends on
//! - **Service layer** (`services`): graph building, wave scheduling,
//!   dispatch, review aggregation, and the wave coordinator
//! - **Infrastructure layer** (`infrastructure`): adapters for worker
//!   processes, plan files, configuration, and the learning history
//! - **CLI layer** (`cli`): the `foreman` command-line interface

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    Config, EngineConfig, ExecutionReport, ExecutionStatus, Plan, Task, TaskId, TaskStatus,
    Verdict, VerdictKind,
};
pub use services::WaveCoordinator;
