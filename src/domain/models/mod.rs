//! Domain models: pure data, no I/O.

pub mod config;
pub mod learning;
pub mod plan;
pub mod report;
pub mod task;
pub mod verdict;
pub mod worker;

pub use config::{
    Config, EngineConfig, LearningConfig, LoggingConfig, ReviewConfig, WorkersConfig,
};
pub use learning::{FailurePattern, LearningRecord};
pub use plan::{Plan, QualitySettings, ReviewerMode};
pub use report::{ExecutionEvent, ExecutionReport, ExecutionStatus, TaskRunResult};
pub use task::{AttemptRecord, Task, TaskId, TaskKind, TaskStatus};
pub use verdict::{
    CriterionJudgment, CriterionResult, LegacyReview, ParsedReview, RequirementTier,
    ReviewerReport, ReviewerResponse, Verdict, VerdictKind,
};
pub use worker::{WorkerHandle, WorkerInvocation, WorkerRequest};
