//! Ports: interfaces the engine depends on, implemented by adapters.

pub mod gate;
pub mod hooks;
pub mod learning;
pub mod plan_updater;
pub mod reviewer;
pub mod worker;

pub use gate::{GateResult, GateRunner};
pub use hooks::{FailureGate, NullFailureGate, NullPauseHook, PauseHook, PredictedFailure};
pub use learning::{LearningStore, NullLearningStore};
pub use plan_updater::{NullPlanUpdater, PlanUpdater};
pub use reviewer::Reviewer;
pub use worker::{WorkerInvoker, WorkerRegistry};
