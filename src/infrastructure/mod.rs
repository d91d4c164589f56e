//! Infrastructure adapters implementing the domain ports.

pub mod config;
pub mod gate;
pub mod history;
pub mod pause;
pub mod plan;
pub mod review;
pub mod workers;

pub use config::ConfigLoader;
pub use gate::ShellGateRunner;
pub use history::{JsonlLearningStore, MemoryLearningStore};
pub use pause::ExponentialPauseHook;
pub use plan::YamlPlanUpdater;
pub use review::WorkerReviewer;
