//! Plan domain model.
//!
//! A plan is the declarative description of a run: the task set, the
//! default worker, and the quality-control settings the loader read
//! alongside them.

use serde::{Deserialize, Serialize};

use super::task::Task;

/// How many reviewers judge each task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewerMode {
    /// Only the first configured reviewer is consulted
    Single,
    /// Every configured reviewer judges every criterion
    Panel,
}

impl Default for ReviewerMode {
    fn default() -> Self {
        Self::Single
    }
}

/// Quality-control settings carried by a plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualitySettings {
    /// Overrides the engine's configured max retries when set
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub reviewer_mode: ReviewerMode,
}

/// A validated set of tasks plus run-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Worker used by tasks that don't name one
    pub default_worker: String,
    #[serde(default)]
    pub quality: QualitySettings,
    pub tasks: Vec<Task>,
}

impl Plan {
    pub fn new(default_worker: impl Into<String>, tasks: Vec<Task>) -> Self {
        Self {
            default_worker: default_worker.into(),
            quality: QualitySettings::default(),
            tasks,
        }
    }

    /// Validate per-task invariants. Graph-level invariants (dangling
    /// dependencies, cycles) are the graph builder's job.
    pub fn validate(&self) -> Result<(), String> {
        if self.default_worker.trim().is_empty() {
            return Err("Plan default worker cannot be empty".to_string());
        }
        for task in &self.tasks {
            task.validate()?;
        }
        Ok(())
    }

    pub fn task(&self, id: super::task::TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_validate() {
        let plan = Plan::new("alpha", vec![Task::new(1, "t", "p")]);
        assert!(plan.validate().is_ok());

        let plan = Plan::new(" ", vec![]);
        assert!(plan.validate().is_err());

        let plan = Plan::new("alpha", vec![Task::new(0, "t", "p")]);
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_reviewer_mode_default_is_single() {
        assert_eq!(QualitySettings::default().reviewer_mode, ReviewerMode::Single);
    }
}
