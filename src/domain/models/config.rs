use serde::{Deserialize, Serialize};

/// Main configuration structure for Foreman
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Engine execution settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Worker registry configuration
    #[serde(default)]
    pub workers: WorkersConfig,

    /// Learning history configuration
    #[serde(default)]
    pub learning: LearningConfig,

    /// Reviewer configuration
    #[serde(default)]
    pub review: ReviewConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            logging: LoggingConfig::default(),
            workers: WorkersConfig::default(),
            learning: LearningConfig::default(),
            review: ReviewConfig::default(),
        }
    }
}

/// Engine execution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EngineConfig {
    /// Maximum concurrent task dispatches within a wave; 0 means unbounded
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Hard timeout for a single worker invocation (seconds)
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,

    /// Maximum retries per task (attempts = max_retries + 1)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Swap to a reviewer-suggested worker on retry
    #[serde(default = "default_swap_on_retry")]
    pub swap_on_retry: bool,

    /// Prior failures with the current worker required before a swap
    #[serde(default = "default_min_failures_before_adapt")]
    pub min_failures_before_adapt: u32,

    /// Wall-clock deadline for the whole run (seconds); 0 means none
    #[serde(default)]
    pub overall_deadline_secs: u64,
}

const fn default_max_concurrency() -> usize {
    4
}

const fn default_task_timeout_secs() -> u64 {
    600
}

const fn default_max_retries() -> u32 {
    2
}

const fn default_swap_on_retry() -> bool {
    true
}

const fn default_min_failures_before_adapt() -> u32 {
    2
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            task_timeout_secs: default_task_timeout_secs(),
            max_retries: default_max_retries(),
            swap_on_retry: default_swap_on_retry(),
            min_failures_before_adapt: default_min_failures_before_adapt(),
            overall_deadline_secs: 0,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Worker registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WorkersConfig {
    /// Directory scanned for worker definition files
    #[serde(default = "default_workers_dir")]
    pub dir: String,
}

fn default_workers_dir() -> String {
    ".foreman/workers".to_string()
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            dir: default_workers_dir(),
        }
    }
}

/// Learning history configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LearningConfig {
    /// Enable the learning store; when disabled the engine runs with a
    /// null store (no swap, no history-based decisions)
    #[serde(default = "default_learning_enabled")]
    pub enabled: bool,

    /// Path to the append-only JSONL history file
    #[serde(default = "default_history_path")]
    pub history_path: String,
}

const fn default_learning_enabled() -> bool {
    true
}

fn default_history_path() -> String {
    ".foreman/history.jsonl".to_string()
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            enabled: default_learning_enabled(),
            history_path: default_history_path(),
        }
    }
}

/// Reviewer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ReviewConfig {
    /// Worker names consulted as reviewers; when empty the plan's
    /// default worker reviews its own output
    #[serde(default)]
    pub reviewers: Vec<String>,

    /// Timeout for a single reviewer invocation (seconds)
    #[serde(default = "default_review_timeout_secs")]
    pub timeout_secs: u64,
}

const fn default_review_timeout_secs() -> u64 {
    120
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            reviewers: vec![],
            timeout_secs: default_review_timeout_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.engine.max_concurrency, 4);
        assert_eq!(config.engine.max_retries, 2);
        assert_eq!(config.engine.min_failures_before_adapt, 2);
        assert!(config.engine.swap_on_retry);
        assert_eq!(config.engine.overall_deadline_secs, 0);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.learning.history_path, ".foreman/history.jsonl");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
engine:
  max_concurrency: 8
  task_timeout_secs: 120
  max_retries: 1
  swap_on_retry: false
logging:
  level: debug
  format: json
workers:
  dir: /opt/workers
";
        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");
        assert_eq!(config.engine.max_concurrency, 8);
        assert_eq!(config.engine.task_timeout_secs, 120);
        assert_eq!(config.engine.max_retries, 1);
        assert!(!config.engine.swap_on_retry);
        // Unspecified fields keep their defaults
        assert_eq!(config.engine.min_failures_before_adapt, 2);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.workers.dir, "/opt/workers");
    }
}
