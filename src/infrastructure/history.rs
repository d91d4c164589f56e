//! Learning store adapters.
//!
//! `JsonlLearningStore` persists one JSON record per line in an
//! append-only file. The full history is held in memory for queries;
//! the file is the durable log. Corrupt lines found at open time are
//! skipped with a warning rather than failing the run.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{FailurePattern, LearningRecord, TaskId};
use crate::domain::ports::LearningStore;

struct Inner {
    file: tokio::fs::File,
    records: Vec<LearningRecord>,
}

/// Append-only JSONL history file.
pub struct JsonlLearningStore {
    path: PathBuf,
    inner: Mutex<Inner>,
}

impl JsonlLearningStore {
    /// Open (or create) the history file and load existing records.
    pub async fn open(path: impl AsRef<Path>) -> DomainResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let records = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => parse_records(&contents, &path),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(err.into()),
        };
        debug!(path = %path.display(), records = records.len(), "opened learning history");

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        Ok(Self {
            path,
            inner: Mutex::new(Inner { file, records }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn parse_records(contents: &str, path: &Path) -> Vec<LearningRecord> {
    let mut records = Vec::new();
    for (line_number, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<LearningRecord>(line) {
            Ok(record) => records.push(record),
            Err(err) => warn!(
                path = %path.display(),
                line = line_number + 1,
                %err,
                "skipping corrupt history line"
            ),
        }
    }
    records
}

#[async_trait]
impl LearningStore for JsonlLearningStore {
    async fn append(&self, record: LearningRecord) -> DomainResult<()> {
        let mut line = serde_json::to_string(&record)
            .map_err(|err| DomainError::LearningStoreError(err.to_string()))?;
        line.push('\n');

        // One lock covers both the file write and the in-memory push, so
        // concurrent appends stay line-atomic and the two views agree.
        let mut inner = self.inner.lock().await;
        inner
            .file
            .write_all(line.as_bytes())
            .await
            .map_err(|err| DomainError::LearningStoreError(err.to_string()))?;
        inner
            .file
            .flush()
            .await
            .map_err(|err| DomainError::LearningStoreError(err.to_string()))?;
        inner.records.push(record);
        Ok(())
    }

    async fn failure_count(&self, task_id: TaskId, worker: &str) -> DomainResult<u32> {
        let inner = self.inner.lock().await;
        let count = inner
            .records
            .iter()
            .filter(|r| r.task_id == task_id && r.worker == worker && !r.succeeded)
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn best_worker_for_pattern(
        &self,
        pattern: FailurePattern,
    ) -> DomainResult<Option<String>> {
        let inner = self.inner.lock().await;
        Ok(rank_workers_for_pattern(&inner.records, pattern))
    }

    async fn last_run_number(&self) -> DomainResult<u32> {
        let inner = self.inner.lock().await;
        Ok(inner.records.iter().map(|r| r.run_number).max().unwrap_or(0))
    }
}

/// Rank workers by success rate among records tagged with `pattern`.
/// Workers without a recorded success never rank; ties break toward the
/// lexicographically smaller name so the answer is stable.
fn rank_workers_for_pattern(
    records: &[LearningRecord],
    pattern: FailurePattern,
) -> Option<String> {
    let mut tallies: HashMap<&str, (u32, u32)> = HashMap::new();
    for record in records {
        if !record.detected_patterns.contains(&pattern) {
            continue;
        }
        let tally = tallies.entry(record.worker.as_str()).or_insert((0, 0));
        tally.1 += 1;
        if record.succeeded {
            tally.0 += 1;
        }
    }

    tallies
        .into_iter()
        .filter(|(_, (successes, _))| *successes > 0)
        .max_by(|(name_a, (s_a, t_a)), (name_b, (s_b, t_b))| {
            let rate_a = f64::from(*s_a) / f64::from(*t_a);
            let rate_b = f64::from(*s_b) / f64::from(*t_b);
            rate_a
                .partial_cmp(&rate_b)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| name_b.cmp(name_a))
        })
        .map(|(name, _)| name.to_string())
}

/// In-memory store for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryLearningStore {
    records: Mutex<Vec<LearningRecord>>,
}

impl MemoryLearningStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<LearningRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl LearningStore for MemoryLearningStore {
    async fn append(&self, record: LearningRecord) -> DomainResult<()> {
        self.records.lock().await.push(record);
        Ok(())
    }

    async fn failure_count(&self, task_id: TaskId, worker: &str) -> DomainResult<u32> {
        let records = self.records.lock().await;
        let count = records
            .iter()
            .filter(|r| r.task_id == task_id && r.worker == worker && !r.succeeded)
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn best_worker_for_pattern(
        &self,
        pattern: FailurePattern,
    ) -> DomainResult<Option<String>> {
        let records = self.records.lock().await;
        Ok(rank_workers_for_pattern(&records, pattern))
    }

    async fn last_run_number(&self) -> DomainResult<u32> {
        let records = self.records.lock().await;
        Ok(records.iter().map(|r| r.run_number).max().unwrap_or(0))
    }
}
