//! Directory-backed worker registry.
//!
//! Scans a directory for YAML worker definitions at load time. Each
//! `<name>.yaml` file describes one worker; the file stem is the worker
//! name unless the file overrides it.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::domain::errors::DomainResult;
use crate::domain::models::WorkerHandle;
use crate::domain::ports::WorkerRegistry;

#[derive(Debug, Deserialize)]
struct WorkerDef {
    #[serde(default)]
    name: Option<String>,
    command: String,
    #[serde(default)]
    args: Vec<String>,
}

/// Registry loaded from a directory of worker definition files.
pub struct DirWorkerRegistry {
    workers: HashMap<String, WorkerHandle>,
}

impl DirWorkerRegistry {
    /// Scan `dir` for `*.yaml` / `*.yml` definitions. A missing
    /// directory yields an empty registry; unresolvable workers then
    /// surface as dispatch-time system errors rather than aborting the
    /// whole run up front. Malformed files are skipped with a warning.
    pub async fn load(dir: impl AsRef<Path>) -> DomainResult<Self> {
        let dir = dir.as_ref();
        let mut workers = HashMap::new();

        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!(dir = %dir.display(), "workers directory not found; registry is empty");
                return Ok(Self { workers });
            }
            Err(err) => return Err(err.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_yaml = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == "yaml" || ext == "yml");
            if !is_yaml {
                continue;
            }

            let contents = match tokio::fs::read_to_string(&path).await {
                Ok(contents) => contents,
                Err(err) => {
                    warn!(path = %path.display(), %err, "skipping unreadable worker definition");
                    continue;
                }
            };
            let def: WorkerDef = match serde_yaml::from_str(&contents) {
                Ok(def) => def,
                Err(err) => {
                    warn!(path = %path.display(), %err, "skipping malformed worker definition");
                    continue;
                }
            };

            let name = def.name.unwrap_or_else(|| {
                path.file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_default()
            });
            if name.is_empty() || def.command.trim().is_empty() {
                warn!(path = %path.display(), "skipping worker definition without name or command");
                continue;
            }

            debug!(worker = %name, command = %def.command, "registered worker");
            workers.insert(
                name.clone(),
                WorkerHandle::new(name, def.command).with_args(def.args),
            );
        }

        Ok(Self { workers })
    }
}

#[async_trait]
impl WorkerRegistry for DirWorkerRegistry {
    async fn resolve(&self, name: &str) -> DomainResult<Option<WorkerHandle>> {
        Ok(self.workers.get(name).cloned())
    }

    async fn list(&self) -> DomainResult<Vec<WorkerHandle>> {
        let mut workers: Vec<WorkerHandle> = self.workers.values().cloned().collect();
        workers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(workers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn write_def(dir: &Path, file: &str, contents: &str) {
        tokio::fs::write(dir.join(file), contents).await.unwrap();
    }

    #[tokio::test]
    async fn test_load_and_resolve() {
        let dir = tempfile::tempdir().unwrap();
        write_def(
            dir.path(),
            "alpha.yaml",
            "command: /usr/bin/alpha\nargs: [--stdin]\n",
        )
        .await;
        write_def(dir.path(), "beta.yml", "name: beta-pro\ncommand: /usr/bin/beta\n").await;
        write_def(dir.path(), "notes.txt", "not a worker").await;

        let registry = DirWorkerRegistry::load(dir.path()).await.unwrap();

        let alpha = registry.resolve("alpha").await.unwrap().unwrap();
        assert_eq!(alpha.command, "/usr/bin/alpha");
        assert_eq!(alpha.args, vec!["--stdin"]);

        // Explicit name overrides the file stem.
        assert!(registry.resolve("beta-pro").await.unwrap().is_some());
        assert!(registry.resolve("beta").await.unwrap().is_none());
        assert!(registry.resolve("notes").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_directory_yields_empty_registry() {
        let dir = tempfile::tempdir().unwrap();
        let registry = DirWorkerRegistry::load(dir.path().join("missing"))
            .await
            .unwrap();
        assert!(registry.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_definitions_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_def(dir.path(), "good.yaml", "command: /bin/good\n").await;
        write_def(dir.path(), "bad.yaml", "{{ not yaml").await;
        write_def(dir.path(), "empty.yaml", "command: ''\n").await;

        let registry = DirWorkerRegistry::load(dir.path()).await.unwrap();
        let names: Vec<String> = registry
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|w| w.name)
            .collect();
        assert_eq!(names, vec!["good"]);
    }
}
