use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::config::RunnerConfig;
use crate::error::{AppError, Result};
use crate::workflow::types::RunRecord;

/// On-disk directory for one run: task I/O files and the final record.
#[derive(Debug, Clone)]
pub struct RunStore {
    root: PathBuf,
    persist_io: bool,
}

impl RunStore {
    /// Create `<output_dir>/<process_id>/<run_id>/`.
    pub async fn create(config: &RunnerConfig, process_id: &str, run_id: &str) -> Result<Self> {
        let root = config.output_dir.join(process_id).join(run_id);
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| AppError::Store(format!("Failed to create run directory: {e}")))?;

        tracing::debug!(path = %root.display(), "Run directory ready");
        Ok(Self {
            root,
            persist_io: config.persist_io,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `value` as pretty JSON at `relative` under the run directory.
    pub async fn write_json<T: Serialize>(&self, relative: &str, value: &T) -> Result<PathBuf> {
        let path = self.verify_path(Path::new(relative))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Store(format!("Failed to create directory: {e}")))?;
        }

        let body = serde_json::to_vec_pretty(value)?;
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| AppError::Store(format!("Failed to write {}: {e}", path.display())))?;

        Ok(path)
    }

    /// Write a task's input or output file, unless task I/O persistence is off.
    pub async fn write_task_json<T: Serialize>(&self, relative: &str, value: &T) -> Result<()> {
        if self.persist_io {
            self.write_json(relative, value).await?;
        }
        Ok(())
    }

    pub async fn write_record(&self, record: &RunRecord) -> Result<PathBuf> {
        let path = self.write_json("result.json", record).await?;
        tracing::info!(path = %path.display(), "Run record written");
        Ok(path)
    }

    /// Reject paths that would escape the run directory.
    fn verify_path(&self, relative: &Path) -> Result<PathBuf> {
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(AppError::Store(format!(
                "Path traversal detected: {} is outside the run directory",
                relative.display()
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn store(tmp: &tempfile::TempDir) -> RunStore {
        let config = RunnerConfig {
            output_dir: tmp.path().to_path_buf(),
            persist_io: true,
        };
        RunStore::create(&config, "api-testing", "run-1").await.unwrap()
    }

    #[tokio::test]
    async fn test_writes_task_io_under_run_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(&tmp).await;

        let path = store
            .write_json("tasks/001-api-discovery/input.json", &json!({ "baseUrl": "https://api" }))
            .await
            .unwrap();

        assert!(path.starts_with(tmp.path().join("api-testing").join("run-1")));
        let written: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(written["baseUrl"], "https://api");
    }

    #[tokio::test]
    async fn test_task_io_can_be_disabled() {
        let tmp = tempfile::tempdir().unwrap();
        let config = RunnerConfig {
            output_dir: tmp.path().to_path_buf(),
            persist_io: false,
        };
        let store = RunStore::create(&config, "api-testing", "run-2").await.unwrap();

        store
            .write_task_json("tasks/001-api-discovery/output.json", &json!({}))
            .await
            .unwrap();
        assert!(!store.root().join("tasks").exists());
    }

    #[tokio::test]
    async fn test_rejects_traversal() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(&tmp).await;

        assert!(store.write_json("../escape.json", &json!({})).await.is_err());
        assert!(store.write_json("/etc/escape.json", &json!({})).await.is_err());
    }
}
