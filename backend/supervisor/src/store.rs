use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

use courier_core::{TaskId, TaskSnapshot};

use crate::error::StoreError;

/// Persisted tasks keyed by ID.
pub type TaskSnapshots = BTreeMap<TaskId, TaskSnapshot>;

/// Where task snapshots survive a process restart.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn load(&self) -> Result<TaskSnapshots, StoreError>;

    /// Replace the stored set with `tasks`.
    async fn save(&self, tasks: &TaskSnapshots) -> Result<(), StoreError>;
}

/// Pretty-printed JSON object in a single file, replaced atomically on save.
/// Saves are serialized so concurrent writers never share the temp file.
pub struct FileTaskStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileTaskStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TaskStore for FileTaskStore {
    async fn load(&self) -> Result<TaskSnapshots, StoreError> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Task file does not exist; nothing to restore");
                return Ok(TaskSnapshots::new());
            }
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };

        let tasks: TaskSnapshots =
            serde_json::from_str(&raw).map_err(|source| StoreError::Parse {
                path: self.path.clone(),
                source,
            })?;
        info!(path = %self.path.display(), tasks = tasks.len(), "Loaded task file");
        Ok(tasks)
    }

    async fn save(&self, tasks: &TaskSnapshots) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(parent, e))?;
        }

        let json = serde_json::to_string_pretty(tasks)?;

        // Write to temp file, then rename for atomicity.
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, json.as_bytes())
            .await
            .map_err(|e| StoreError::io(&tmp_path, e))?;
        fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| StoreError::io(&self.path, e))?;

        debug!(path = %self.path.display(), tasks = tasks.len(), "Saved task file");
        Ok(())
    }
}
