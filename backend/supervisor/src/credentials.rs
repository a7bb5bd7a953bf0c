use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use courier_core::{CredentialStore, TaskId};

use crate::error::StoreError;

/// One `credential_<task id>.txt` file per task under a single directory.
pub struct FileCredentialStore {
    dir: PathBuf,
}

impl FileCredentialStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, task_id: TaskId) -> PathBuf {
        self.dir.join(format!("credential_{task_id}.txt"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn save(&self, task_id: TaskId, credential: &str) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StoreError::io(&self.dir, e))?;
        let path = self.path_for(task_id);
        fs::write(&path, credential.as_bytes())
            .await
            .map_err(|e| StoreError::io(&path, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(|e| StoreError::io(&path, e))?;
        }

        debug!(task_id = %task_id, path = %path.display(), "Credential written");
        Ok(())
    }

    async fn remove(&self, task_id: TaskId) -> anyhow::Result<()> {
        let path = self.path_for(task_id);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(&path, e).into()),
        }
    }
}
