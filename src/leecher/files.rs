//! File operations: listings, deletion, erase and purge.

use super::Leecher;
use crate::error::{Result, TaskError};
use crate::types::{LocalFile, RemoteFile, TaskId};
use crate::utils::list_local_files;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Directory under the data root that purged directories are moved into
pub const TRASH_DIR_NAME: &str = "baidupcsleecher_trash";

/// Outcome of [`Leecher::purge`]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PurgeReport {
    /// Directory names that were purged, sorted
    pub purged: Vec<String>,
    /// Where they were moved, `None` when they were deleted
    pub trash_dir: Option<PathBuf>,
}

impl Leecher {
    /// Remote inventory of a task, paths relative to its remote directory
    pub async fn remote_files(&self, id: TaskId) -> Result<Vec<RemoteFile>> {
        Ok(self.db.require_task(id).await?.files)
    }

    /// Files in the task's local data directory
    pub async fn local_files(&self, id: TaskId) -> Result<Vec<LocalFile>> {
        let task = self.db.require_task(id).await?;
        Ok(list_local_files(&task.data_path(&self.config))?)
    }

    /// Delete the task's remote directory
    pub async fn delete_remote_files(&self, id: TaskId) -> Result<()> {
        let task = self.db.require_task(id).await?;
        let remote_dir = task.remote_path(&self.config);
        self.remote.delete(&remote_dir).await?;
        tracing::info!(task_id = %id, remote_dir = %remote_dir, "remote files deleted");
        Ok(())
    }

    /// Delete the task's local data and sample directories
    pub async fn delete_local_files(&self, id: TaskId) -> Result<()> {
        let task = self.db.require_task(id).await?;
        for dir in [task.data_path(&self.config), task.sample_path(&self.config)] {
            remove_dir_if_exists(&dir).await?;
        }
        tracing::info!(task_id = %id, "local files deleted");
        Ok(())
    }

    /// Delete the task row only; remote and local files stay where they are
    pub async fn delete_task(&self, id: TaskId) -> Result<()> {
        if !self.db.delete_task(id).await? {
            return Err(TaskError::NotFound { id: id.0 }.into());
        }
        tracing::info!(task_id = %id, "task deleted");
        Ok(())
    }

    /// Delete the task's remote files, local files and the task itself
    pub async fn erase(&self, id: TaskId) -> Result<()> {
        self.delete_remote_files(id).await?;
        self.delete_local_files(id).await?;
        self.db.delete_task(id).await?;
        tracing::info!(task_id = %id, "task erased");
        Ok(())
    }

    /// Remove data root directories that look like task directories but belong to no task
    ///
    /// Directory names of the form `<id>.<pwd>` or `<id>.<pwd>.sample` are candidates.
    /// With `move_to_trash` they are moved under [`TRASH_DIR_NAME`], otherwise deleted.
    pub async fn purge(&self, move_to_trash: bool) -> Result<PurgeReport> {
        let root = &self.config.storage.data_root_dir;
        let mut keep = HashSet::new();
        for name in self.db.all_path_names().await? {
            keep.insert(format!("{}.sample", name));
            keep.insert(name);
        }

        let mut useless = Vec::new();
        if root.exists() {
            let mut entries = tokio::fs::read_dir(root).await?;
            while let Some(entry) = entries.next_entry().await? {
                if !entry.file_type().await?.is_dir() {
                    continue;
                }
                let name = entry.file_name().to_string_lossy().into_owned();
                if matches!(name.split('.').count(), 2 | 3) && !keep.contains(&name) {
                    useless.push(name);
                }
            }
        }
        useless.sort();
        tracing::info!(count = useless.len(), move_to_trash, "purging orphan directories");

        let trash_dir = move_to_trash.then(|| root.join(TRASH_DIR_NAME));
        for name in &useless {
            let dir = root.join(name);
            match &trash_dir {
                Some(trash) => {
                    tokio::fs::create_dir_all(trash).await?;
                    let target = trash.join(name);
                    remove_dir_if_exists(&target).await?;
                    tokio::fs::rename(&dir, &target).await?;
                    tracing::debug!(dir = %dir.display(), "moved to trash");
                }
                None => {
                    tokio::fs::remove_dir_all(&dir).await?;
                    tracing::debug!(dir = %dir.display(), "deleted");
                }
            }
        }

        Ok(PurgeReport {
            purged: useless,
            trash_dir,
        })
    }
}

async fn remove_dir_if_exists(dir: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
