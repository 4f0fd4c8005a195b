mod close;
mod tasks;

use crate::db::{Database, NewTask};
use crate::types::TaskId;
use tempfile::NamedTempFile;

/// Open a fresh database backed by a temp file; keep the file alive for the test
pub(super) async fn open() -> (Database, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    (db, temp_file)
}

pub(super) fn new_task(shared_id: &str) -> NewTask {
    NewTask {
        shared_link: format!("https://pan.baidu.com/s/{}", shared_id),
        shared_id: shared_id.to_string(),
        shared_password: "pass".to_string(),
        full_download_now: false,
        callback: None,
    }
}

pub(super) async fn insert(db: &Database, shared_id: &str) -> TaskId {
    db.insert_task(&new_task(shared_id)).await.unwrap()
}
