//! Shared test helpers for creating Leecher instances in tests.

use crate::config::Config;
use crate::leecher::{CreateTask, Leecher};
use crate::remote::MemoryRemote;
use crate::task::Task;
use std::sync::Arc;
use tempfile::tempdir;

/// Share id used by [`create_task`]
pub(crate) const SHARE_ID: &str = "1abc";
/// Share password used by [`create_task`]
pub(crate) const SHARE_PASSWORD: &str = "wxyz";
/// Link of the test share
pub(crate) const SHARE_LINK: &str = "https://pan.baidu.com/s/1abc?pwd=wxyz";

/// Test configuration rooted in `dir`
pub(crate) fn test_config(dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.persistence.database_path = dir.join("test.db");
    config.storage.data_root_dir = dir.join("data");
    config.storage.disk_space.enabled = false;
    config
}

/// Create a Leecher over an in-memory remote with a temporary database and data root.
/// Returns the leecher, the remote, and the tempdir (which must be kept alive).
pub(crate) async fn create_test_leecher() -> (Leecher, Arc<MemoryRemote>, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let config = test_config(temp_dir.path());
    let (leecher, remote) = create_test_leecher_with(config).await;
    (leecher, remote, temp_dir)
}

/// Same as [`create_test_leecher`] with a caller-supplied configuration
pub(crate) async fn create_test_leecher_with(config: Config) -> (Leecher, Arc<MemoryRemote>) {
    let remote = Arc::new(MemoryRemote::new());
    let leecher = Leecher::new(config, remote.clone()).await.unwrap();
    (leecher, remote)
}

/// Publish the test share with a small movie tree
pub(crate) async fn publish_share(remote: &MemoryRemote) {
    remote
        .add_share(
            SHARE_ID,
            SHARE_PASSWORD,
            vec![
                ("movie/a.mkv".to_string(), vec![1u8; 50_000]),
                ("movie/b.srt".to_string(), vec![2u8; 100]),
                ("__MACOSX/._a.mkv".to_string(), vec![3u8; 10]),
            ],
        )
        .await;
}

/// Create a task for the test share
pub(crate) async fn create_task(leecher: &Leecher) -> Task {
    leecher
        .create_task(CreateTask {
            shared_link: SHARE_LINK.to_string(),
            ..Default::default()
        })
        .await
        .unwrap()
}

/// Create a task and run it through transfer and sampling
pub(crate) async fn sampled_task(leecher: &Leecher, remote: &MemoryRemote) -> Task {
    publish_share(remote).await;
    let task = create_task(leecher).await;
    let task = leecher.transfer(task.id).await.unwrap();
    assert!(!task.failed, "transfer failed: {}", task.message);
    let task = leecher.download_samples(task.id).await.unwrap();
    assert!(!task.failed, "sampling failed: {}", task.message);
    task
}
