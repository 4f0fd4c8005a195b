//! Common test utilities for baidupcs-leecher integration tests

#![allow(dead_code)]

use baidupcs_leecher::{Config, CreateTask, Leecher, MemoryRemote, Poller, PollerKind, Task};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Link of the published test share
pub const SHARE_LINK: &str = "https://pan.baidu.com/s/1movie?pwd=pw42";

/// Size of the large file in the test share
pub const MOVIE_SIZE: usize = 64_000;

/// Configuration rooted in a temporary directory
pub fn temp_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.persistence.database_path = dir.path().join("leecher.db");
    config.storage.data_root_dir = dir.path().join("data");
    config.storage.disk_space.enabled = false;
    config
}

/// A leecher over an in-memory remote; keep the tempdir alive
pub async fn create_leecher_with(
    configure: impl FnOnce(&mut Config),
) -> (Leecher, Arc<MemoryRemote>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = temp_config(&dir);
    configure(&mut config);

    let remote = Arc::new(MemoryRemote::new());
    let leecher = Leecher::new(config, remote.clone()).await.unwrap();
    (leecher, remote, dir)
}

/// A leecher with the default test configuration
pub async fn create_leecher() -> (Leecher, Arc<MemoryRemote>, TempDir) {
    create_leecher_with(|_| {}).await
}

/// Publish the share behind [`SHARE_LINK`]
pub async fn publish_share(remote: &MemoryRemote) {
    remote
        .add_share(
            "1movie",
            "pw42",
            vec![
                ("Movie/movie.mkv".to_string(), vec![7u8; MOVIE_SIZE]),
                ("Movie/subs/en.srt".to_string(), vec![8u8; 300]),
                ("Movie/spam.txt".to_string(), vec![9u8; 50]),
            ],
        )
        .await;
}

/// Create a task for [`SHARE_LINK`]
pub async fn create_task(leecher: &Leecher) -> Task {
    leecher
        .create_task(CreateTask {
            shared_link: SHARE_LINK.to_string(),
            ..Default::default()
        })
        .await
        .unwrap()
}

/// Run one sweep of each poller, in pipeline order
pub async fn sweep_all(leecher: &Leecher) {
    for kind in [
        PollerKind::Resume,
        PollerKind::Transfer,
        PollerKind::Sampling,
        PollerKind::Leech,
    ] {
        Poller::new(kind, leecher.clone(), CancellationToken::new())
            .run(true)
            .await;
    }
}
