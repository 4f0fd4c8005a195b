use super::*;

#[tokio::test]
async fn test_download_requires_gate() {
    let (leecher, remote, _temp_dir) = create_test_leecher().await;
    let task = sampled_task(&leecher, &remote).await;

    let err = leecher.download_files(task.id).await.unwrap_err();
    assert!(matches!(err, Error::Task(TaskError::InvalidState { .. })));
    assert_eq!(
        leecher.get_task(task.id).await.unwrap().current_stage(),
        Some(crate::types::Stage::WaitingPermitDownload)
    );
}

#[tokio::test]
async fn test_download_fetches_everything() {
    let (leecher, remote, _temp_dir) = create_test_leecher().await;
    let task = sampled_task(&leecher, &remote).await;
    leecher.set_full_download_now(task.id, true).await.unwrap();

    let task = leecher.download_files(task.id).await.unwrap();
    assert!(!task.failed, "{}", task.message);
    assert_eq!(task.status, Status::Finished);
    assert!(task.done());
    assert!(task.finished_at.is_some());

    let data_root = task.data_path(leecher.config());
    assert_eq!(
        std::fs::metadata(data_root.join("movie/a.mkv")).unwrap().len(),
        50_000
    );
    assert_eq!(
        std::fs::metadata(data_root.join("movie/b.srt")).unwrap().len(),
        100
    );
    assert!(!data_root.join("__MACOSX").exists());

    let local = leecher.local_files(task.id).await.unwrap();
    let paths: Vec<&str> = local.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["movie/a.mkv", "movie/b.srt"]);
}

#[tokio::test]
async fn test_download_skips_complete_files() {
    let (leecher, remote, _temp_dir) = create_test_leecher().await;
    let task = sampled_task(&leecher, &remote).await;
    leecher.set_full_download_now(task.id, true).await.unwrap();
    let downloads_before = remote.calls(Operation::Download).await;

    let data_root = task.data_path(leecher.config());
    std::fs::create_dir_all(data_root.join("movie")).unwrap();
    std::fs::write(data_root.join("movie/a.mkv"), vec![1u8; 50_000]).unwrap();
    std::fs::write(data_root.join("movie/b.srt"), vec![2u8; 3]).unwrap();

    let task = leecher.download_files(task.id).await.unwrap();
    assert_eq!(task.status, Status::Finished);
    assert_eq!(remote.calls(Operation::Download).await - downloads_before, 1);
    assert_eq!(
        std::fs::metadata(data_root.join("movie/b.srt")).unwrap().len(),
        100
    );
}

#[tokio::test]
async fn test_download_failure_keeps_status() {
    let (leecher, remote, _temp_dir) = create_test_leecher().await;
    let task = sampled_task(&leecher, &remote).await;
    leecher.set_full_download_now(task.id, true).await.unwrap();
    remote.fail_next(Operation::Download, connection_reset()).await;

    let task = leecher.download_files(task.id).await.unwrap();
    assert!(task.failed);
    assert_eq!(task.status, Status::SampleDownloaded);
    assert!(task.full_downloaded_at.is_none());
    assert!(!task.done());
    assert!(task.recoverable());
}

#[tokio::test]
async fn test_download_checks_disk_space() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = test_config(temp_dir.path());
    config.storage.disk_space.enabled = true;
    config.storage.disk_space.min_free_space = u64::MAX / 2;
    let (leecher, remote) = create_test_leecher_with(config).await;
    let task = sampled_task(&leecher, &remote).await;
    leecher.set_full_download_now(task.id, true).await.unwrap();
    let downloads_before = remote.calls(Operation::Download).await;

    let task = leecher.download_files(task.id).await.unwrap();
    assert!(task.failed);
    assert!(task.message.contains("insufficient disk space"), "{}", task.message);
    assert!(!task.recoverable());
    assert_eq!(remote.calls(Operation::Download).await, downloads_before);
}

#[tokio::test]
async fn test_download_skips_paths_outside_task() {
    let (leecher, remote, temp_dir) = create_test_leecher().await;
    let mut task = sampled_task(&leecher, &remote).await;
    task.files.extend(escaping_entries());
    task.full_download_now = true;
    leecher.db.save_task(&task).await.unwrap();

    let task = leecher.download_files(task.id).await.unwrap();
    assert!(!task.failed, "{}", task.message);
    assert_eq!(task.status, Status::Finished);
    assert!(!written_anywhere(temp_dir.path(), "escape.bin"));
}

#[tokio::test]
async fn test_claimed_task_is_not_downloaded_twice() {
    let (leecher, remote, _temp_dir) = create_test_leecher().await;
    let task = sampled_task(&leecher, &remote).await;
    leecher.set_full_download_now(task.id, true).await.unwrap();
    let before = remote.calls(Operation::Download).await;

    let timeout = leecher.config().pipeline.claim_timeout;
    assert!(leecher.db.claim_run(task.id, Status::SampleDownloaded, timeout).await.unwrap());

    let err = leecher.download_files(task.id).await.unwrap_err();
    assert!(matches!(err, Error::Task(TaskError::InvalidState { .. })));
    assert_eq!(remote.calls(Operation::Download).await, before);

    leecher.db.release_claim(task.id).await.unwrap();
    let task = leecher.download_files(task.id).await.unwrap();
    assert_eq!(task.status, Status::Finished);
}
