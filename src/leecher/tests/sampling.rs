use super::*;

#[tokio::test]
async fn test_samples_are_truncated() {
    let (leecher, remote, _temp_dir) = create_test_leecher().await;
    let task = sampled_task(&leecher, &remote).await;

    assert_eq!(task.status, Status::SampleDownloaded);
    assert!(task.sample_downloaded_at.is_some());

    let sample_root = task.sample_path(leecher.config());
    let a = std::fs::metadata(sample_root.join("movie/a.mkv")).unwrap();
    assert_eq!(a.len(), 10240);
    let b = std::fs::metadata(sample_root.join("movie/b.srt")).unwrap();
    assert_eq!(b.len(), 100, "small files are sampled whole");
    assert!(
        !sample_root.join("__MACOSX").exists(),
        "ignored paths are never downloaded"
    );
    assert!(!task.data_path(leecher.config()).exists());
}

#[tokio::test]
async fn test_present_samples_are_skipped() {
    let (leecher, remote, _temp_dir) = create_test_leecher().await;
    publish_share(&remote).await;
    let task = create_task(&leecher).await;
    let task = leecher.transfer(task.id).await.unwrap();

    let sample_root = task.sample_path(leecher.config());
    std::fs::create_dir_all(sample_root.join("movie")).unwrap();
    std::fs::write(sample_root.join("movie/a.mkv"), vec![9u8; 10240]).unwrap();

    let task = leecher.download_samples(task.id).await.unwrap();
    assert_eq!(task.status, Status::SampleDownloaded);
    assert_eq!(remote.calls(Operation::Download).await, 1, "only b.srt is fetched");
    let kept = std::fs::read(sample_root.join("movie/a.mkv")).unwrap();
    assert!(kept.iter().all(|b| *b == 9));
}

#[tokio::test]
async fn test_short_sample_is_fetched_again() {
    let (leecher, remote, _temp_dir) = create_test_leecher().await;
    publish_share(&remote).await;
    let task = create_task(&leecher).await;
    let task = leecher.transfer(task.id).await.unwrap();

    let sample_root = task.sample_path(leecher.config());
    std::fs::create_dir_all(sample_root.join("movie")).unwrap();
    std::fs::write(sample_root.join("movie/a.mkv"), vec![9u8; 10]).unwrap();

    leecher.download_samples(task.id).await.unwrap();
    let a = std::fs::read(sample_root.join("movie/a.mkv")).unwrap();
    assert_eq!(a.len(), 10240);
    assert!(a.iter().all(|b| *b == 1), "restarted from byte zero");
}

#[tokio::test]
async fn test_sampling_failure_keeps_status() {
    let (leecher, remote, _temp_dir) = create_test_leecher().await;
    publish_share(&remote).await;
    let task = create_task(&leecher).await;
    let task = leecher.transfer(task.id).await.unwrap();
    remote.fail_next(Operation::Download, connection_reset()).await;

    let task = leecher.download_samples(task.id).await.unwrap();
    assert!(task.failed);
    assert_eq!(task.status, Status::Transferred);
    assert!(task.sample_downloaded_at.is_none());
    assert!(task.recoverable());
}

#[tokio::test]
async fn test_sampling_requires_transferred() {
    let (leecher, _remote, _temp_dir) = create_test_leecher().await;
    let task = create_task(&leecher).await;

    let err = leecher.download_samples(task.id).await.unwrap_err();
    assert!(matches!(err, Error::Task(TaskError::InvalidState { .. })));
}

#[tokio::test]
async fn test_inventory_paths_outside_task_are_skipped() {
    let (leecher, remote, temp_dir) = create_test_leecher().await;
    publish_share(&remote).await;
    let task = create_task(&leecher).await;
    let mut task = leecher.transfer(task.id).await.unwrap();
    task.files.extend(escaping_entries());
    leecher.db.save_task(&task).await.unwrap();

    let task = leecher.download_samples(task.id).await.unwrap();
    assert!(!task.failed, "{}", task.message);
    assert_eq!(task.status, Status::SampleDownloaded);
    assert_eq!(remote.calls(Operation::Download).await, 2);
    assert!(!written_anywhere(temp_dir.path(), "escape.bin"));
}

#[tokio::test]
async fn test_claimed_task_is_not_sampled_twice() {
    let (leecher, remote, _temp_dir) = create_test_leecher().await;
    publish_share(&remote).await;
    let task = create_task(&leecher).await;
    let task = leecher.transfer(task.id).await.unwrap();

    // another sampling runner is busy with the task
    let timeout = leecher.config().pipeline.claim_timeout;
    assert!(leecher.db.claim_run(task.id, Status::Transferred, timeout).await.unwrap());

    let err = leecher.download_samples(task.id).await.unwrap_err();
    assert!(matches!(err, Error::Task(TaskError::InvalidState { .. })));
    assert_eq!(remote.calls(Operation::Download).await, 0);

    leecher.db.release_claim(task.id).await.unwrap();
    let task = leecher.download_samples(task.id).await.unwrap();
    assert_eq!(task.status, Status::SampleDownloaded);

    // the claim is gone once the run ends
    assert!(leecher.db.claim_run(task.id, Status::SampleDownloaded, timeout).await.unwrap());
}
