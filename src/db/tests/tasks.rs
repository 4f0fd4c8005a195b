use super::{insert, new_task, open};
use crate::db::*;
use crate::error::{Error, TaskError};
use crate::types::{RemoteFile, Status, TaskId};
use chrono::Utc;

#[tokio::test]
async fn test_insert_and_get_task() {
    let (db, _file) = open().await;

    let mut new = new_task("1abc");
    new.callback = Some("http://localhost/hook".to_string());
    new.full_download_now = true;
    let id = db.insert_task(&new).await.unwrap();
    assert!(id.0 > 0);

    let task = db.get_task(id).await.unwrap().unwrap();
    assert_eq!(task.id, id);
    assert_eq!(task.shared_id, "1abc");
    assert_eq!(task.shared_password, "pass");
    assert_eq!(task.status, Status::Inited);
    assert!(!task.failed);
    assert!(task.message.is_empty());
    assert_eq!(task.retry_times, 0);
    assert!(task.full_download_now);
    assert!(task.files.is_empty());
    assert!(task.started_at.is_none());
    assert_eq!(task.callback.as_deref(), Some("http://localhost/hook"));
    assert!(!task.captcha_required);

    db.close().await;
}

#[tokio::test]
async fn test_get_missing_task() {
    let (db, _file) = open().await;
    assert!(db.get_task(TaskId(999)).await.unwrap().is_none());
    let err = db.require_task(TaskId(999)).await.unwrap_err();
    assert!(matches!(err, Error::Task(TaskError::NotFound { id: 999 })));
    db.close().await;
}

#[tokio::test]
async fn test_save_task_round_trips_every_field() {
    let (db, _file) = open().await;
    let id = insert(&db, "1abc").await;

    let mut task = db.get_task(id).await.unwrap().unwrap();
    let now = Utc::now();
    task.status = Status::Transferred;
    task.failed = true;
    task.message = "error_code: 105, message: bad".to_string();
    task.retry_times = 2;
    task.started_at = Some(now);
    task.transfer_completed_at = Some(now);
    task.file_listed_at = Some(now);
    task.files = vec![RemoteFile {
        path: "dir/a.mkv".to_string(),
        is_dir: false,
        is_file: true,
        size: 1234,
        md5: Some("d41d8cd98f00b204e9800998ecf8427e".to_string()),
    }];
    task.captcha_required = true;
    task.captcha = vec![0xff, 0xd8, 0xff];
    task.captcha_id = "cid".to_string();
    task.captcha_url = "https://example.com/captcha".to_string();
    task.captcha_code = "abcd".to_string();
    db.save_task(&task).await.unwrap();

    let loaded = db.get_task(id).await.unwrap().unwrap();
    assert_eq!(loaded.status, Status::Transferred);
    assert!(loaded.failed);
    assert_eq!(loaded.message, task.message);
    assert_eq!(loaded.retry_times, 2);
    assert_eq!(loaded.started_at.map(|t| t.timestamp()), Some(now.timestamp()));
    assert!(loaded.sample_downloaded_at.is_none());
    assert_eq!(loaded.files, task.files);
    assert!(loaded.captcha_required);
    assert_eq!(loaded.captcha, vec![0xff, 0xd8, 0xff]);
    assert_eq!(loaded.captcha_id, "cid");
    assert_eq!(loaded.captcha_code, "abcd");

    db.close().await;
}

#[tokio::test]
async fn test_save_missing_task_fails() {
    let (db, _file) = open().await;
    let id = insert(&db, "1abc").await;
    let mut task = db.get_task(id).await.unwrap().unwrap();
    task.id = TaskId(id.0 + 100);

    let err = db.save_task(&task).await.unwrap_err();
    assert!(matches!(err, Error::Task(TaskError::NotFound { .. })));
    db.close().await;
}

#[tokio::test]
async fn test_delete_task() {
    let (db, _file) = open().await;
    let id = insert(&db, "1abc").await;

    assert!(db.delete_task(id).await.unwrap());
    assert!(!db.delete_task(id).await.unwrap());
    assert!(db.get_task(id).await.unwrap().is_none());

    db.close().await;
}

#[tokio::test]
async fn test_list_and_count_with_filters() {
    let (db, _file) = open().await;
    let a = insert(&db, "1a").await;
    let b = insert(&db, "1b").await;
    let c = insert(&db, "1c").await;

    let mut task_b = db.get_task(b).await.unwrap().unwrap();
    task_b.status = Status::Started;
    task_b.failed = true;
    db.save_task(&task_b).await.unwrap();

    let all = db.list_tasks(&TaskFilter::default(), 10, 0).await.unwrap();
    let ids: Vec<TaskId> = all.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![c, b, a], "newest first");
    assert_eq!(db.count_tasks(&TaskFilter::default()).await.unwrap(), 3);

    let inited = TaskFilter {
        status: Some(Status::Inited),
        ..Default::default()
    };
    assert_eq!(db.count_tasks(&inited).await.unwrap(), 2);

    let by_link = TaskFilter {
        shared_link: Some("https://pan.baidu.com/s/1a".to_string()),
        ..Default::default()
    };
    let found = db.list_tasks(&by_link, 10, 0).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, a);

    let failed = TaskFilter {
        failed: Some(true),
        ..Default::default()
    };
    assert_eq!(db.count_tasks(&failed).await.unwrap(), 1);

    let page = db.list_tasks(&TaskFilter::default(), 2, 2).await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].id, a);

    db.close().await;
}

#[tokio::test]
async fn test_poller_selections() {
    let (db, _file) = open().await;
    let inited = insert(&db, "1a").await;
    let failed_inited = insert(&db, "1b").await;
    let gated = insert(&db, "1c").await;
    let open_gate = insert(&db, "1d").await;

    let mut t = db.get_task(failed_inited).await.unwrap().unwrap();
    t.failed = true;
    db.save_task(&t).await.unwrap();

    for (id, gate) in [(gated, false), (open_gate, true)] {
        let mut t = db.get_task(id).await.unwrap().unwrap();
        t.status = Status::SampleDownloaded;
        t.full_download_now = gate;
        db.save_task(&t).await.unwrap();
    }

    let ready: Vec<TaskId> = db
        .list_by_status(Status::Inited, 10)
        .await
        .unwrap()
        .iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(ready, vec![inited], "failed tasks are excluded");

    let downloads: Vec<TaskId> = db
        .list_ready_for_download(10)
        .await
        .unwrap()
        .iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(downloads, vec![open_gate]);

    let failed: Vec<TaskId> = db
        .list_failed(TaskId(0), 10)
        .await
        .unwrap()
        .iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(failed, vec![failed_inited]);
    assert!(db.list_failed(failed_inited, 10).await.unwrap().is_empty());

    assert_eq!(db.list_by_status(Status::Inited, 0).await.unwrap().len(), 0);

    db.close().await;
}

#[tokio::test]
async fn test_all_path_names() {
    let (db, _file) = open().await;
    insert(&db, "1a").await;
    let mut public = new_task("1b");
    public.shared_password = String::new();
    db.insert_task(&public).await.unwrap();

    assert_eq!(
        db.all_path_names().await.unwrap(),
        vec!["1a.pass".to_string(), "1b.".to_string()]
    );
    db.close().await;
}

#[tokio::test]
async fn test_claim_task_is_compare_and_swap() {
    let (db, _file) = open().await;
    let id = insert(&db, "1a").await;

    assert!(db.claim_task(id, Status::Inited, Status::Started).await.unwrap());
    assert!(
        !db.claim_task(id, Status::Inited, Status::Started).await.unwrap(),
        "second claim must lose"
    );
    assert_eq!(db.get_task(id).await.unwrap().unwrap().status, Status::Started);
    assert!(!db.claim_task(TaskId(999), Status::Inited, Status::Started).await.unwrap());

    db.close().await;
}

#[tokio::test]
async fn test_claim_run_is_exclusive_until_released() {
    let (db, _file) = open().await;
    let id = insert(&db, "1a").await;
    let hour = std::time::Duration::from_secs(3600);

    assert!(!db.claim_run(id, Status::Transferred, hour).await.unwrap(), "wrong status");
    assert!(db.claim_run(id, Status::Inited, hour).await.unwrap());
    assert!(!db.claim_run(id, Status::Inited, hour).await.unwrap(), "already claimed");

    // saving the row keeps the claim
    let task = db.require_task(id).await.unwrap();
    db.save_task(&task).await.unwrap();
    assert!(!db.claim_run(id, Status::Inited, hour).await.unwrap());

    db.release_claim(id).await.unwrap();
    assert!(db.claim_run(id, Status::Inited, hour).await.unwrap());

    db.close().await;
}

#[tokio::test]
async fn test_stale_claim_is_taken_over() {
    let (db, _file) = open().await;
    let id = insert(&db, "1a").await;

    sqlx::query("UPDATE tasks SET claimed_at = ? WHERE id = ?")
        .bind(Utc::now().timestamp() - 7200)
        .bind(id)
        .execute(db.pool())
        .await
        .unwrap();

    let hour = std::time::Duration::from_secs(3600);
    assert!(db.claim_run(id, Status::Inited, hour).await.unwrap());
    db.close().await;
}
