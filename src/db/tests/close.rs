use super::{insert, open};

/// Querying after the pool is closed returns an error rather than hanging or panicking.
#[tokio::test]
async fn test_get_task_after_pool_close_returns_error() {
    let (db, _file) = open().await;
    let id = insert(&db, "1closed").await;
    assert!(db.get_task(id).await.unwrap().is_some());

    db.pool().close().await;

    let result = db.get_task(id).await;
    assert!(
        result.is_err(),
        "get_task after pool close should return an error, got: {:?}",
        result
    );
}

#[tokio::test]
async fn test_save_after_pool_close_returns_error() {
    let (db, _file) = open().await;
    let id = insert(&db, "1closed").await;
    let task = db.get_task(id).await.unwrap().unwrap();

    db.pool().close().await;

    assert!(db.save_task(&task).await.is_err());
}
