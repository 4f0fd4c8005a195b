use super::*;
use crate::types::{CallbackAction, CallbackPayload};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn wait_for_requests(server: &MockServer, count: usize) -> Vec<wiremock::Request> {
    for _ in 0..50 {
        let received = server.received_requests().await.unwrap_or_default();
        if received.len() >= count {
            return received;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    server.received_requests().await.unwrap_or_default()
}

#[tokio::test]
async fn test_transfer_fires_callbacks_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let (leecher, remote, _temp_dir) = create_test_leecher().await;
    publish_share(&remote).await;
    let task = leecher
        .create_task(CreateTask {
            shared_link: SHARE_LINK.to_string(),
            callback: Some(format!("{}/hook", server.uri())),
            ..Default::default()
        })
        .await
        .unwrap();

    leecher.transfer(task.id).await.unwrap();

    let received = wait_for_requests(&server, 2).await;
    let mut actions: Vec<String> = received
        .iter()
        .map(|r| {
            let body: serde_json::Value = serde_json::from_slice(&r.body).unwrap();
            assert_eq!(body["task"]["id"], task.id.0);
            body["action"].as_str().unwrap().to_string()
        })
        .collect();
    actions.sort();
    assert_eq!(actions, vec!["files_ready", "link_saved"]);
}

#[tokio::test]
async fn test_failing_receiver_does_not_fail_the_runner() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (leecher, remote, _temp_dir) = create_test_leecher().await;
    publish_share(&remote).await;
    let task = leecher
        .create_task(CreateTask {
            shared_link: SHARE_LINK.to_string(),
            callback: Some(server.uri()),
            ..Default::default()
        })
        .await
        .unwrap();

    let task = leecher.transfer(task.id).await.unwrap();
    assert!(!task.failed);
    assert_eq!(task.status, Status::Transferred);
}

#[tokio::test]
async fn test_send_reports_outcome() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let (leecher, _remote, _temp_dir) = create_test_leecher().await;
    let task = create_task(&leecher).await;
    let payload = CallbackPayload {
        action: CallbackAction::CaptchaRequired,
        task: task.to_info(leecher.config()),
    };

    let notifier = CallbackNotifier::new(Duration::from_secs(5)).unwrap();
    assert!(notifier.send(&format!("{}/ok", server.uri()), &payload).await);
    assert!(!notifier.send(&format!("{}/broken", server.uri()), &payload).await);
    assert!(!notifier.send("http://127.0.0.1:9/unreachable", &payload).await);

    let received = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(body["action"], "captcha_required");
    assert_eq!(body["task"]["shared_id"], SHARE_ID);
}
