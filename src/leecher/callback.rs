//! Callback notifications.

use crate::error::Result;
use crate::types::CallbackPayload;
use std::time::Duration;

/// Posts [`CallbackPayload`]s to task callback URLs
///
/// Delivery is best effort: failures are logged and never reach the runner that
/// triggered the notification.
#[derive(Clone)]
pub struct CallbackNotifier {
    http: reqwest::Client,
    timeout: Duration,
}

impl CallbackNotifier {
    /// Build a notifier whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, timeout })
    }

    /// Send in the background (fire and forget)
    pub fn notify(&self, url: String, payload: CallbackPayload) {
        let notifier = self.clone();
        tokio::spawn(async move {
            notifier.send(&url, &payload).await;
        });
    }

    /// Send and wait for the outcome; returns whether the receiver accepted it
    pub async fn send(&self, url: &str, payload: &CallbackPayload) -> bool {
        let request = self.http.post(url).json(payload);
        let result = tokio::time::timeout(self.timeout, request.send()).await;

        match result {
            Ok(Ok(response)) if response.status().is_success() => {
                tracing::debug!(
                    url,
                    task_id = %payload.task.id,
                    action = ?payload.action,
                    "callback sent"
                );
                true
            }
            Ok(Ok(response)) => {
                tracing::warn!(
                    url,
                    task_id = %payload.task.id,
                    status = %response.status(),
                    "callback returned error status"
                );
                false
            }
            Ok(Err(e)) => {
                tracing::warn!(url, task_id = %payload.task.id, error = %e, "callback failed");
                false
            }
            Err(_) => {
                tracing::warn!(
                    url,
                    task_id = %payload.task.id,
                    timeout_secs = self.timeout.as_secs(),
                    "callback timed out"
                );
                false
            }
        }
    }
}
