use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::models::Notification;

/// Errors that can occur when delivering a notification
#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Delivery rejected: {0}")]
    Rejected(String),

    #[error("Delivery timed out after {0:?}")]
    Timeout(Duration),
}

/// Best-effort outbound messaging to a member
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, member_id: Uuid, message: &Notification) -> Result<(), NotifierError>;
}

/// Posts notifications to a Slack incoming webhook
///
/// The operations channel receives one message per notification; member
/// delivery is handled downstream of Slack.
pub struct SlackNotifier {
    webhook_url: String,
    client: Client,
}

impl SlackNotifier {
    /// Create a new Slack notifier with a per-request timeout
    pub fn new(webhook_url: String, timeout: Duration) -> Result<Self, NotifierError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            webhook_url,
            client,
        })
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn notify(&self, member_id: Uuid, message: &Notification) -> Result<(), NotifierError> {
        let payload = json!({
            "text": format!("[{:?}] member {}: {}", message.kind, member_id, message.text),
            "metadata": {
                "event_type": "match_notification",
                "event_payload": {
                    "member_id": member_id,
                    "match_id": message.match_id,
                },
            },
        });

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read body".to_string());
            return Err(NotifierError::Rejected(format!("{} - {}", status, body)));
        }

        tracing::debug!(member_id = %member_id, match_id = %message.match_id, "Slack notification sent");

        Ok(())
    }
}

/// Writes notifications to the log instead of delivering them
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, member_id: Uuid, message: &Notification) -> Result<(), NotifierError> {
        tracing::info!(
            member_id = %member_id,
            match_id = %message.match_id,
            kind = ?message.kind,
            "{}",
            message.text
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Match, MatchStatus};

    fn notification() -> Notification {
        Notification::pending_match(&Match::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            MatchStatus::Pending,
        ))
    }

    #[tokio::test]
    async fn test_slack_notifier_posts_to_webhook() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/services/hook")
            .match_header("content-type", "application/json")
            .with_status(200)
            .with_body("ok")
            .create_async()
            .await;

        let notifier = SlackNotifier::new(
            format!("{}/services/hook", server.url()),
            Duration::from_secs(2),
        )
        .unwrap();

        notifier.notify(Uuid::new_v4(), &notification()).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_slack_notifier_surfaces_rejection() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/services/hook")
            .with_status(404)
            .with_body("no_service")
            .create_async()
            .await;

        let notifier = SlackNotifier::new(
            format!("{}/services/hook", server.url()),
            Duration::from_secs(2),
        )
        .unwrap();

        let err = notifier
            .notify(Uuid::new_v4(), &notification())
            .await
            .unwrap_err();

        match err {
            NotifierError::Rejected(msg) => assert!(msg.contains("no_service")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_log_notifier_always_succeeds() {
        assert!(LogNotifier.notify(Uuid::new_v4(), &notification()).await.is_ok());
    }
}
