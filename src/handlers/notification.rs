//! # Notification Handler
//!
//! Sends one message to each recipient through a [`Notifier`]. Delivery is counted per
//! recipient: the task succeeds if any recipient was reached (or there was nobody to
//! reach) and fails only when every delivery failed.

use crate::models::TaskType;
use crate::registry::{parse_parameters, HandlerOutcome, TaskHandler};
use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

pub const DEFAULT_CHANNEL: &str = "email";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NotificationParams {
    #[serde(default)]
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub channel: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub recipient: String,
    pub channel: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<()>;
}

pub struct NotificationHandler {
    notifier: Arc<dyn Notifier>,
}

impl NotificationHandler {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl TaskHandler for NotificationHandler {
    fn task_type(&self) -> TaskType {
        TaskType::Notification
    }

    async fn call(&self, parameters: &Value) -> Result<HandlerOutcome> {
        let params: NotificationParams = parse_parameters(self.task_type(), parameters)?;
        if params.subject.trim().is_empty() {
            bail!("subject must not be empty");
        }
        let channel = params
            .channel
            .clone()
            .unwrap_or_else(|| DEFAULT_CHANNEL.to_string());

        if params.recipients.is_empty() {
            return Ok(HandlerOutcome::success(
                "no recipients to notify",
                Some(json!({"channel": channel, "sent": 0, "failed": 0})),
            ));
        }

        let mut sent = 0usize;
        let mut failures = Vec::new();
        for recipient in &params.recipients {
            let notification = Notification {
                recipient: recipient.clone(),
                channel: channel.clone(),
                subject: params.subject.clone(),
                body: params.body.clone(),
            };
            match self.notifier.send(&notification).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    warn!(recipient = %recipient, channel = %channel, error = %e, "Notification failed");
                    failures.push(json!({"recipient": recipient, "error": e.to_string()}));
                }
            }
        }

        let total = params.recipients.len();
        let data = json!({
            "channel": channel,
            "sent": sent,
            "failed": failures.len(),
            "failures": failures,
        });

        if sent == 0 {
            return Ok(HandlerOutcome::failure_with_data(
                format!("all {total} notifications failed"),
                data,
            ));
        }
        let message = if sent == total {
            format!("sent {sent} notifications via {channel}")
        } else {
            format!(
                "sent {sent} of {total} notifications via {channel} ({} failed)",
                total - sent
            )
        };
        Ok(HandlerOutcome::success(message, Some(data)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct FakeNotifier {
        unreachable: Vec<String>,
        delivered: Mutex<Vec<Notification>>,
    }

    #[async_trait]
    impl Notifier for FakeNotifier {
        async fn send(&self, notification: &Notification) -> Result<()> {
            if self.unreachable.contains(&notification.recipient) {
                bail!("mailbox unavailable");
            }
            self.delivered.lock().push(notification.clone());
            Ok(())
        }
    }

    fn params(recipients: &[&str]) -> Value {
        json!({"recipients": recipients, "subject": "Weekly digest", "body": "..."})
    }

    #[tokio::test]
    async fn test_delivers_to_every_recipient() {
        let notifier = Arc::new(FakeNotifier::default());
        let outcome = NotificationHandler::new(notifier.clone())
            .call(&params(&["a@example.com", "b@example.com"]))
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.message, "sent 2 notifications via email");
        assert_eq!(notifier.delivered.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_zero_recipients_succeeds() {
        let outcome = NotificationHandler::new(Arc::new(FakeNotifier::default()))
            .call(&params(&[]))
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.data.unwrap()["sent"], 0);
    }

    #[tokio::test]
    async fn test_partial_delivery_is_qualified_success() {
        let notifier = Arc::new(FakeNotifier {
            unreachable: vec!["b@example.com".to_string()],
            ..FakeNotifier::default()
        });
        let outcome = NotificationHandler::new(notifier)
            .call(&params(&["a@example.com", "b@example.com"]))
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.message, "sent 1 of 2 notifications via email (1 failed)");
    }

    #[tokio::test]
    async fn test_all_failed_is_failure() {
        let notifier = Arc::new(FakeNotifier {
            unreachable: vec!["a@example.com".to_string()],
            ..FakeNotifier::default()
        });
        let outcome = NotificationHandler::new(notifier)
            .call(&json!({"recipients": ["a@example.com"], "subject": "s", "body": "b", "channel": "sms"}))
            .await
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.message, "all 1 notifications failed");
        assert_eq!(outcome.data.unwrap()["channel"], "sms");
    }

    #[tokio::test]
    async fn test_missing_subject_is_rejected() {
        let result = NotificationHandler::new(Arc::new(FakeNotifier::default()))
            .call(&json!({"recipients": ["a@example.com"], "body": "b"}))
            .await;
        assert!(result.is_err());
    }
}
