//! Bark push notifications (`POST {endpoint}/{api_key}`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use super::{Notifier, NotifyError};
use crate::config::NotificationConfig;

#[derive(Debug, Serialize)]
struct BarkMessage<'a> {
    title: &'a str,
    body: &'a str,
}

/// Bark notification client.
pub struct BarkNotifier {
    client: Client,
    url: String,
}

impl BarkNotifier {
    /// Create a new Bark notifier.
    pub fn new(config: &NotificationConfig) -> Result<Self, NotifyError> {
        let api_key = config.notification_api_key.trim();
        if api_key.is_empty() {
            return Err(NotifyError::NotConfigured(
                "notification_api_key is required".to_string(),
            ));
        }

        let client = Client::builder().timeout(Duration::from_secs(15)).build()?;
        let url = format!("{}/{}", config.endpoint.trim_end_matches('/'), api_key);

        Ok(Self { client, url })
    }
}

#[async_trait]
impl Notifier for BarkNotifier {
    fn name(&self) -> &str {
        "bark"
    }

    async fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(&BarkMessage { title, body })
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                message: text.chars().take(200).collect(),
            });
        }

        debug!(response = %text, "Notification delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_api_key() {
        let config = NotificationConfig::default();
        assert!(matches!(
            BarkNotifier::new(&config),
            Err(NotifyError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_url_joins_endpoint_and_key() {
        let config = NotificationConfig {
            enabled: true,
            notification_api_key: "abc".to_string(),
            endpoint: "https://push.example/".to_string(),
        };
        let notifier = BarkNotifier::new(&config).unwrap();
        assert_eq!(notifier.url, "https://push.example/abc");
        assert_eq!(notifier.name(), "bark");
    }

    #[test]
    fn test_message_serialization() {
        let json = serde_json::to_string(&BarkMessage {
            title: "下载通知",
            body: "Foo - 1080p - foo [第5集]",
        })
        .unwrap();
        assert_eq!(json, r#"{"title":"下载通知","body":"Foo - 1080p - foo [第5集]"}"#);
    }
}
