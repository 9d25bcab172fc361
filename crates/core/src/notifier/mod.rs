//! Push notifications for completed downloads.

mod bark;

pub use bark::BarkNotifier;

use async_trait::async_trait;
use thiserror::Error;

/// Title used for download notifications.
pub const DOWNLOAD_NOTIFICATION_TITLE: &str = "下载通知";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Notification rejected: {status} - {message}")]
    Rejected { status: u16, message: String },

    #[error("Notifier not configured: {0}")]
    NotConfigured(String),
}

/// Outbound notification channel.
///
/// Delivery is fire-and-forget from the engine's point of view: errors are
/// logged by the caller and never change what was recorded.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    async fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError>;
}

/// Notifier used when notifications are switched off.
#[derive(Debug, Default, Clone)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    fn name(&self) -> &str {
        "noop"
    }

    async fn notify(&self, _title: &str, _body: &str) -> Result<(), NotifyError> {
        Ok(())
    }
}
