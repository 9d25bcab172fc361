//! Mock notifier for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::notifier::{NotifyError, Notifier};

/// A recorded notification for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedNotification {
    pub title: String,
    pub body: String,
}

/// Mock implementation of the Notifier trait.
///
/// Records every notification, including ones that were made to fail.
#[derive(Debug, Default)]
pub struct MockNotifier {
    notifications: Arc<RwLock<Vec<RecordedNotification>>>,
    /// When set, every notification fails.
    failing: Arc<RwLock<bool>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following notification fail.
    pub async fn set_failing(&self, failing: bool) {
        *self.failing.write().await = failing;
    }

    /// Get recorded notifications.
    pub async fn notifications(&self) -> Vec<RecordedNotification> {
        self.notifications.read().await.clone()
    }

    /// Get recorded notification bodies.
    pub async fn bodies(&self) -> Vec<String> {
        self.notifications
            .read()
            .await
            .iter()
            .map(|n| n.body.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    fn name(&self) -> &str {
        "mock"
    }

    async fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        self.notifications.write().await.push(RecordedNotification {
            title: title.to_string(),
            body: body.to_string(),
        });
        if *self.failing.read().await {
            return Err(NotifyError::Rejected {
                status: 500,
                message: "mock failure".to_string(),
            });
        }
        Ok(())
    }
}
