//! Notifier implementations: log-only (default) and recording (tests).

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;

use crate::ports::{Notification, Notifier, NotifyError};

/// Logs each notification instead of sending it anywhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        let payload = serde_json::to_string(&notification).map_err(|err| NotifyError {
            task_id: notification.task_id.clone(),
            recipients: notification.recipients.clone(),
            reason: err.to_string(),
        })?;
        info!(
            task_id = %notification.task_id,
            state = %notification.final_state,
            %payload,
            "task completion notification"
        );
        Ok(())
    }
}

/// Keeps every notification in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        self.sent.lock().await.push(notification);
        Ok(())
    }
}
