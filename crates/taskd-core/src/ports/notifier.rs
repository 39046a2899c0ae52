//! Notifier port - completion notifications (e-mail or similar).

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::domain::{TaskId, TaskState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub task_id: TaskId,
    pub final_state: TaskState,
    pub recipients: Vec<String>,
}

impl Notification {
    /// Build the notification for a task that reached `final_state`.
    ///
    /// Completion recipients always apply; error recipients only when the
    /// task did not succeed. Duplicates are dropped keeping first position.
    /// `None` when nobody is to be notified.
    pub fn for_outcome(
        task_id: &TaskId,
        final_state: TaskState,
        on_completion: &[String],
        on_error: &[String],
    ) -> Option<Self> {
        let error_list: &[String] = if final_state.is_successful() {
            &[]
        } else {
            on_error
        };

        let mut recipients: Vec<String> = Vec::new();
        for address in on_completion.iter().chain(error_list) {
            if !recipients.iter().any(|r| r.eq_ignore_ascii_case(address)) {
                recipients.push(address.clone());
            }
        }

        (!recipients.is_empty()).then(|| Self {
            task_id: task_id.clone(),
            final_state,
            recipients,
        })
    }
}

#[derive(Debug, Error)]
#[error("failed to notify {recipients:?} about task {task_id}: {reason}")]
pub struct NotifyError {
    pub task_id: TaskId,
    pub recipients: Vec<String>,
    pub reason: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError>;
}
