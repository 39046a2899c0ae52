//! RecordStore port - 正本（source of truth）for task entries.

use async_trait::async_trait;

use crate::domain::{Entry, StoreError, TaskId};

/// Durable storage of raw task entries, keyed by task ID.
///
/// The scheduler writes the full entry inside every guarded mutation, so
/// `store` must replace the previous entry wholesale.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn load(&self, task_id: &TaskId) -> Result<Option<Entry>, StoreError>;

    async fn store(&self, task_id: &TaskId, entry: &Entry) -> Result<(), StoreError>;

    /// Drop the entry for `task_id`. Removing an absent entry is not an error.
    async fn remove(&self, task_id: &TaskId) -> Result<(), StoreError>;

    /// IDs of every stored entry, used when recovering after a restart.
    async fn ids(&self) -> Result<Vec<TaskId>, StoreError>;
}
