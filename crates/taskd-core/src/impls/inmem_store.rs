//! InMemoryRecordStore - 開発用・テスト用の record store
//!
//! # 実装詳細
//! - HashMap<TaskId, Entry> を tokio Mutex で保護
//! - `fail_writes` / `reject_task` で store 失敗を再現できる（テスト用）

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{Entry, StoreError, TaskId};
use crate::ports::RecordStore;

#[derive(Default)]
struct StoreState {
    entries: HashMap<TaskId, Entry>,
    fail_writes: bool,
    rejected: HashSet<TaskId>,
    writes: usize,
}

#[derive(Default)]
pub struct InMemoryRecordStore {
    state: Mutex<StoreState>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store, e.g. with entries left by a previous process.
    pub async fn insert(&self, task_id: TaskId, entry: Entry) {
        self.state.lock().await.entries.insert(task_id, entry);
    }

    /// Make every subsequent `store` call fail.
    pub async fn fail_writes(&self, fail: bool) {
        self.state.lock().await.fail_writes = fail;
    }

    /// Make `store` calls for one task ID fail.
    pub async fn reject_task(&self, task_id: TaskId) {
        self.state.lock().await.rejected.insert(task_id);
    }

    /// Number of successful `store` calls so far.
    pub async fn write_count(&self) -> usize {
        self.state.lock().await.writes
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn load(&self, task_id: &TaskId) -> Result<Option<Entry>, StoreError> {
        Ok(self.state.lock().await.entries.get(task_id).cloned())
    }

    async fn store(&self, task_id: &TaskId, entry: &Entry) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.fail_writes {
            return Err(StoreError::Unavailable("writes are disabled".to_string()));
        }
        if state.rejected.contains(task_id) {
            return Err(StoreError::Rejected {
                task_id: task_id.clone(),
                reason: "entry refused".to_string(),
            });
        }
        state.entries.insert(task_id.clone(), entry.clone());
        state.writes += 1;
        Ok(())
    }

    async fn remove(&self, task_id: &TaskId) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.fail_writes {
            return Err(StoreError::Unavailable("writes are disabled".to_string()));
        }
        state.entries.remove(task_id);
        Ok(())
    }

    async fn ids(&self) -> Result<Vec<TaskId>, StoreError> {
        let mut ids: Vec<TaskId> = self.state.lock().await.entries.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_then_load() {
        let store = InMemoryRecordStore::new();
        let id = TaskId::new("T1");
        let entry = Entry::new().with_value("ds-task-id", "T1");

        store.store(&id, &entry).await.unwrap();

        assert_eq!(store.load(&id).await.unwrap(), Some(entry));
        assert_eq!(store.ids().await.unwrap(), vec![id]);
        assert_eq!(store.write_count().await, 1);
    }

    #[tokio::test]
    async fn failing_writes_leave_store_untouched() {
        let store = InMemoryRecordStore::new();
        store.fail_writes(true).await;
        let id = TaskId::new("T1");

        assert!(matches!(
            store.store(&id, &Entry::new()).await,
            Err(StoreError::Unavailable(_))
        ));
        assert_eq!(store.load(&id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn rejected_task_does_not_block_others() {
        let store = InMemoryRecordStore::new();
        store.reject_task(TaskId::new("B")).await;

        assert!(store.store(&TaskId::new("A"), &Entry::new()).await.is_ok());
        assert!(matches!(
            store.store(&TaskId::new("B"), &Entry::new()).await,
            Err(StoreError::Rejected { .. })
        ));

        store.remove(&TaskId::new("A")).await.unwrap();
        assert!(store.ids().await.unwrap().is_empty());
    }
}
