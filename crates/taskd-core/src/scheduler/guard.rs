//! Per-record mutual exclusion.
//!
//! Design:
//! - One `tokio::sync::Mutex` per record; every mutation locks it, applies
//!   the change, persists the full entry, and releases on scope exit.
//! - Acquisition is bounded by a timeout. Hitting it means a deadlock or a
//!   stuck store, so callers treat `GuardError` as fatal.
//! - Collaborators (store, resolver, clock, log sink) are passed in through
//!   `MutationContext`; the record holds no reference back to the scheduler.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};
use tracing::warn;

use super::record::TaskRecord;
use crate::domain::{GuardError, SchedulerError, Severity, StoreError, TaskId, TaskState};
use crate::ports::{AttributeResolver, Clock, LogSink, RecordStore};

pub struct ConcurrencyGuard<T> {
    task_id: TaskId,
    value: Mutex<T>,
    timeout: Duration,
}

impl<T> ConcurrencyGuard<T> {
    pub fn new(task_id: TaskId, value: T, timeout: Duration) -> Self {
        Self {
            task_id,
            value: Mutex::new(value),
            timeout,
        }
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    pub async fn acquire(&self) -> Result<MutexGuard<'_, T>, GuardError> {
        tokio::time::timeout(self.timeout, self.value.lock())
            .await
            .map_err(|_| GuardError::Timeout {
                task_id: self.task_id.clone(),
                waited: self.timeout,
            })
    }
}

/// Everything a guarded mutation needs besides the record itself.
#[derive(Clone)]
pub struct MutationContext {
    pub store: Arc<dyn RecordStore>,
    pub resolver: Arc<dyn AttributeResolver>,
    pub clock: Arc<dyn Clock>,
    pub log_sink: Arc<dyn LogSink>,
}

#[derive(Debug, Error)]
pub enum MutationError {
    #[error(transparent)]
    Guard(#[from] GuardError),

    /// The change was applied in memory but could not be persisted.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<MutationError> for SchedulerError {
    fn from(err: MutationError) -> Self {
        match err {
            MutationError::Guard(e) => SchedulerError::Guard(e),
            MutationError::Store(e) => SchedulerError::Store(e),
        }
    }
}

/// Store failures are logged and tolerated (`Ok(None)`); guard failures propagate.
pub(crate) fn tolerate_store_failure<R>(
    task_id: &TaskId,
    result: Result<R, MutationError>,
) -> Result<Option<R>, GuardError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(MutationError::Store(err)) => {
            warn!(task_id = %task_id, %err, "task record not persisted");
            Ok(None)
        }
        Err(MutationError::Guard(err)) => Err(err),
    }
}

/// Write access to a locked record.
pub struct RecordEdit<'a> {
    record: &'a mut TaskRecord,
    ctx: &'a MutationContext,
    now: i64,
}

impl RecordEdit<'_> {
    pub fn record(&self) -> &TaskRecord {
        self.record
    }

    pub fn set_state(&mut self, state: TaskState) {
        self.record.set_state(state, self.ctx.resolver.as_ref());
    }

    /// Actual start time = now, state = RUNNING.
    pub fn mark_started(&mut self) {
        self.record
            .set_actual_start_time(self.now, self.ctx.resolver.as_ref());
        self.set_state(TaskState::Running);
    }

    /// Final state and completion time = now, written together.
    pub fn mark_completed(&mut self, state: TaskState) {
        self.set_state(state);
        self.record
            .set_completion_time(self.now, self.ctx.resolver.as_ref());
    }

    /// Append to the record's log and forward to the external sink.
    pub fn log(&mut self, severity: Severity, code: u32, text: &str) {
        let message = self
            .record
            .append_log(severity, code, text, self.now, self.ctx.resolver.as_ref());
        self.ctx.log_sink.append(severity, code, &message.text);
    }
}

impl ConcurrencyGuard<TaskRecord> {
    /// Lock, apply `f`, persist the entry, release.
    ///
    /// On `MutationError::Store` the in-memory change stands.
    pub async fn mutate<R>(
        &self,
        ctx: &MutationContext,
        f: impl FnOnce(&mut RecordEdit<'_>) -> R,
    ) -> Result<R, MutationError> {
        let mut record = self.acquire().await?;
        let mut edit = RecordEdit {
            record: &mut record,
            ctx,
            now: ctx.clock.now_millis(),
        };
        let out = f(&mut edit);
        ctx.store.store(&self.task_id, record.entry()).await?;
        Ok(out)
    }

    /// Lock and apply `f` without persisting.
    ///
    /// Only for records nobody else can see yet; [`Self::persist`] writes
    /// them out once the whole group is ready.
    pub(crate) async fn stage<R>(
        &self,
        ctx: &MutationContext,
        f: impl FnOnce(&mut RecordEdit<'_>) -> R,
    ) -> Result<R, GuardError> {
        let mut record = self.acquire().await?;
        let mut edit = RecordEdit {
            record: &mut record,
            ctx,
            now: ctx.clock.now_millis(),
        };
        Ok(f(&mut edit))
    }

    /// Write the current entry to the store.
    pub(crate) async fn persist(&self, ctx: &MutationContext) -> Result<(), MutationError> {
        let record = self.acquire().await?;
        ctx.store.store(&self.task_id, record.entry()).await?;
        Ok(())
    }

    /// Consistent copy of the record.
    pub async fn snapshot(&self) -> Result<TaskRecord, GuardError> {
        Ok(self.acquire().await?.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Entry;
    use crate::domain::log::codes;
    use crate::impls::{DirectorySchema, InMemoryRecordStore, TracingLogSink};
    use crate::ports::FixedClock;

    fn ctx(store: Arc<InMemoryRecordStore>) -> MutationContext {
        MutationContext {
            store,
            resolver: Arc::new(DirectorySchema::standard()),
            clock: Arc::new(FixedClock::new(5_000)),
            log_sink: Arc::new(TracingLogSink),
        }
    }

    fn guard(timeout: Duration) -> ConcurrencyGuard<TaskRecord> {
        let entry = Entry::new().with_value("ds-task-id", "T1");
        let record = TaskRecord::from_entry(entry, &DirectorySchema::standard()).unwrap();
        ConcurrencyGuard::new(TaskId::new("T1"), record, timeout)
    }

    #[tokio::test]
    async fn mutate_persists_entry() {
        let store = Arc::new(InMemoryRecordStore::new());
        let ctx = ctx(store.clone());
        let guard = guard(Duration::from_secs(1));

        guard
            .mutate(&ctx, |edit| {
                edit.mark_started();
                edit.log(Severity::Informational, codes::GENERIC, "hello");
            })
            .await
            .unwrap();

        let stored = store.load(&TaskId::new("T1")).await.unwrap().unwrap();
        let reloaded = TaskRecord::from_entry(stored, &DirectorySchema::standard()).unwrap();
        assert_eq!(reloaded.state(), TaskState::Running);
        assert_eq!(reloaded.actual_start_time(), 5_000);
        assert_eq!(reloaded.log_messages().len(), 1);
    }

    #[tokio::test]
    async fn staged_change_is_written_only_on_persist() {
        let store = Arc::new(InMemoryRecordStore::new());
        let ctx = ctx(store.clone());
        let guard = guard(Duration::from_secs(1));

        guard
            .stage(&ctx, |edit| edit.set_state(TaskState::Disabled))
            .await
            .unwrap();
        assert_eq!(store.load(&TaskId::new("T1")).await.unwrap(), None);

        guard.persist(&ctx).await.unwrap();
        let stored = store.load(&TaskId::new("T1")).await.unwrap().unwrap();
        assert_eq!(stored.single_value("ds-task-state").unwrap(), Some("DISABLED"));
    }

    #[tokio::test]
    async fn acquire_times_out_while_held() {
        let guard = guard(Duration::from_millis(20));
        let _held = guard.acquire().await.unwrap();

        let err = guard.acquire().await.unwrap_err();
        assert!(matches!(err, GuardError::Timeout { .. }));
    }

    #[tokio::test]
    async fn store_failure_keeps_in_memory_change() {
        let store = Arc::new(InMemoryRecordStore::new());
        store.fail_writes(true).await;
        let ctx = ctx(store);
        let guard = guard(Duration::from_secs(1));

        let result = guard
            .mutate(&ctx, |edit| edit.set_state(TaskState::Disabled))
            .await;

        assert!(matches!(result, Err(MutationError::Store(_))));
        assert_eq!(guard.snapshot().await.unwrap().state(), TaskState::Disabled);
    }
}
