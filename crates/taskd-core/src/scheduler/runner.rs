//! Execution bracket around one task's domain logic.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info};

use super::guard::{ConcurrencyGuard, MutationContext, tolerate_store_failure};
use super::record::TaskRecord;
use crate::domain::log::codes;
use crate::domain::{GuardError, Severity, TaskId, TaskState};
use crate::typed::TaskHandler;

pub type RecordGuard = ConcurrencyGuard<TaskRecord>;

/// A request to stop a task early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interrupt {
    /// State the task should end in if it honors the request.
    pub state: TaskState,
    pub reason: String,
}

/// What a handler gets to see and touch while it runs.
///
/// The record lock is never held while handler code runs; every method
/// here takes and releases it on its own.
#[derive(Clone)]
pub struct TaskContext {
    record: Arc<RecordGuard>,
    mutation: MutationContext,
    interrupt: watch::Receiver<Option<Interrupt>>,
}

impl TaskContext {
    pub fn task_id(&self) -> &TaskId {
        self.record.task_id()
    }

    pub async fn snapshot(&self) -> Result<TaskRecord, GuardError> {
        self.record.snapshot().await
    }

    /// Append to the task log, persist, and forward to the log sink.
    pub async fn log(&self, severity: Severity, code: u32, text: &str) -> Result<(), GuardError> {
        let result = self
            .record
            .mutate(&self.mutation, |edit| edit.log(severity, code, text))
            .await;
        tolerate_store_failure(self.task_id(), result).map(|_| ())
    }

    /// The pending interrupt request, if any.
    pub fn interrupt_requested(&self) -> Option<Interrupt> {
        self.interrupt.borrow().clone()
    }

    /// Resolves once an interrupt is requested. Never resolves otherwise.
    pub async fn interrupted(&self) -> Interrupt {
        let mut rx = self.interrupt.clone();
        loop {
            let requested = rx.borrow_and_update().clone();
            if let Some(interrupt) = requested {
                return interrupt;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

enum Run {
    Finished(TaskState),
    Failed(String),
    Panicked(String),
}

pub struct TaskRunner {
    ctx: MutationContext,
}

impl TaskRunner {
    pub fn new(ctx: MutationContext) -> Self {
        Self { ctx }
    }

    pub fn mutation_context(&self) -> &MutationContext {
        &self.ctx
    }

    /// Run one task to its final state.
    ///
    /// 1. Under the guard: actual start time = now, state = RUNNING.
    /// 2. Handler runs outside the guard.
    /// 3./4. Final state from the handler, or STOPPED_BY_ERROR with a log entry.
    /// 5. Completion time written with the final state, always last.
    ///
    /// An interrupt requested before step 1 cancels the task without running
    /// it. The check happens under the record lock, so a request made while
    /// holding that lock is always seen.
    pub async fn execute(
        &self,
        record: Arc<RecordGuard>,
        handler: Arc<dyn TaskHandler>,
        interrupt: watch::Receiver<Option<Interrupt>>,
    ) -> Result<TaskState, GuardError> {
        let task_id = record.task_id().clone();

        // 割り込みの確認と RUNNING への遷移は同じロックの中で行う
        let started = record
            .mutate(&self.ctx, |edit| match interrupt.borrow().clone() {
                Some(interrupt) => {
                    edit.log(
                        Severity::Informational,
                        codes::CANCELED_BEFORE_STARTING,
                        &format!("Task canceled before starting: {}", interrupt.reason),
                    );
                    edit.mark_completed(TaskState::CanceledBeforeStarting);
                    false
                }
                None => {
                    edit.mark_started();
                    true
                }
            })
            .await;
        let started = match tolerate_store_failure(&task_id, started)? {
            Some(started) => started,
            None => record.snapshot().await?.state() == TaskState::Running,
        };
        if !started {
            info!(task_id = %task_id, "task canceled before starting");
            return Ok(TaskState::CanceledBeforeStarting);
        }
        info!(task_id = %task_id, "task started");

        let context = TaskContext {
            record: Arc::clone(&record),
            mutation: self.ctx.clone(),
            interrupt,
        };
        // handler の panic もここで捕まえる
        let joined = tokio::spawn(async move { handler.run(context).await }).await;
        let run = match joined {
            Ok(Ok(state)) => Run::Finished(state),
            Ok(Err(err)) => Run::Failed(err.single_line()),
            Err(join_err) => Run::Panicked(join_err.to_string()),
        };

        let result = record
            .mutate(&self.ctx, |edit| {
                let final_state = match run {
                    Run::Finished(state) if state.is_terminal() => state,
                    Run::Finished(state) => {
                        edit.log(
                            Severity::SevereError,
                            codes::NON_TERMINAL_RESULT,
                            &format!("Task returned non-terminal state {state}"),
                        );
                        TaskState::StoppedByError
                    }
                    Run::Failed(message) => {
                        let text = format!(
                            "An error occurred while executing task {}: {message}",
                            edit.record().task_id()
                        );
                        edit.log(Severity::SevereError, codes::TASK_EXECUTE_FAILED, &text);
                        TaskState::StoppedByError
                    }
                    Run::Panicked(message) => {
                        let text = format!(
                            "Task {} panicked while executing: {message}",
                            edit.record().task_id()
                        );
                        edit.log(Severity::FatalError, codes::TASK_PANICKED, &text);
                        TaskState::StoppedByError
                    }
                };
                edit.mark_completed(final_state);
                final_state
            })
            .await;

        let final_state = match tolerate_store_failure(&task_id, result) {
            Ok(Some(state)) => state,
            Ok(None) => record.snapshot().await?.state(),
            Err(err) => {
                error!(task_id = %task_id, %err, "could not record task completion");
                return Err(err);
            }
        };
        info!(task_id = %task_id, state = %final_state, "task finished");
        Ok(final_state)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::domain::{Entry, TaskError};
    use crate::impls::{DirectorySchema, InMemoryRecordStore, TracingLogSink};
    use crate::ports::FixedClock;
    use crate::typed::handler_fn;

    fn setup() -> (TaskRunner, Arc<RecordGuard>) {
        let ctx = MutationContext {
            store: Arc::new(InMemoryRecordStore::new()),
            resolver: Arc::new(DirectorySchema::standard()),
            clock: Arc::new(FixedClock::new(10_000)),
            log_sink: Arc::new(TracingLogSink),
        };
        let entry = Entry::new().with_value("ds-task-id", "T1");
        let record = TaskRecord::from_entry(entry, &DirectorySchema::standard()).unwrap();
        let guard = Arc::new(ConcurrencyGuard::new(
            TaskId::new("T1"),
            record,
            Duration::from_secs(1),
        ));
        (TaskRunner::new(ctx), guard)
    }

    fn no_interrupt() -> watch::Receiver<Option<Interrupt>> {
        watch::channel(None).1
    }

    #[tokio::test]
    async fn successful_run_sets_times_and_state() {
        let (runner, record) = setup();
        let handler = Arc::new(handler_fn(|ctx: TaskContext| async move {
            let snapshot = ctx.snapshot().await.unwrap();
            assert_eq!(snapshot.state(), TaskState::Running);
            Ok::<_, TaskError>(TaskState::CompletedSuccessfully)
        }));

        let state = runner
            .execute(record.clone(), handler, no_interrupt())
            .await
            .unwrap();

        let snapshot = record.snapshot().await.unwrap();
        assert_eq!(state, TaskState::CompletedSuccessfully);
        assert_eq!(snapshot.state(), TaskState::CompletedSuccessfully);
        assert_eq!(snapshot.actual_start_time(), 10_000);
        assert_eq!(snapshot.completion_time(), 10_000);
    }

    #[tokio::test]
    async fn error_becomes_stopped_by_error_with_log() {
        let (runner, record) = setup();
        let handler = Arc::new(handler_fn(|_ctx: TaskContext| async move {
            Err(TaskError::new("backend offline\nretry later"))
        }));

        let state = runner.execute(record.clone(), handler, no_interrupt()).await.unwrap();

        let snapshot = record.snapshot().await.unwrap();
        assert_eq!(state, TaskState::StoppedByError);
        let last = snapshot.log_messages().last().unwrap();
        assert_eq!(last.severity, Severity::SevereError);
        assert_eq!(last.code, codes::TASK_EXECUTE_FAILED);
        assert!(last.text.contains("backend offline retry later"));
        assert!(snapshot.completion_time() > 0);
    }

    #[tokio::test]
    async fn panic_is_captured() {
        let (runner, record) = setup();
        let handler = Arc::new(handler_fn(|_ctx: TaskContext| async move {
            if true {
                panic!("boom");
            }
            Ok::<_, TaskError>(TaskState::CompletedSuccessfully)
        }));

        let state = runner.execute(record.clone(), handler, no_interrupt()).await.unwrap();
        assert_eq!(state, TaskState::StoppedByError);
        let snapshot = record.snapshot().await.unwrap();
        assert_eq!(snapshot.log_messages().last().unwrap().code, codes::TASK_PANICKED);
        assert!(snapshot.completion_time() > 0);
    }

    #[tokio::test]
    async fn non_terminal_result_is_coerced() {
        let (runner, record) = setup();
        let handler = Arc::new(handler_fn(|_ctx: TaskContext| async move {
            Ok::<_, TaskError>(TaskState::Running)
        }));

        let state = runner.execute(record.clone(), handler, no_interrupt()).await.unwrap();

        assert_eq!(state, TaskState::StoppedByError);
        let snapshot = record.snapshot().await.unwrap();
        assert_eq!(snapshot.log_messages()[0].code, codes::NON_TERMINAL_RESULT);
    }

    #[tokio::test]
    async fn interrupt_before_start_skips_handler() {
        let (runner, record) = setup();
        let (tx, rx) = watch::channel(None);
        tx.send_replace(Some(Interrupt {
            state: TaskState::StoppedByAdministrator,
            reason: "not today".into(),
        }));
        let handler = Arc::new(handler_fn(|_ctx: TaskContext| async move {
            if true {
                panic!("handler must not run");
            }
            Ok::<_, TaskError>(TaskState::CompletedSuccessfully)
        }));

        let state = runner.execute(record.clone(), handler, rx).await.unwrap();

        let snapshot = record.snapshot().await.unwrap();
        assert_eq!(state, TaskState::CanceledBeforeStarting);
        assert_eq!(snapshot.actual_start_time(), crate::domain::UNSET);
        assert!(snapshot.completion_time() > 0);
    }

    #[tokio::test]
    async fn interrupt_sent_while_record_locked_prevents_start() {
        let (runner, record) = setup();
        let (tx, rx) = watch::channel(None);
        let handler = Arc::new(handler_fn(|_ctx: TaskContext| async move {
            if true {
                panic!("handler must not run");
            }
            Ok::<_, TaskError>(TaskState::CompletedSuccessfully)
        }));

        let held = record.acquire().await.unwrap();
        let run = {
            let record = record.clone();
            tokio::spawn(async move { runner.execute(record, handler, rx).await })
        };
        // runner はロック待ちの状態
        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send_replace(Some(Interrupt {
            state: TaskState::StoppedByAdministrator,
            reason: "operator request".into(),
        }));
        drop(held);

        let state = run.await.unwrap().unwrap();
        assert_eq!(state, TaskState::CanceledBeforeStarting);
        assert_eq!(
            record.snapshot().await.unwrap().actual_start_time(),
            crate::domain::UNSET
        );
    }

    #[tokio::test]
    async fn cooperative_handler_observes_interrupt() {
        let (runner, record) = setup();
        let (tx, rx) = watch::channel(None);
        let handler = Arc::new(handler_fn(|ctx: TaskContext| async move {
            let interrupt = ctx.interrupted().await;
            ctx.log(Severity::Notice, codes::INTERRUPT_REQUESTED, &interrupt.reason)
                .await
                .unwrap();
            Ok::<_, TaskError>(interrupt.state)
        }));

        let run = tokio::spawn(async move { runner.execute(record, handler, rx).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send_replace(Some(Interrupt {
            state: TaskState::StoppedByAdministrator,
            reason: "operator request".into(),
        }));

        let state = run.await.unwrap().unwrap();
        assert_eq!(state, TaskState::StoppedByAdministrator);
    }
}
