//! Shared fixtures for scheduler integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use taskd_core::app::{SchedulerBuilder, SchedulerConfig};
use taskd_core::domain::{Entry, TaskError, TaskId, TaskState};
use taskd_core::impls::{InMemoryRecordStore, RecordingNotifier};
use taskd_core::ports::Notification;
use taskd_core::scheduler::{Scheduler, TaskContext};
use taskd_core::typed::TaskHandler;
use tokio::sync::watch;

/// Order in which handlers were entered.
pub type RunLog = Arc<Mutex<Vec<String>>>;

/// Records that it ran, then returns a fixed outcome.
pub struct Scripted {
    pub ran: RunLog,
    pub outcome: Result<TaskState, String>,
}

#[async_trait]
impl TaskHandler for Scripted {
    async fn run(&self, ctx: TaskContext) -> Result<TaskState, TaskError> {
        self.ran.lock().unwrap().push(ctx.task_id().to_string());
        self.outcome.clone().map_err(TaskError::new)
    }
}

/// Records that it ran, then blocks until the gate opens or it is interrupted.
pub struct Gated {
    pub ran: RunLog,
    pub gate: watch::Receiver<bool>,
}

#[async_trait]
impl TaskHandler for Gated {
    async fn run(&self, ctx: TaskContext) -> Result<TaskState, TaskError> {
        self.ran.lock().unwrap().push(ctx.task_id().to_string());
        tokio::select! {
            _ = opened(self.gate.clone()) => Ok(TaskState::CompletedSuccessfully),
            interrupt = ctx.interrupted() => Ok(interrupt.state),
        }
    }
}

async fn opened(mut gate: watch::Receiver<bool>) {
    loop {
        let open = *gate.borrow_and_update();
        if open {
            return;
        }
        if gate.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

pub struct Harness {
    pub scheduler: Scheduler,
    pub store: Arc<InMemoryRecordStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub ran: RunLog,
    pub gate: watch::Sender<bool>,
}

impl Harness {
    /// Classes: `ok` (default), `fail`, `gated`.
    pub fn start() -> Self {
        Self::with_store(Arc::new(InMemoryRecordStore::new()))
    }

    pub fn with_store(store: Arc<InMemoryRecordStore>) -> Self {
        let notifier = Arc::new(RecordingNotifier::new());
        let ran: RunLog = Arc::default();
        let (gate, gate_rx) = watch::channel(false);

        let scheduler = SchedulerBuilder::new()
            .config(SchedulerConfig {
                idle_poll_interval_ms: 20,
                guard_timeout_ms: 2_000,
                ..SchedulerConfig::default()
            })
            .store(store.clone())
            .notifier(notifier.clone())
            .default_handler(Scripted {
                ran: ran.clone(),
                outcome: Ok(TaskState::CompletedSuccessfully),
            })
            .register(
                "fail",
                Scripted {
                    ran: ran.clone(),
                    outcome: Err("backend unavailable".to_string()),
                },
            )
            .unwrap()
            .register(
                "gated",
                Gated {
                    ran: ran.clone(),
                    gate: gate_rx,
                },
            )
            .unwrap()
            .build()
            .unwrap();

        Self {
            scheduler,
            store,
            notifier,
            ran,
            gate,
        }
    }

    pub fn ran(&self) -> Vec<String> {
        self.ran.lock().unwrap().clone()
    }

    pub async fn wait(&self, id: &str) -> taskd_core::scheduler::TaskRecord {
        tokio::time::timeout(
            Duration::from_secs(5),
            self.scheduler.wait_for_completion(&TaskId::new(id)),
        )
        .await
        .unwrap()
        .unwrap()
    }

    /// Notifications are delivered after retirement; poll briefly.
    pub async fn notifications(&self, expected: usize) -> Vec<Notification> {
        for _ in 0..100 {
            let sent = self.notifier.sent().await;
            if sent.len() >= expected {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.notifier.sent().await
    }
}

pub fn task(id: &str) -> Entry {
    Entry::new().with_value("ds-task-id", id)
}

pub fn failing(id: &str) -> Entry {
    task(id).with_value("ds-task-class-name", "fail")
}

pub fn gated(id: &str) -> Entry {
    task(id).with_value("ds-task-class-name", "gated")
}
