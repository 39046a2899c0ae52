//! Demo task classes.

use std::time::Duration;

use async_trait::async_trait;
use taskd_core::domain::log::codes;
use taskd_core::domain::{Severity, TaskError, TaskState};
use taskd_core::scheduler::{TaskContext, TaskRecord};
use taskd_core::typed::TaskHandler;

/// Task parameter read by [`SleepHandler`].
pub const SLEEP_MS_ATTR: &str = "ds-task-sleep-ms";

/// Task parameter read by [`FailHandler`].
pub const FAIL_MESSAGE_ATTR: &str = "ds-task-fail-message";

/// Sleeps for `ds-task-sleep-ms` milliseconds, stopping early on interrupt.
pub struct SleepHandler;

impl SleepHandler {
    fn duration(record: &TaskRecord) -> Result<Duration, TaskError> {
        match record.parameter(SLEEP_MS_ATTR) {
            None => Ok(Duration::ZERO),
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|err| {
                    TaskError::with_source(format!("invalid {SLEEP_MS_ATTR} value {raw:?}"), err)
                }),
        }
    }
}

#[async_trait]
impl TaskHandler for SleepHandler {
    fn initialize(&self, record: &TaskRecord) -> Result<(), TaskError> {
        Self::duration(record).map(|_| ())
    }

    async fn run(&self, ctx: TaskContext) -> Result<TaskState, TaskError> {
        let record = ctx
            .snapshot()
            .await
            .map_err(|err| TaskError::with_source("could not read task record", err))?;
        let duration = Self::duration(&record)?;

        tokio::select! {
            _ = tokio::time::sleep(duration) => {
                ctx.log(
                    Severity::Informational,
                    codes::GENERIC,
                    &format!("Slept for {} ms", duration.as_millis()),
                )
                .await
                .map_err(|err| TaskError::with_source("could not write task log", err))?;
                Ok(TaskState::CompletedSuccessfully)
            }
            interrupt = ctx.interrupted() => {
                ctx.log(Severity::Notice, codes::INTERRUPT_REQUESTED, &interrupt.reason)
                    .await
                    .map_err(|err| TaskError::with_source("could not write task log", err))?;
                Ok(interrupt.state)
            }
        }
    }
}

/// Always fails, with `ds-task-fail-message` if present.
pub struct FailHandler;

#[async_trait]
impl TaskHandler for FailHandler {
    async fn run(&self, ctx: TaskContext) -> Result<TaskState, TaskError> {
        let message = ctx
            .snapshot()
            .await
            .ok()
            .and_then(|record| record.parameter(FAIL_MESSAGE_ATTR).map(str::to_string))
            .unwrap_or_else(|| "task failed on purpose".to_string());
        Err(TaskError::new(message))
    }
}
