//! Error taxonomy for the task scheduler.
//!
//! - `InitializationError`: an entry cannot become a task. Returned to the
//!   submitter synchronously; the task never enters the pending set.
//! - `TaskError`: raised by task logic while running. Recovered locally and
//!   turned into `STOPPED_BY_ERROR`.
//! - `StoreError`: the record store refused a load/store.
//! - `GuardError`: a record lock could not be acquired in time. Fatal.
//! - `SchedulerError`: what the public scheduler API returns.

use std::time::Duration;

use thiserror::Error;

use super::ids::TaskId;
use super::timestamp::TimestampError;

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("task entry has neither a task ID ({task_id_attr}) nor a recurring task ID")]
    MissingTaskId { task_id_attr: String },

    #[error("task entry has multiple instances of attribute {attribute}")]
    MultipleAttributes { attribute: String },

    #[error("attribute {attribute} has multiple values but only one is allowed")]
    MultipleValues { attribute: String },

    #[error("task {task_id} has unrecognized state {value:?}")]
    InvalidState { task_id: TaskId, value: String },

    #[error("cannot parse {field} value {value:?} for task {task_id}: {source}")]
    InvalidTimestamp {
        task_id: TaskId,
        field: &'static str,
        value: String,
        #[source]
        source: TimestampError,
    },

    #[error("task {task_id} depends on unknown task {dependency}")]
    UnknownDependency { task_id: TaskId, dependency: TaskId },

    #[error("dependency cycle detected: {}", format_cycle(.cycle))]
    DependencyCycle { cycle: Vec<TaskId> },

    #[error("a task with ID {0} is already scheduled")]
    DuplicateTaskId(TaskId),

    #[error("task {task_id} names task class {class:?} but no handler is registered for it")]
    UnknownTaskClass { task_id: TaskId, class: String },

    #[error("task {0} does not name a task class and no default handler is registered")]
    MissingTaskClass(TaskId),

    #[error("task {task_id} was rejected during initialization: {source}")]
    TaskRejected {
        task_id: TaskId,
        #[source]
        source: TaskError,
    },
}

fn format_cycle(cycle: &[TaskId]) -> String {
    cycle
        .iter()
        .map(TaskId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Failure raised by a task's own logic.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TaskError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TaskError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Render the error and its whole source chain on a single line.
    pub fn single_line(&self) -> String {
        let mut out = self.message.clone();
        let mut next = std::error::Error::source(self);
        while let Some(cause) = next {
            out.push_str(": ");
            out.push_str(&cause.to_string());
            next = cause.source();
        }
        out.replace(['\r', '\n'], " ")
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record store is unavailable: {0}")]
    Unavailable(String),

    #[error("record store rejected entry for task {task_id}: {reason}")]
    Rejected { task_id: TaskId, reason: String },
}

#[derive(Debug, Error)]
pub enum GuardError {
    #[error("could not lock record for task {task_id} within {waited:?}")]
    Timeout { task_id: TaskId, waited: Duration },
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("no task with ID {0}")]
    NotFound(TaskId),

    #[error(transparent)]
    Initialization(#[from] InitializationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Guard(#[from] GuardError),

    #[error("scheduler is halted: {0}")]
    Halted(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_line_joins_source_chain() {
        let io = std::io::Error::other("disk full\nwhile writing");
        let err = TaskError::with_source("backup failed", io);

        assert_eq!(err.single_line(), "backup failed: disk full while writing");
    }

    #[test]
    fn cycle_message_lists_path() {
        let err = InitializationError::DependencyCycle {
            cycle: vec![TaskId::new("A"), TaskId::new("B"), TaskId::new("A")],
        };

        assert_eq!(err.to_string(), "dependency cycle detected: A -> B -> A");
    }
}
