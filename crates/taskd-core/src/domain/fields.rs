//! Logical names of the task fields stored in an entry.

/// A task field, independent of the physical attribute that stores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskField {
    TaskId,
    RecurringTaskId,
    TaskClass,
    State,
    ScheduledStartTime,
    ActualStartTime,
    CompletionTime,
    DependencyIds,
    FailedDependencyAction,
    NotifyOnCompletion,
    NotifyOnError,
    LogMessages,
}

impl TaskField {
    pub const ALL: [TaskField; 12] = [
        TaskField::TaskId,
        TaskField::RecurringTaskId,
        TaskField::TaskClass,
        TaskField::State,
        TaskField::ScheduledStartTime,
        TaskField::ActualStartTime,
        TaskField::CompletionTime,
        TaskField::DependencyIds,
        TaskField::FailedDependencyAction,
        TaskField::NotifyOnCompletion,
        TaskField::NotifyOnError,
        TaskField::LogMessages,
    ];

    pub fn logical_name(self) -> &'static str {
        match self {
            TaskField::TaskId => "ds-task-id",
            TaskField::RecurringTaskId => "ds-recurring-task-id",
            TaskField::TaskClass => "ds-task-class-name",
            TaskField::State => "ds-task-state",
            TaskField::ScheduledStartTime => "ds-task-scheduled-start-time",
            TaskField::ActualStartTime => "ds-task-actual-start-time",
            TaskField::CompletionTime => "ds-task-completion-time",
            TaskField::DependencyIds => "ds-task-dependency-id",
            TaskField::FailedDependencyAction => "ds-task-failed-dependency-action",
            TaskField::NotifyOnCompletion => "ds-task-notify-on-completion",
            TaskField::NotifyOnError => "ds-task-notify-on-error",
            TaskField::LogMessages => "ds-task-log-message",
        }
    }

    pub fn is_timestamp(self) -> bool {
        matches!(
            self,
            TaskField::ScheduledStartTime | TaskField::ActualStartTime | TaskField::CompletionTime
        )
    }
}
