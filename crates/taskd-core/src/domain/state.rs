//! Task lifecycle states and the failed-dependency policy.
//!
//! State transitions:
//! - UNSCHEDULED -> RUNNING -> (any terminal state)      via the task runner
//! - UNSCHEDULED -> CANCELED_BEFORE_STARTING             admin cancel / failed dependency
//! - UNSCHEDULED -> DISABLED                             failed dependency with DISABLE
//!
//! The engine only needs the three-way `StateClass` split; the concrete
//! terminal set can grow without touching scheduling logic.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    /// Submitted, not yet considered for execution.
    Unscheduled,

    /// Waiting for its scheduled start time.
    WaitingOnStartTime,

    /// Waiting for one or more dependencies to finish.
    WaitingOnDependency,

    /// Domain logic is executing.
    Running,

    CompletedSuccessfully,

    /// Ran to completion but reported problems along the way.
    CompletedWithErrors,

    /// Interrupted because the server was shutting down.
    StoppedByShutdown,

    /// Domain logic raised an error.
    StoppedByError,

    /// Interrupted by an administrator while running.
    StoppedByAdministrator,

    /// Canceled (by an administrator or a failed dependency) before it ran.
    CanceledBeforeStarting,

    /// Excluded from admission because a dependency failed.
    Disabled,
}

/// Coarse classification used by admission and ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateClass {
    Pending,
    Running,
    Terminal,
}

impl TaskState {
    pub const ALL: [TaskState; 11] = [
        TaskState::Unscheduled,
        TaskState::WaitingOnStartTime,
        TaskState::WaitingOnDependency,
        TaskState::Running,
        TaskState::CompletedSuccessfully,
        TaskState::CompletedWithErrors,
        TaskState::StoppedByShutdown,
        TaskState::StoppedByError,
        TaskState::StoppedByAdministrator,
        TaskState::CanceledBeforeStarting,
        TaskState::Disabled,
    ];

    pub fn class(self) -> StateClass {
        match self {
            TaskState::Unscheduled
            | TaskState::WaitingOnStartTime
            | TaskState::WaitingOnDependency => StateClass::Pending,
            TaskState::Running => StateClass::Running,
            TaskState::CompletedSuccessfully
            | TaskState::CompletedWithErrors
            | TaskState::StoppedByShutdown
            | TaskState::StoppedByError
            | TaskState::StoppedByAdministrator
            | TaskState::CanceledBeforeStarting
            | TaskState::Disabled => StateClass::Terminal,
        }
    }

    pub fn is_pending(self) -> bool {
        self.class() == StateClass::Pending
    }

    pub fn is_running(self) -> bool {
        self.class() == StateClass::Running
    }

    /// No further execution-driven transition will happen.
    pub fn is_terminal(self) -> bool {
        self.class() == StateClass::Terminal
    }

    /// Only a clean completion satisfies a dependency.
    pub fn is_successful(self) -> bool {
        matches!(self, TaskState::CompletedSuccessfully)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Unscheduled => "UNSCHEDULED",
            TaskState::WaitingOnStartTime => "WAITING_ON_START_TIME",
            TaskState::WaitingOnDependency => "WAITING_ON_DEPENDENCY",
            TaskState::Running => "RUNNING",
            TaskState::CompletedSuccessfully => "COMPLETED_SUCCESSFULLY",
            TaskState::CompletedWithErrors => "COMPLETED_WITH_ERRORS",
            TaskState::StoppedByShutdown => "STOPPED_BY_SHUTDOWN",
            TaskState::StoppedByError => "STOPPED_BY_ERROR",
            TaskState::StoppedByAdministrator => "STOPPED_BY_ADMINISTRATOR",
            TaskState::CanceledBeforeStarting => "CANCELED_BEFORE_STARTING",
            TaskState::Disabled => "DISABLED",
        }
    }

    /// Parse a persisted state name (case-insensitive). `None` if unrecognized.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(value))
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do with a task when one of its dependencies did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailedDependencyAction {
    /// Cancel the task without running it.
    #[default]
    Cancel,

    /// Run the task anyway.
    Process,

    /// Disable the task; it is never admitted.
    Disable,
}

impl FailedDependencyAction {
    pub fn as_str(self) -> &'static str {
        match self {
            FailedDependencyAction::Cancel => "CANCEL",
            FailedDependencyAction::Process => "PROCESS",
            FailedDependencyAction::Disable => "DISABLE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        [Self::Cancel, Self::Process, Self::Disable]
            .into_iter()
            .find(|action| action.as_str().eq_ignore_ascii_case(value))
    }

    /// Interpret a persisted value. Unlike `TaskState`, anything
    /// unrecognized falls back to CANCEL instead of failing.
    pub fn from_persisted(value: Option<&str>) -> Self {
        value.and_then(Self::parse).unwrap_or_default()
    }
}

impl fmt::Display for FailedDependencyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::upper("UNSCHEDULED", TaskState::Unscheduled)]
    #[case::lower("running", TaskState::Running)]
    #[case::padded(" completed_successfully ", TaskState::CompletedSuccessfully)]
    #[case::disabled("DISABLED", TaskState::Disabled)]
    fn parses_known_states(#[case] input: &str, #[case] expected: TaskState) {
        assert_eq!(TaskState::parse(input), Some(expected));
    }

    #[test]
    fn unknown_state_is_none() {
        assert_eq!(TaskState::parse("bogus"), None);
    }

    #[test]
    fn every_state_round_trips_through_its_name() {
        for state in TaskState::ALL {
            assert_eq!(TaskState::parse(state.as_str()), Some(state));
        }
    }

    #[rstest]
    #[case::running(TaskState::Running, StateClass::Running)]
    #[case::unscheduled(TaskState::Unscheduled, StateClass::Pending)]
    #[case::waiting(TaskState::WaitingOnDependency, StateClass::Pending)]
    #[case::error(TaskState::StoppedByError, StateClass::Terminal)]
    #[case::disabled(TaskState::Disabled, StateClass::Terminal)]
    fn classifies_states(#[case] state: TaskState, #[case] class: StateClass) {
        assert_eq!(state.class(), class);
    }

    #[test]
    fn only_clean_completion_is_successful() {
        let successful: Vec<_> = TaskState::ALL
            .into_iter()
            .filter(|s| s.is_successful())
            .collect();
        assert_eq!(successful, vec![TaskState::CompletedSuccessfully]);
    }

    #[rstest]
    #[case::absent(None, FailedDependencyAction::Cancel)]
    #[case::process(Some("process"), FailedDependencyAction::Process)]
    #[case::disable(Some("DISABLE"), FailedDependencyAction::Disable)]
    #[case::garbage(Some("explode"), FailedDependencyAction::Cancel)]
    fn failed_dependency_action_falls_back_to_cancel(
        #[case] input: Option<&str>,
        #[case] expected: FailedDependencyAction,
    ) {
        assert_eq!(FailedDependencyAction::from_persisted(input), expected);
    }
}
