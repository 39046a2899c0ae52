use serde::{Deserialize, Serialize};

use crate::domain::TaskState;

/// Number of known tasks per lifecycle bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    pub pending: usize,
    pub running: usize,
    pub successful: usize,
    pub failed: usize,
    pub disabled: usize,
}

impl TaskCounts {
    pub fn record(&mut self, state: TaskState) {
        match state {
            TaskState::Unscheduled
            | TaskState::WaitingOnStartTime
            | TaskState::WaitingOnDependency => self.pending += 1,
            TaskState::Running => self.running += 1,
            TaskState::CompletedSuccessfully => self.successful += 1,
            TaskState::Disabled => self.disabled += 1,
            TaskState::CompletedWithErrors
            | TaskState::StoppedByShutdown
            | TaskState::StoppedByError
            | TaskState::StoppedByAdministrator
            | TaskState::CanceledBeforeStarting => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.pending + self.running + self.successful + self.failed + self.disabled
    }
}

impl FromIterator<TaskState> for TaskCounts {
    fn from_iter<I: IntoIterator<Item = TaskState>>(iter: I) -> Self {
        let mut counts = TaskCounts::default();
        for state in iter {
            counts.record(state);
        }
        counts
    }
}
