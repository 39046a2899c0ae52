//! Task record: validated view of a task entry + the entry itself.

use serde::Serialize;
use tracing::{debug, warn};

use super::ordering::OrderKey;
use crate::domain::timestamp::{self, UNSET};
use crate::domain::{
    Entry, FailedDependencyAction, InitializationError, LogMessage, RecurringTaskId, Severity,
    TaskField, TaskId, TaskState,
};
use crate::ports::AttributeResolver;

/// One job instance.
///
/// Design:
/// - Fields are parsed once from the entry at submission time.
/// - Every setter rewrites the matching attribute so `entry` is always the
///   full, current persisted form.
/// - Setters are crate-private; outside code only mutates through the
///   record's `ConcurrencyGuard`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskRecord {
    task_id: TaskId,
    recurring_task_id: Option<RecurringTaskId>,
    task_class: Option<String>,
    state: TaskState,
    scheduled_start_time: i64,
    actual_start_time: i64,
    completion_time: i64,
    dependency_ids: Vec<TaskId>,
    failed_dependency_action: FailedDependencyAction,
    notify_on_completion: Vec<String>,
    notify_on_error: Vec<String>,
    log_messages: Vec<LogMessage>,

    #[serde(skip)]
    next_log_sequence: u64,

    #[serde(skip)]
    entry: Entry,
}

fn attr(resolver: &dyn AttributeResolver, field: TaskField) -> String {
    resolver.resolve_or_default(field.logical_name()).name
}

impl TaskRecord {
    /// Translate a raw entry into a validated record.
    pub fn from_entry(
        mut entry: Entry,
        resolver: &dyn AttributeResolver,
    ) -> Result<Self, InitializationError> {
        let id_attr = attr(resolver, TaskField::TaskId);
        let task_id = entry.single_value(&id_attr)?.map(TaskId::from);
        let recurring_task_id = entry
            .single_value(&attr(resolver, TaskField::RecurringTaskId))?
            .map(RecurringTaskId::new);

        let task_id = match (task_id, &recurring_task_id) {
            (Some(id), _) => id,
            (None, Some(_)) => {
                let generated = TaskId::generate();
                entry.put_attribute(&id_attr, vec![generated.to_string()]);
                generated
            }
            (None, None) => {
                return Err(InitializationError::MissingTaskId {
                    task_id_attr: id_attr,
                });
            }
        };

        let state = match entry.single_value(&attr(resolver, TaskField::State))? {
            None => TaskState::Unscheduled,
            Some(value) => {
                TaskState::parse(value).ok_or_else(|| InitializationError::InvalidState {
                    task_id: task_id.clone(),
                    value: value.to_string(),
                })?
            }
        };

        let read_time = |field: TaskField, label: &'static str| -> Result<i64, InitializationError> {
            match entry.single_value(&attr(resolver, field))? {
                None => Ok(UNSET),
                Some(value) => timestamp::parse_timestamp(value).map_err(|source| {
                    InitializationError::InvalidTimestamp {
                        task_id: task_id.clone(),
                        field: label,
                        value: value.to_string(),
                        source,
                    }
                }),
            }
        };
        let scheduled_start_time = read_time(TaskField::ScheduledStartTime, "scheduled start time")?;
        let mut actual_start_time = read_time(TaskField::ActualStartTime, "actual start time")?;
        let mut completion_time = read_time(TaskField::CompletionTime, "completion time")?;

        // 未開始のタスクは開始時刻も完了時刻も持たない
        if state.is_pending() && (actual_start_time != UNSET || completion_time != UNSET) {
            warn!(task_id = %task_id, state = %state, "pending task carried start or completion time; clearing");
            entry.remove_attribute(&attr(resolver, TaskField::ActualStartTime));
            entry.remove_attribute(&attr(resolver, TaskField::CompletionTime));
            actual_start_time = UNSET;
            completion_time = UNSET;
        }

        let dependency_ids = entry
            .values(&attr(resolver, TaskField::DependencyIds))?
            .into_iter()
            .map(TaskId::from)
            .collect();

        let action_value = entry.single_value(&attr(resolver, TaskField::FailedDependencyAction))?;
        let failed_dependency_action = FailedDependencyAction::from_persisted(action_value);
        if let Some(value) = action_value
            && FailedDependencyAction::parse(value).is_none()
        {
            debug!(task_id = %task_id, value, "unrecognized failed dependency action, using CANCEL");
        }

        let task_class = entry
            .single_value(&attr(resolver, TaskField::TaskClass))?
            .map(str::to_string);
        let notify_on_completion = entry.values(&attr(resolver, TaskField::NotifyOnCompletion))?;
        let notify_on_error = entry.values(&attr(resolver, TaskField::NotifyOnError))?;

        let mut log_messages: Vec<LogMessage> = Vec::new();
        for line in entry.values(&attr(resolver, TaskField::LogMessages))? {
            let fallback = log_messages.last().map_or(0, |m| m.sequence + 1);
            log_messages.push(LogMessage::parse(&line, fallback));
        }
        let next_log_sequence = log_messages
            .iter()
            .map(|m| m.sequence + 1)
            .max()
            .unwrap_or(0);

        Ok(Self {
            task_id,
            recurring_task_id,
            task_class,
            state,
            scheduled_start_time,
            actual_start_time,
            completion_time,
            dependency_ids,
            failed_dependency_action,
            notify_on_completion,
            notify_on_error,
            log_messages,
            next_log_sequence,
            entry,
        })
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    pub fn recurring_task_id(&self) -> Option<&RecurringTaskId> {
        self.recurring_task_id.as_ref()
    }

    pub fn task_class(&self) -> Option<&str> {
        self.task_class.as_deref()
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn scheduled_start_time(&self) -> i64 {
        self.scheduled_start_time
    }

    pub fn actual_start_time(&self) -> i64 {
        self.actual_start_time
    }

    pub fn completion_time(&self) -> i64 {
        self.completion_time
    }

    pub fn dependency_ids(&self) -> &[TaskId] {
        &self.dependency_ids
    }

    pub fn failed_dependency_action(&self) -> FailedDependencyAction {
        self.failed_dependency_action
    }

    pub fn notify_on_completion(&self) -> &[String] {
        &self.notify_on_completion
    }

    pub fn notify_on_error(&self) -> &[String] {
        &self.notify_on_error
    }

    pub fn log_messages(&self) -> &[LogMessage] {
        &self.log_messages
    }

    /// The full entry as it is (or is about to be) persisted.
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// A task-specific single-valued parameter from the entry.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.entry.single_value(name).ok().flatten()
    }

    /// Scheduled start time is unset, non-positive, or not in the future.
    pub fn start_time_reached(&self, now: i64) -> bool {
        self.scheduled_start_time <= 0 || self.scheduled_start_time <= now
    }

    pub fn order_key(&self) -> OrderKey {
        OrderKey {
            completion_time: self.completion_time,
            actual_start_time: self.actual_start_time,
            scheduled_start_time: self.scheduled_start_time,
            task_id: self.task_id.clone(),
        }
    }

    pub(crate) fn set_state(&mut self, state: TaskState, resolver: &dyn AttributeResolver) {
        self.state = state;
        self.entry.put_attribute(
            &attr(resolver, TaskField::State),
            vec![state.as_str().to_string()],
        );
    }

    pub(crate) fn set_actual_start_time(&mut self, millis: i64, resolver: &dyn AttributeResolver) {
        self.actual_start_time = millis;
        self.write_time(&attr(resolver, TaskField::ActualStartTime), millis);
    }

    pub(crate) fn set_completion_time(&mut self, millis: i64, resolver: &dyn AttributeResolver) {
        self.completion_time = millis;
        self.write_time(&attr(resolver, TaskField::CompletionTime), millis);
    }

    /// Append a message with the next sequence number and return it.
    pub(crate) fn append_log(
        &mut self,
        severity: Severity,
        code: u32,
        text: &str,
        now: i64,
        resolver: &dyn AttributeResolver,
    ) -> &LogMessage {
        let message = LogMessage::new(self.next_log_sequence, now, severity, code, text);
        self.next_log_sequence += 1;
        self.entry
            .add_value(&attr(resolver, TaskField::LogMessages), message.line().to_string());
        self.log_messages.push(message);
        &self.log_messages[self.log_messages.len() - 1]
    }

    fn write_time(&mut self, name: &str, millis: i64) {
        if millis < 0 {
            self.entry.remove_attribute(name);
            return;
        }
        match timestamp::format_timestamp(millis) {
            Ok(text) => self.entry.put_attribute(name, vec![text]),
            Err(err) => warn!(task_id = %self.task_id, %err, "timestamp not written to entry"),
        }
    }
}
