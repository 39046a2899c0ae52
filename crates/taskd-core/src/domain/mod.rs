//! Domain model: identifiers, raw entries, lifecycle states, log messages, errors.

pub mod entry;
pub mod errors;
pub mod fields;
pub mod ids;
pub mod log;
pub mod state;
pub mod timestamp;

pub use self::entry::{Attribute, Entry};
pub use self::errors::{
    GuardError, InitializationError, SchedulerError, StoreError, TaskError,
};
pub use self::fields::TaskField;
pub use self::ids::{RecurringTaskId, TaskId};
pub use self::log::{LogMessage, Severity};
pub use self::state::{FailedDependencyAction, StateClass, TaskState};
pub use self::timestamp::{TimestampError, UNSET};
