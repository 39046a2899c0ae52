//! LogSink port - the directory-wide error log.

use crate::domain::Severity;

/// Receives every message a task appends to its own log.
///
/// Called while the record guard is held, so implementations must not block.
pub trait LogSink: Send + Sync {
    fn append(&self, severity: Severity, code: u32, message: &str);
}
