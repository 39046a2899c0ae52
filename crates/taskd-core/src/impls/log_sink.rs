//! TracingLogSink - forwards task log messages to `tracing`.

use tracing::{error, info, warn};

use crate::domain::Severity;
use crate::ports::LogSink;

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn append(&self, severity: Severity, code: u32, message: &str) {
        match severity {
            Severity::Informational | Severity::Notice => {
                info!(target: "taskd::task_log", %severity, code, "{message}")
            }
            Severity::MildWarning | Severity::SevereWarning => {
                warn!(target: "taskd::task_log", %severity, code, "{message}")
            }
            Severity::MildError | Severity::SevereError | Severity::FatalError => {
                error!(target: "taskd::task_log", %severity, code, "{message}")
            }
        }
    }
}
