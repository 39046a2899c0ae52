//! Task log messages.
//!
//! Each message is persisted as one attribute value of the form
//!
//! ```text
//! [20240102030405.678Z] severity="SEVERE_ERROR" msgCount=3 msgID=1400 message="disk full"
//! ```
//!
//! and parsed back when the entry is reloaded.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::timestamp::{self, UNSET};

/// Message codes used by the scheduler itself.
pub mod codes {
    pub const GENERIC: u32 = 0;
    pub const TASK_EXECUTE_FAILED: u32 = 1400;
    pub const NON_TERMINAL_RESULT: u32 = 1401;
    pub const CANCELED_BEFORE_STARTING: u32 = 1402;
    pub const DEPENDENCY_FAILED: u32 = 1403;
    pub const INTERRUPT_REQUESTED: u32 = 1404;
    pub const RECOVERED_RUNNING: u32 = 1405;
    pub const DISABLED_BY_DEPENDENCY: u32 = 1406;
    pub const TASK_PANICKED: u32 = 1407;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Informational,
    Notice,
    MildWarning,
    SevereWarning,
    MildError,
    SevereError,
    FatalError,
}

impl Severity {
    const ALL: [Severity; 7] = [
        Severity::Informational,
        Severity::Notice,
        Severity::MildWarning,
        Severity::SevereWarning,
        Severity::MildError,
        Severity::SevereError,
        Severity::FatalError,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Informational => "INFORMATIONAL",
            Severity::Notice => "NOTICE",
            Severity::MildWarning => "MILD_WARNING",
            Severity::SevereWarning => "SEVERE_WARNING",
            Severity::MildError => "MILD_ERROR",
            Severity::SevereError => "SEVERE_ERROR",
            Severity::FatalError => "FATAL_ERROR",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(value.trim()))
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a task's append-only log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogMessage {
    pub sequence: u64,
    pub timestamp: i64,
    pub severity: Severity,
    pub code: u32,
    pub text: String,

    /// Persisted form; kept verbatim for lines that did not parse.
    #[serde(skip)]
    line: String,
}

impl LogMessage {
    pub fn new(
        sequence: u64,
        timestamp: i64,
        severity: Severity,
        code: u32,
        text: impl Into<String>,
    ) -> Self {
        let text = text.into();
        let rendered_at =
            timestamp::format_timestamp(timestamp).unwrap_or_else(|_| timestamp.to_string());
        let line = format!(
            "[{rendered_at}] severity=\"{severity}\" msgCount={sequence} msgID={code} message=\"{text}\""
        );
        Self {
            sequence,
            timestamp,
            severity,
            code,
            text,
            line,
        }
    }

    /// Parse a persisted line.
    ///
    /// Lines not in the expected shape are kept as INFORMATIONAL text with
    /// `fallback_sequence`, so a foreign log never blocks loading a task.
    pub fn parse(line: &str, fallback_sequence: u64) -> Self {
        match Self::parse_structured(line) {
            Some(mut message) => {
                message.line = line.to_string();
                message
            }
            None => Self {
                sequence: fallback_sequence,
                timestamp: UNSET,
                severity: Severity::Informational,
                code: codes::GENERIC,
                text: line.to_string(),
                line: line.to_string(),
            },
        }
    }

    fn parse_structured(line: &str) -> Option<Self> {
        let rest = line.strip_prefix('[')?;
        let (at, rest) = rest.split_once("] severity=\"")?;
        let (severity, rest) = rest.split_once("\" msgCount=")?;
        let (sequence, rest) = rest.split_once(" msgID=")?;
        let (code, rest) = rest.split_once(" message=\"")?;
        let text = rest.strip_suffix('"')?;

        Some(Self {
            sequence: sequence.parse().ok()?,
            timestamp: timestamp::parse_timestamp(at).unwrap_or(UNSET),
            severity: Severity::parse(severity)?,
            code: code.parse().ok()?,
            text: text.to_string(),
            line: String::new(),
        })
    }

    pub fn line(&self) -> &str {
        &self.line
    }
}

impl fmt::Display for LogMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_persisted_form() {
        let msg = LogMessage::new(
            3,
            1_704_164_645_678,
            Severity::SevereError,
            codes::TASK_EXECUTE_FAILED,
            "disk full",
        );

        assert_eq!(
            msg.to_string(),
            "[20240102030405.678Z] severity=\"SEVERE_ERROR\" msgCount=3 msgID=1400 message=\"disk full\""
        );
    }

    #[test]
    fn parses_rendered_line() {
        let original = LogMessage::new(7, 1_000, Severity::Notice, 42, "said \"hi\"");
        let parsed = LogMessage::parse(original.line(), 0);

        assert_eq!(parsed, original);
    }

    #[test]
    fn unparsable_line_is_kept_verbatim() {
        let parsed = LogMessage::parse("something else entirely", 5);

        assert_eq!(parsed.sequence, 5);
        assert_eq!(parsed.severity, Severity::Informational);
        assert_eq!(parsed.timestamp, UNSET);
        assert_eq!(parsed.line(), "something else entirely");
    }

    #[test]
    fn severity_names_round_trip() {
        for severity in Severity::ALL {
            assert_eq!(Severity::parse(severity.as_str()), Some(severity));
        }
    }
}
