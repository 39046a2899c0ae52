//! Timestamp fields of a task entry.
//!
//! All times are epoch milliseconds; `UNSET` (-1) marks "not yet happened".
//! Two textual forms are accepted on input:
//! - UTC, with a trailing `Z`: `yyyyMMddHHmmss.SSSZ` or `yyyyMMddHHmmssZ`
//! - local time, no marker: `yyyyMMddHHmmss`
//!
//! Output is always the UTC form with milliseconds.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;

/// Sentinel for a timestamp that has not been set.
pub const UNSET: i64 = -1;

const UTC_FORMAT: &str = "%Y%m%d%H%M%S%.3fZ";
const COMPACT_FORMATS: [&str; 2] = ["%Y%m%d%H%M%S%.f", "%Y%m%d%H%M%S"];

#[derive(Debug, Error)]
pub enum TimestampError {
    #[error(transparent)]
    Parse(#[from] chrono::ParseError),

    #[error("{0} does not exist in the local time zone")]
    NonexistentLocalTime(NaiveDateTime),

    #[error("{0} ms is outside the representable range")]
    OutOfRange(i64),
}

/// Parse a timestamp attribute value into epoch milliseconds.
pub fn parse_timestamp(value: &str) -> Result<i64, TimestampError> {
    let value = value.trim();
    match value.strip_suffix('Z') {
        Some(body) => Ok(parse_compact(body)?.and_utc().timestamp_millis()),
        None => {
            let naive = parse_compact(value)?;
            Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|local| local.timestamp_millis())
                .ok_or(TimestampError::NonexistentLocalTime(naive))
        }
    }
}

fn parse_compact(body: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(body, COMPACT_FORMATS[0])
        .or_else(|_| NaiveDateTime::parse_from_str(body, COMPACT_FORMATS[1]))
}

/// Render epoch milliseconds in the UTC attribute form.
pub fn format_timestamp(millis: i64) -> Result<String, TimestampError> {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|at| at.format(UTC_FORMAT).to_string())
        .ok_or(TimestampError::OutOfRange(millis))
}
