use chrono::{DateTime, Local, NaiveDateTime, NaiveTime, TimeZone, Utc};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum TimeParseError {
    #[error(
        "unrecognised time '{0}', expected 'YYYY-MM-DD HH:MM', 'YYYYMMDD HHMM', 'HH:MM', 'HHMM' or epoch seconds"
    )]
    Unrecognised(String),

    #[error("'{0}' does not exist in the local time zone")]
    Nonexistent(String),
}

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M", "%Y%m%d %H%M"];

/// Formats that only name a time of day; the date is taken from "now".
const TIME_OF_DAY_FORMATS: &[&str] = &["%H:%M", "%H%M"];

/// Parse a time expression in the local time zone into epoch seconds.
pub fn parse_time(input: &str) -> Result<i64, TimeParseError> {
    parse_time_at(input, &Local::now())
}

/// Parse a time expression relative to `now`, in `now`'s time zone.
///
/// Seconds are always zero. A bare integer that matches none of the
/// calendar formats is taken as epoch seconds.
pub fn parse_time_at<Tz: TimeZone>(input: &str, now: &DateTime<Tz>) -> Result<i64, TimeParseError> {
    let input = input.trim();

    let naive = DATETIME_FORMATS
        .iter()
        .find_map(|format| {
            NaiveDateTime::parse_from_str(input, format)
                .ok()
                .map(|dt| (*format, dt))
        })
        .or_else(|| {
            TIME_OF_DAY_FORMATS.iter().find_map(|format| {
                NaiveTime::parse_from_str(input, format)
                    .ok()
                    .map(|t| (*format, now.date_naive().and_time(t)))
            })
        });

    if let Some((format, naive)) = naive {
        debug!(input, format, "Matched time expression");
        return now
            .timezone()
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.timestamp())
            .ok_or_else(|| TimeParseError::Nonexistent(input.to_string()));
    }

    input
        .parse::<i64>()
        .ok()
        .filter(|seconds| DateTime::<Utc>::from_timestamp(*seconds, 0).is_some())
        .ok_or_else(|| TimeParseError::Unrecognised(input.to_string()))
}

/// Render epoch seconds for log output.
pub fn human_time(epoch: i64) -> String {
    match DateTime::<Utc>::from_timestamp(epoch, 0) {
        Some(dt) => dt.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S %z").to_string(),
        None => epoch.to_string(),
    }
}
