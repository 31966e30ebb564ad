//! Time parser for the time-range query arguments.
//!
//! All results are local wall-clock times, matching the timestamps written
//! to the audit log. Supported formats:
//! - Log format: `2026-02-07 17:00:00` (seconds optional, fraction allowed)
//! - ISO 8601: `2026-02-07T17:00:00`
//! - Date only: `2026-02-07` (midnight)
//! - Unix timestamp: `1738944000`
//! - Relative: `-1h`, `-30m`, `-2d`, `-1w`, `-90s`, `now`
//! - Time only (current day): `07:00`

use chrono::{Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use thiserror::Error;

/// Error type for time parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to parse time '{input}': {message}")]
pub struct TimeParseError {
    pub input: String,
    pub message: String,
}

const UNRECOGNIZED: &str = "unrecognized format. Use: 2026-02-07 17:00:00, \
                            ISO 8601 (2026-02-07T17:00:00), date (2026-02-07), \
                            Unix timestamp (1738944000), relative (-1h, -30m, -2d) \
                            or time only (07:00)";

/// Parses a time expression relative to the current local time.
///
/// ```
/// use hostfetch::util::parse_time;
///
/// let start = parse_time("2026-02-07 17:00:00").unwrap();
/// assert_eq!(start.to_string(), "2026-02-07 17:00:00");
///
/// let hour_ago = parse_time("-1h").unwrap();
/// assert!(hour_ago < parse_time("now").unwrap());
/// ```
pub fn parse_time(input: &str) -> Result<NaiveDateTime, TimeParseError> {
    parse_time_with_base(input, Local::now().naive_local())
}

/// Parses a time expression using `base` as "now".
///
/// Relative offsets are applied to `base`; time-only input is taken on the
/// day of `base`.
pub fn parse_time_with_base(
    input: &str,
    base: NaiveDateTime,
) -> Result<NaiveDateTime, TimeParseError> {
    let input = input.trim();

    if input.eq_ignore_ascii_case("now") {
        return Ok(base);
    }

    if let Some(delta) = try_parse_relative(input) {
        return base.checked_add_signed(delta).ok_or(TimeParseError {
            input: input.to_string(),
            message: "relative time overflow".to_string(),
        });
    }

    if let Some(ts) = try_parse_unix_timestamp(input) {
        return Ok(ts);
    }

    if let Some(ts) = try_parse_datetime(input) {
        return Ok(ts);
    }

    if let Some(ts) = try_parse_date_only(input) {
        return Ok(ts);
    }

    if let Some(ts) = try_parse_time_only(input, base) {
        return Ok(ts);
    }

    Err(TimeParseError {
        input: input.to_string(),
        message: UNRECOGNIZED.to_string(),
    })
}

/// Plain integer: seconds since epoch, converted to local time.
fn try_parse_unix_timestamp(input: &str) -> Option<NaiveDateTime> {
    if input.is_empty() || !input.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let secs: i64 = input.parse().ok()?;
    Local
        .timestamp_opt(secs, 0)
        .single()
        .map(|dt| dt.naive_local())
}

/// `-<number><unit>` with unit one of s, m, h, d, w.
fn try_parse_relative(input: &str) -> Option<Duration> {
    let rest = input.strip_prefix('-')?;
    let unit = rest.chars().last()?;
    let number_str = &rest[..rest.len() - unit.len_utf8()];
    if number_str.is_empty() || !number_str.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let number: i64 = number_str.parse().ok()?;

    let delta = match unit {
        's' => Duration::try_seconds(number)?,
        'm' => Duration::try_minutes(number)?,
        'h' => Duration::try_hours(number)?,
        'd' => Duration::try_days(number)?,
        'w' => Duration::try_weeks(number)?,
        _ => return None,
    };
    Some(-delta)
}

fn try_parse_datetime(input: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];

    // Accept the audit log's own comma-separated fraction as well.
    let normalized = input.replacen(',', ".", 1);
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&normalized, fmt).ok())
}

fn try_parse_date_only(input: &str) -> Option<NaiveDateTime> {
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn try_parse_time_only(input: &str, base: NaiveDateTime) -> Option<NaiveDateTime> {
    let time = NaiveTime::parse_from_str(input, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(input, "%H:%M"))
        .ok()?;
    Some(base.date().and_time(time))
}
