//! Audit log entries and their on-disk line format.
//!
//! One entry per line:
//!
//! ```text
//! 2026-10-18 14:03:07,123456 INFO:cycle completed
//! ```
//!
//! The query engine depends on this exact layout, so `to_line` and
//! `parse_line` must stay in lockstep. Lines written with millisecond
//! precision (`,123`) are accepted on read as well.

use std::fmt;
use std::str::FromStr;

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// chrono format used when writing timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%6f";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEBUG" => Ok(Level::Debug),
            "INFO" => Ok(Level::Info),
            "WARNING" => Ok(Level::Warning),
            "ERROR" => Ok(Level::Error),
            "CRITICAL" => Ok(Level::Critical),
            other => Err(format!("unknown level '{}'", other)),
        }
    }
}

/// A timestamped, leveled message in the audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: NaiveDateTime,
    pub level: Level,
    pub message: String,
}

impl LogEntry {
    /// Creates an entry stamped with the current local time.
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self::at(Local::now().naive_local(), level, message)
    }

    /// Creates an entry with an explicit timestamp.
    ///
    /// The timestamp is truncated to microseconds, the precision of the
    /// line format, so that an entry reads back exactly as it was built.
    pub fn at(timestamp: NaiveDateTime, level: Level, message: impl Into<String>) -> Self {
        Self {
            timestamp: truncate_to_micros(timestamp),
            level,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Level::Info, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Level::Error, message)
    }

    /// Serializes the entry as one log line, without the trailing newline.
    ///
    /// Newlines inside the message are escaped so the entry never spans
    /// more than one line.
    pub fn to_line(&self) -> String {
        format!(
            "{} {}:{}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.level,
            escape(&self.message)
        )
    }

    /// Parses a log line. Returns `None` for anything that does not follow
    /// the `date time,fraction LEVEL:message` layout.
    pub fn parse_line(line: &str) -> Option<LogEntry> {
        let line = line.trim_end_matches(['\n', '\r']);
        let mut parts = line.splitn(3, ' ');
        let date = parts.next()?;
        let time = parts.next()?;
        let rest = parts.next()?;

        let timestamp = parse_timestamp(date, time)?;
        let (level, message) = rest.split_once(':')?;
        let level = level.parse::<Level>().ok()?;

        Some(LogEntry {
            timestamp,
            level,
            message: unescape(message),
        })
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}

fn truncate_to_micros(ts: NaiveDateTime) -> NaiveDateTime {
    let nanos = ts.nanosecond() / 1_000 * 1_000;
    ts.with_nanosecond(nanos).unwrap_or(ts)
}

fn parse_timestamp(date: &str, time: &str) -> Option<NaiveDateTime> {
    let (clock, fraction) = time.split_once(',')?;
    if fraction.is_empty() || fraction.len() > 9 || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }

    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    let clock = NaiveTime::parse_from_str(clock, "%H:%M:%S").ok()?;
    // Right-pad to nanoseconds: ",5" is half a second, not 5ns.
    let nanos: u32 = format!("{:0<9}", fraction).parse().ok()?;

    date.and_time(clock).with_nanosecond(nanos)
}

fn escape(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    for c in message.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

fn unescape(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    let mut chars = message.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
