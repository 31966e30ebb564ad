//! Error types shared across the crate.
//!
//! Failures are kept local wherever possible: a `CollectError` only ever
//! empties one resource kind of a snapshot, and a `StoreError` during a
//! monitoring cycle is logged and the loop moves on. Only configuration
//! problems detected at startup are fatal.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::storage::model::ResourceKind;
use crate::util::TimeParseError;

/// Failure of a single resource collector.
#[derive(Debug, Error)]
pub enum CollectError {
    /// The resource cannot be queried at all on this host.
    #[error("{kind} collector unavailable: {reason}")]
    Unavailable { kind: ResourceKind, reason: String },

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An external command ran but reported failure.
    #[error("`{program}` failed: {reason}")]
    Command { program: String, reason: String },

    #[error("`{program}` did not finish within {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid {kind} identifier '{identifier}'")]
    InvalidIdentifier {
        kind: ResourceKind,
        identifier: String,
    },
}

impl CollectError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        CollectError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failure to open, rotate or append to the audit log store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot access log store at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid log store configuration: {0}")]
    InvalidConfig(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Top-level error for operations exposed to the command line.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Collect(#[from] CollectError),

    #[error(transparent)]
    Time(#[from] TimeParseError),

    #[error("invalid time range: start {start} is after end {end}")]
    InvalidRange {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    /// Writing a report to the terminal failed.
    #[error("cannot write report: {0}")]
    Output(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
