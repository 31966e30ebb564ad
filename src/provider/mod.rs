//! Read access to recorded activity.
//!
//! `HistoryProvider` answers time-range queries over the audit log store.
//! It only reads; the store is written by `storage::AuditLogWriter`.

mod history;

pub use history::{HistoryProvider, LogEntries, TimeRange};
