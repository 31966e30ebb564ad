//! Data model shared by collectors, the audit log and presentation.
//!
//! - [`Record`] values are produced by collectors, one variant per resource.
//! - [`Snapshot`] groups the records of one aggregation cycle.
//! - [`LogEntry`] is the unit persisted to the audit log store.

mod entry;
mod record;
mod snapshot;

pub use entry::{Level, LogEntry, TIMESTAMP_FORMAT};
pub use record::{
    ContainerRecord, ImageRecord, PortRecord, Record, ResourceKind, UserRecord, VHostRecord,
};
pub use snapshot::{Diagnostic, Snapshot};
