pub mod model;
pub mod store;
pub mod writer;

pub use model::{LogEntry, Snapshot};
pub use store::{AuditLogStore, RotationConfig, RotationResult};
pub use writer::AuditLogWriter;
