use std::fs::{File, OpenOptions};
use std::path::Path;
use std::io::Write;

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::storage::model::{Level, LogEntry};
use crate::storage::store::AuditLogStore;

/// Appends entries to an [`AuditLogStore`], rotating when the active file
/// would outgrow `max_bytes`.
///
/// The writer is the only component that mutates the store. Write failures
/// are returned to the caller and never retried here.
pub struct AuditLogWriter {
    store: AuditLogStore,
    file: Option<File>,
    /// Timestamp of the last entry written, used to keep the file ordered.
    last_timestamp: Option<NaiveDateTime>,
    rotations: u64,
}

impl AuditLogWriter {
    /// Creates a writer for the store.
    ///
    /// Picks up the timestamp of the last entry already in the store so
    /// ordering holds across restarts.
    pub fn new(store: AuditLogStore) -> Self {
        let last_timestamp = store.last_entry().map(|e| e.timestamp);
        Self {
            store,
            file: None,
            last_timestamp,
            rotations: 0,
        }
    }

    pub fn store(&self) -> &AuditLogStore {
        &self.store
    }

    /// Number of rotations performed by this writer.
    pub fn rotations(&self) -> u64 {
        self.rotations
    }

    /// Appends entries in submission order.
    ///
    /// An entry stamped earlier than its predecessor is written with the
    /// predecessor's timestamp, so timestamps never decrease within the
    /// store. Returns the number of entries written.
    pub fn append(&mut self, entries: &[LogEntry]) -> Result<usize, StoreError> {
        if entries.is_empty() {
            return Ok(0);
        }

        let store = self.store.clone();
        let _guard = store.write_lock();
        let path = store.path();
        let max_bytes = store.config().max_bytes;

        // The active file may have been removed (crash mid-rotation, manual
        // cleanup); drop the stale handle and start a fresh one.
        if self.file.is_some() && !path.exists() {
            debug!(path = %path.display(), "active log file missing, reopening");
            self.file = None;
        }
        let mut size = store.active_size();

        // A write interrupted mid-line leaves the file without a trailing
        // newline; terminate it so the next entry starts on its own line.
        if self.file.is_none()
            && size > 0
            && store.ends_mid_line().map_err(|e| StoreError::io(path, e))?
        {
            let file = self.file.insert(open_active(path)?);
            file.write_all(b"\n")
                .map_err(|e| StoreError::io(path, e))?;
            size += 1;
            warn!(path = %path.display(), "terminated partial line in audit log");
        }

        for entry in entries {
            let timestamp = match self.last_timestamp {
                Some(last) if entry.timestamp < last => last,
                _ => entry.timestamp,
            };
            let mut line = LogEntry {
                timestamp,
                level: entry.level,
                message: entry.message.clone(),
            }
            .to_line();
            line.push('\n');
            let len = line.len() as u64;

            // An entry larger than max_bytes still goes into an empty file.
            if size > 0 && size + len > max_bytes {
                self.file = None;
                let result = store.rotate().map_err(|e| StoreError::io(path, e))?;
                self.rotations += 1;
                size = 0;
                info!(
                    path = %path.display(),
                    rotated_bytes = result.bytes_rotated,
                    evicted = result.files_evicted,
                    "audit log rotated"
                );
            }

            let file = match self.file.take() {
                Some(file) => file,
                None => open_active(path)?,
            };
            let file = self.file.insert(file);
            file.write_all(line.as_bytes())
                .map_err(|e| StoreError::io(path, e))?;

            size += len;
            self.last_timestamp = Some(timestamp);
        }

        if let Some(file) = self.file.as_mut() {
            file.sync_data().map_err(|e| StoreError::io(path, e))?;
        }

        Ok(entries.len())
    }

    /// Appends a single entry stamped with the current time.
    pub fn log(&mut self, level: Level, message: impl Into<String>) -> Result<(), StoreError> {
        self.append(&[LogEntry::new(level, message)]).map(|_| ())
    }

    /// Flushes and releases the active file handle.
    pub fn close(&mut self) -> Result<(), StoreError> {
        if let Some(mut file) = self.file.take() {
            let path = self.store.path();
            file.flush().map_err(|e| StoreError::io(path, e))?;
            file.sync_all().map_err(|e| StoreError::io(path, e))?;
        }
        Ok(())
    }
}

fn open_active(path: &Path) -> Result<File, StoreError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| StoreError::io(path, e))
}
