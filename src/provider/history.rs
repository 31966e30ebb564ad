//! Time-range queries over the audit log store.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;

use chrono::{Duration, NaiveDateTime};
use tracing::{debug, warn};

use crate::error::Error;
use crate::storage::model::LogEntry;
use crate::storage::store::AuditLogStore;

/// Closed time interval, both bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl TimeRange {
    /// Returns `Error::InvalidRange` when `start` is after `end`.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self, Error> {
        if start > end {
            return Err(Error::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// The window of the given length ending at `now`.
    pub fn last(window: Duration, now: NaiveDateTime) -> Self {
        let window = window.abs();
        let start = now.checked_sub_signed(window).unwrap_or(NaiveDateTime::MIN);
        Self { start, end: now }
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn contains(&self, ts: &NaiveDateTime) -> bool {
        self.start <= *ts && *ts <= self.end
    }
}

/// Read-only access to the entries recorded in an audit log store.
///
/// Each query rescans the store from the oldest rotated file to the active
/// one; there is no cursor kept between queries.
pub struct HistoryProvider {
    store: AuditLogStore,
}

impl HistoryProvider {
    pub fn new(store: AuditLogStore) -> Self {
        Self { store }
    }

    /// Entries whose timestamp lies within `range`, oldest first.
    pub fn query(&self, range: TimeRange) -> LogEntries {
        LogEntries::new(self.store.clone(), Some(range))
    }

    /// Every parseable entry in the store, oldest first.
    pub fn entries(&self) -> LogEntries {
        LogEntries::new(self.store.clone(), None)
    }
}

/// Lazy scan over the store's files.
///
/// Files are opened one at a time as the iterator advances. Lines that do
/// not parse are skipped and counted; a file that disappears between
/// listing and opening (rotated away, evicted) is skipped.
pub struct LogEntries {
    store: AuditLogStore,
    range: Option<TimeRange>,
    pending: VecDeque<PathBuf>,
    current: Option<(PathBuf, BufReader<File>)>,
    line: String,
    scanned: usize,
    skipped: usize,
}

impl LogEntries {
    fn new(store: AuditLogStore, range: Option<TimeRange>) -> Self {
        let pending = {
            let _guard = store.read_lock();
            store.files_oldest_first().into()
        };
        Self {
            store,
            range,
            pending,
            current: None,
            line: String::new(),
            scanned: 0,
            skipped: 0,
        }
    }

    /// Number of lines read so far.
    pub fn scanned(&self) -> usize {
        self.scanned
    }

    /// Number of lines skipped because they did not parse.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn open_next(&mut self) -> bool {
        while let Some(path) = self.pending.pop_front() {
            match File::open(&path) {
                Ok(file) => {
                    debug!(path = %path.display(), "scanning audit log file");
                    self.current = Some((path, BufReader::new(file)));
                    return true;
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "cannot open audit log file");
                }
            }
        }
        false
    }
}

impl Iterator for LogEntries {
    type Item = LogEntry;

    fn next(&mut self) -> Option<LogEntry> {
        loop {
            if self.current.is_none() && !self.open_next() {
                return None;
            }

            self.line.clear();
            let read = {
                let _guard = self.store.read_lock();
                match self.current.as_mut() {
                    Some((_, reader)) => reader.read_line(&mut self.line),
                    None => continue,
                }
            };

            match read {
                Ok(0) => {
                    self.current = None;
                    continue;
                }
                Ok(_) => {}
                Err(e) => {
                    if let Some((path, _)) = self.current.take() {
                        warn!(path = %path.display(), error = %e, "error reading audit log file");
                    }
                    continue;
                }
            }

            self.scanned += 1;
            let Some(entry) = LogEntry::parse_line(&self.line) else {
                self.skipped += 1;
                continue;
            };

            match self.range {
                Some(range) if !range.contains(&entry.timestamp) => continue,
                _ => return Some(entry),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::model::Level;
    use crate::storage::store::RotationConfig;
    use crate::storage::writer::AuditLogWriter;
    use std::io::Write;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use tempfile::tempdir;

    fn base_time() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2026-02-07 17:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn at(secs: i64) -> NaiveDateTime {
        base_time() + Duration::seconds(secs)
    }

    fn entry(secs: i64, level: Level, message: &str) -> LogEntry {
        LogEntry::at(at(secs), level, message)
    }

    fn seeded_store(dir: &std::path::Path, config: RotationConfig) -> AuditLogStore {
        let store = AuditLogStore::open(dir.join("audit.log"), config).unwrap();
        let mut writer = AuditLogWriter::new(store.clone());
        for i in 0..10 {
            writer
                .append(&[entry(i * 10, Level::Info, &format!("event {}", i))])
                .unwrap();
        }
        store
    }

    #[test]
    fn test_time_range_rejects_inverted_bounds() {
        let err = TimeRange::new(at(10), at(0)).unwrap_err();
        assert!(matches!(err, Error::InvalidRange { .. }));
        assert!(TimeRange::new(at(5), at(5)).is_ok());
    }

    #[test]
    fn test_time_range_bounds_are_inclusive() {
        let range = TimeRange::new(at(10), at(20)).unwrap();
        assert!(range.contains(&at(10)));
        assert!(range.contains(&at(20)));
        assert!(!range.contains(&(at(10) - Duration::microseconds(1))));
        assert!(!range.contains(&(at(20) + Duration::microseconds(1))));
    }

    #[test]
    fn test_last_window_ends_now() {
        let range = TimeRange::last(Duration::seconds(60), at(60));
        assert_eq!(range.start(), at(0));
        assert_eq!(range.end(), at(60));
    }

    #[test]
    fn test_query_returns_only_entries_in_range() {
        let dir = tempdir().unwrap();
        let store = seeded_store(dir.path(), RotationConfig::default());
        let history = HistoryProvider::new(store);

        let range = TimeRange::new(at(20), at(50)).unwrap();
        let messages: Vec<String> = history.query(range).map(|e| e.message).collect();
        assert_eq!(messages, vec!["event 2", "event 3", "event 4", "event 5"]);

        for e in history.query(range) {
            assert!(range.start() <= e.timestamp && e.timestamp <= range.end());
        }
    }

    #[test]
    fn test_query_spans_rotated_files_in_order() {
        let dir = tempdir().unwrap();
        // Small files force several rotations while seeding.
        let store = seeded_store(dir.path(), RotationConfig::new(120, 20));
        assert!(!store.rotated_indexes().is_empty());

        let history = HistoryProvider::new(store);
        let all: Vec<LogEntry> = history.entries().collect();
        assert_eq!(all.len(), 10);
        assert!(all.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(all[0].message, "event 0");
        assert_eq!(all[9].message, "event 9");
    }

    #[test]
    fn test_round_trip_returns_exact_entry() {
        let dir = tempdir().unwrap();
        let store = AuditLogStore::open(dir.path().join("audit.log"), RotationConfig::default())
            .unwrap();
        let mut writer = AuditLogWriter::new(store.clone());
        let written = LogEntry::new(Level::Warning, "vhost example.com has no listen directive");
        writer.append(std::slice::from_ref(&written)).unwrap();

        let range = TimeRange::last(Duration::seconds(60), written.timestamp);
        let found: Vec<LogEntry> = HistoryProvider::new(store).query(range).collect();
        assert_eq!(found, vec![written]);
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let dir = tempdir().unwrap();
        let store = seeded_store(dir.path(), RotationConfig::default());
        {
            let mut file = std::fs::OpenOptions::new()
                .append(true)
                .open(store.path())
                .unwrap();
            writeln!(file, "this is not a log line").unwrap();
            writeln!(file, "2026-02-07 17:00:30 INFO:missing fraction").unwrap();
            write!(file, "2026-02-07 17:0").unwrap(); // truncated write
        }

        let mut entries = HistoryProvider::new(store).entries();
        let collected: Vec<LogEntry> = entries.by_ref().collect();
        assert_eq!(collected.len(), 10);
        assert!(collected.iter().all(|e| e.message.starts_with("event")));
        assert_eq!(entries.skipped(), 3);
        assert_eq!(entries.scanned(), 13);
    }

    #[test]
    fn test_only_garbage_yields_empty_result() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.log");
        std::fs::write(&path, "foo\nbar\n\n").unwrap();
        let store = AuditLogStore::new(&path, RotationConfig::default()).unwrap();

        let range = TimeRange::new(NaiveDateTime::MIN, NaiveDateTime::MAX).unwrap();
        assert_eq!(HistoryProvider::new(store).query(range).count(), 0);
    }

    #[test]
    fn test_missing_store_yields_nothing() {
        let dir = tempdir().unwrap();
        let store =
            AuditLogStore::new(dir.path().join("absent.log"), RotationConfig::default()).unwrap();
        assert_eq!(HistoryProvider::new(store).entries().count(), 0);
    }

    #[test]
    fn test_query_is_restartable_and_read_only() {
        let dir = tempdir().unwrap();
        let store = seeded_store(dir.path(), RotationConfig::default());
        let before = std::fs::read(store.path()).unwrap();

        let history = HistoryProvider::new(store.clone());
        let range = TimeRange::new(at(0), at(90)).unwrap();
        let first: Vec<LogEntry> = history.query(range).take(3).collect();
        let second: Vec<LogEntry> = history.query(range).collect();

        assert_eq!(first.len(), 3);
        assert_eq!(second.len(), 10);
        assert_eq!(first[..], second[..3]);
        assert_eq!(std::fs::read(store.path()).unwrap(), before);
    }

    #[test]
    fn test_scans_during_appends_and_rotations_see_whole_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.log");
        // A handful of lines per file, so the writer rotates constantly.
        let store = AuditLogStore::open(&path, RotationConfig::new(256, 1000)).unwrap();
        let total = 600;
        let finished = AtomicBool::new(false);

        thread::scope(|s| {
            let writer_store = store.clone();
            let finished = &finished;
            s.spawn(move || {
                let mut writer = AuditLogWriter::new(writer_store);
                for i in 0..total {
                    writer
                        .append(&[LogEntry::info(format!("entry {}", i))])
                        .unwrap();
                }
                finished.store(true, Ordering::SeqCst);
            });

            let provider = HistoryProvider::new(store.clone());
            loop {
                let done = finished.load(Ordering::SeqCst);
                let mut entries = provider.entries();
                let timestamps: Vec<NaiveDateTime> =
                    entries.by_ref().map(|e| e.timestamp).collect();
                assert_eq!(entries.skipped(), 0);
                assert!(timestamps.windows(2).all(|w| w[0] <= w[1]));
                if done {
                    break;
                }
            }
        });

        let mut entries = HistoryProvider::new(store).entries();
        assert_eq!(entries.by_ref().count(), total);
        assert_eq!(entries.skipped(), 0);
    }
}
