use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, warn};

use crate::error::StoreError;
use crate::storage::model::LogEntry;

/// Size limits for the rotating audit log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationConfig {
    /// Maximum size of the active file in bytes. Default: 1MB.
    pub max_bytes: u64,
    /// Number of rotated files kept next to the active one. Default: 5.
    pub max_backups: usize,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            max_bytes: 1_000_000,
            max_backups: 5,
        }
    }
}

impl RotationConfig {
    pub fn new(max_bytes: u64, max_backups: usize) -> Self {
        Self {
            max_bytes,
            max_backups,
        }
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        if self.max_bytes == 0 {
            return Err(StoreError::InvalidConfig(
                "max_bytes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Result of a rotation.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RotationResult {
    /// Rotated files renamed one slot further (`.1` to `.2`, ...).
    pub files_shifted: usize,
    /// Rotated files deleted because they fell beyond `max_backups`.
    pub files_evicted: usize,
    /// Size of the active file that was rotated away.
    pub bytes_rotated: u64,
}

struct StoreInner {
    path: PathBuf,
    config: RotationConfig,
    /// Held for writing around size-check/rotate/append, for reading per
    /// line scanned, so readers never see half a line.
    lock: RwLock<()>,
}

/// Location and limits of the rotating audit log.
///
/// The active file lives at `path`; rotated files are `path.1` (newest)
/// through `path.N` (oldest). Cloning is cheap and clones share the lock.
#[derive(Clone)]
pub struct AuditLogStore {
    inner: Arc<StoreInner>,
}

impl std::fmt::Debug for AuditLogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLogStore")
            .field("path", &self.inner.path)
            .field("config", &self.inner.config)
            .finish()
    }
}

impl AuditLogStore {
    /// Describes a store without touching the filesystem.
    ///
    /// Enough for querying: missing files simply yield no entries.
    pub fn new(path: impl Into<PathBuf>, config: RotationConfig) -> Result<Self, StoreError> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(StoreInner {
                path: path.into(),
                config,
                lock: RwLock::new(()),
            }),
        })
    }

    /// Opens the store for writing.
    ///
    /// Creates the parent directory and the active file, so an unwritable
    /// location is reported here, before any work begins.
    pub fn open(path: impl Into<PathBuf>, config: RotationConfig) -> Result<Self, StoreError> {
        let store = Self::new(path, config)?;
        let path = store.path();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| StoreError::io(path, e))?;

        debug!(path = %path.display(), "audit log store opened");
        Ok(store)
    }

    /// Path of the active file.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn config(&self) -> &RotationConfig {
        &self.inner.config
    }

    /// Path of the rotated file with the given index (1 = newest).
    pub fn rotated_path(&self, index: usize) -> PathBuf {
        let mut name = self.inner.path.as_os_str().to_owned();
        name.push(format!(".{}", index));
        PathBuf::from(name)
    }

    /// Indexes of rotated files present on disk, ascending.
    ///
    /// Looks at the directory rather than assuming `1..=max_backups`, so a
    /// set left behind by an interrupted rotation or a larger former
    /// `max_backups` is still found.
    pub fn rotated_indexes(&self) -> Vec<usize> {
        let Some(file_name) = self.inner.path.file_name().and_then(|n| n.to_str()) else {
            return Vec::new();
        };
        let dir = match self.inner.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let prefix = format!("{}.", file_name);

        let Ok(entries) = fs::read_dir(&dir) else {
            return Vec::new();
        };

        let mut indexes: Vec<usize> = entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name();
                let suffix = name.to_str()?.strip_prefix(&prefix)?.to_string();
                if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                suffix.parse::<usize>().ok().filter(|i| *i > 0)
            })
            .collect();
        indexes.sort_unstable();
        indexes
    }

    /// All files of the store in creation order: oldest rotated file first,
    /// active file last. Only files present on disk are returned.
    pub fn files_oldest_first(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self
            .rotated_indexes()
            .into_iter()
            .rev()
            .map(|i| self.rotated_path(i))
            .collect();
        if self.inner.path.exists() {
            files.push(self.inner.path.clone());
        }
        files
    }

    /// Current size of the active file, 0 when it does not exist.
    pub fn active_size(&self) -> u64 {
        fs::metadata(&self.inner.path)
            .map(|m| m.len())
            .unwrap_or(0)
    }

    /// Last parseable entry of the store, if any.
    ///
    /// Looks at the active file first, then at rotated files newest first,
    /// so a store interrupted between rotation and the next append still
    /// reports its latest entry.
    pub fn last_entry(&self) -> Option<LogEntry> {
        let _guard = self.read_lock();
        std::iter::once(self.inner.path.clone())
            .chain(self.rotated_indexes().into_iter().map(|i| self.rotated_path(i)))
            .find_map(|path| last_entry_in(&path))
    }

    /// Whether the active file ends in the middle of a line, as left by an
    /// interrupted write.
    ///
    /// Callers must hold the write lock.
    pub(crate) fn ends_mid_line(&self) -> io::Result<bool> {
        let mut file = match File::open(&self.inner.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        };
        if file.metadata()?.len() == 0 {
            return Ok(false);
        }
        file.seek(SeekFrom::End(-1))?;
        let mut last = [0u8; 1];
        file.read_exact(&mut last)?;
        Ok(last[0] != b'\n')
    }

    /// Moves the active file into the rotated sequence.
    ///
    /// Every rotated file moves one slot up, anything that would land beyond
    /// `max_backups` is deleted, and the active file becomes `.1`. The next
    /// append creates a fresh active file. With `max_backups == 0` the
    /// active file is deleted instead of renamed.
    ///
    /// Callers must hold the write lock.
    pub(crate) fn rotate(&self) -> io::Result<RotationResult> {
        let mut result = RotationResult {
            bytes_rotated: self.active_size(),
            ..RotationResult::default()
        };
        let max_backups = self.inner.config.max_backups;

        // Highest index first so no rename overwrites a file still to move.
        for index in self.rotated_indexes().into_iter().rev() {
            let from = self.rotated_path(index);
            if index >= max_backups {
                fs::remove_file(&from)?;
                result.files_evicted += 1;
            } else {
                fs::rename(&from, self.rotated_path(index + 1))?;
                result.files_shifted += 1;
            }
        }

        let retired = if max_backups == 0 {
            fs::remove_file(&self.inner.path)
        } else {
            fs::rename(&self.inner.path, self.rotated_path(1))
        };
        match retired {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(path = %self.inner.path.display(), "active log file vanished before rotation");
            }
            Err(e) => return Err(e),
        }

        Ok(result)
    }

    pub(crate) fn read_lock(&self) -> RwLockReadGuard<'_, ()> {
        self.inner
            .lock
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write_lock(&self) -> RwLockWriteGuard<'_, ()> {
        self.inner
            .lock
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn last_entry_in(path: &Path) -> Option<LogEntry> {
    let file = File::open(path).ok()?;
    BufReader::new(file)
        .lines()
        .map_while(Result::ok)
        .filter_map(|line| LogEntry::parse_line(&line))
        .last()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::model::Level;
    use chrono::NaiveDateTime;
    use tempfile::tempdir;

    fn line_at(time: &str, message: &str) -> String {
        let ts = NaiveDateTime::parse_from_str(time, "%Y-%m-%d %H:%M:%S").unwrap();
        format!("{}\n", LogEntry::at(ts, Level::Info, message).to_line())
    }

    #[test]
    fn test_rotation_config_default() {
        let config = RotationConfig::default();
        assert_eq!(config.max_bytes, 1_000_000);
        assert_eq!(config.max_backups, 5);
    }

    #[test]
    fn test_zero_max_bytes_is_rejected() {
        let dir = tempdir().unwrap();
        let err = AuditLogStore::open(dir.path().join("audit.log"), RotationConfig::new(0, 3))
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidConfig(_)));
    }

    #[test]
    fn test_open_creates_parent_and_active_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/deeper/audit.log");
        let store = AuditLogStore::open(&path, RotationConfig::default()).unwrap();
        assert!(path.exists());
        assert_eq!(store.active_size(), 0);
        assert_eq!(store.files_oldest_first(), vec![path]);
    }

    #[test]
    fn test_open_reports_unwritable_location() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();

        let err = AuditLogStore::open(blocker.join("audit.log"), RotationConfig::default())
            .unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }

    #[test]
    fn test_rotated_indexes_ignore_foreign_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let store = AuditLogStore::open(&path, RotationConfig::default()).unwrap();

        for name in [
            "audit.log.1",
            "audit.log.3",
            "audit.log.bak",
            "audit.log.",
            "audit.log.0",
            "other.log.2",
        ] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        assert_eq!(store.rotated_indexes(), vec![1, 3]);
        assert_eq!(
            store.files_oldest_first(),
            vec![dir.path().join("audit.log.3"), dir.path().join("audit.log.1"), path]
        );
    }

    #[test]
    fn test_rotate_shifts_and_evicts() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let store = AuditLogStore::open(&path, RotationConfig::new(100, 2)).unwrap();

        std::fs::write(store.rotated_path(1), b"older").unwrap();
        std::fs::write(store.rotated_path(2), b"oldest").unwrap();
        std::fs::write(&path, b"current").unwrap();

        let result = {
            let _guard = store.write_lock();
            store.rotate().unwrap()
        };

        assert_eq!(result.files_evicted, 1);
        assert_eq!(result.files_shifted, 1);
        assert_eq!(result.bytes_rotated, 7);
        assert!(!path.exists());
        assert_eq!(std::fs::read(store.rotated_path(1)).unwrap(), b"current");
        assert_eq!(std::fs::read(store.rotated_path(2)).unwrap(), b"older");
        assert!(!store.rotated_path(3).exists());
    }

    #[test]
    fn test_rotate_without_backups_discards_active_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let store = AuditLogStore::open(&path, RotationConfig::new(100, 0)).unwrap();
        std::fs::write(&path, b"current").unwrap();

        {
            let _guard = store.write_lock();
            store.rotate().unwrap();
        }

        assert!(!path.exists());
        assert!(store.rotated_indexes().is_empty());
    }

    #[test]
    fn test_rotate_tolerates_missing_active_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let store = AuditLogStore::new(&path, RotationConfig::new(100, 3)).unwrap();
        std::fs::write(store.rotated_path(1), b"rotated").unwrap();

        {
            let _guard = store.write_lock();
            store.rotate().unwrap();
        }

        assert_eq!(store.rotated_indexes(), vec![2]);
    }

    #[test]
    fn test_last_entry_prefers_active_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let store = AuditLogStore::open(&path, RotationConfig::default()).unwrap();
        std::fs::write(store.rotated_path(1), line_at("2026-02-07 17:00:00", "rotated")).unwrap();
        std::fs::write(&path, line_at("2026-02-07 17:05:00", "active")).unwrap();

        assert_eq!(store.last_entry().unwrap().message, "active");
    }

    #[test]
    fn test_last_entry_falls_back_to_newest_rotated_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let store = AuditLogStore::new(&path, RotationConfig::default()).unwrap();
        std::fs::write(store.rotated_path(2), line_at("2026-02-07 17:00:00", "older")).unwrap();
        std::fs::write(store.rotated_path(1), line_at("2026-02-07 17:10:00", "newer")).unwrap();

        // Interrupted after rotation: no active file yet.
        assert_eq!(store.last_entry().unwrap().message, "newer");

        // An empty active file does not hide the rotated history either.
        std::fs::write(&path, b"").unwrap();
        assert_eq!(store.last_entry().unwrap().message, "newer");
    }

    #[test]
    fn test_ends_mid_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let store = AuditLogStore::new(&path, RotationConfig::default()).unwrap();
        assert!(!store.ends_mid_line().unwrap());

        std::fs::write(&path, b"").unwrap();
        assert!(!store.ends_mid_line().unwrap());

        std::fs::write(&path, line_at("2026-02-07 17:00:00", "ok")).unwrap();
        assert!(!store.ends_mid_line().unwrap());

        let mut partial = line_at("2026-02-07 17:00:00", "ok");
        partial.push_str("2026-02-07 17:0");
        std::fs::write(&path, partial).unwrap();
        assert!(store.ends_mid_line().unwrap());
    }
}
