//! In-memory filesystem for testing collectors without a real host.

use crate::collector::traits::FileSystem;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};

/// In-memory filesystem for testing.
///
/// Holds files, directories and symbolic links, enough to simulate
/// `/proc/net/*`, per-process fd tables, `/etc/passwd` and nginx sites.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    /// Map from path to file contents.
    files: HashMap<PathBuf, String>,
    /// Set of directories (for read_dir support).
    directories: HashSet<PathBuf>,
    /// Map from link path to link target.
    links: HashMap<PathBuf, PathBuf>,
}

impl MockFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file with the given content.
    ///
    /// Parent directories are automatically created.
    pub fn add_file(&mut self, path: impl AsRef<Path>, content: impl Into<String>) {
        let path = path.as_ref().to_path_buf();
        self.add_parents(&path);
        self.files.insert(path, content.into());
    }

    /// Adds an empty directory.
    pub fn add_dir(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        self.add_parents(&path);
        self.directories.insert(path);
    }

    /// Adds a symbolic link pointing at `target`.
    pub fn add_link(&mut self, path: impl AsRef<Path>, target: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        self.add_parents(&path);
        self.links.insert(path, target.as_ref().to_path_buf());
    }

    /// Adds a process holding the given socket inodes as open descriptors.
    ///
    /// Descriptors are numbered from 3, after stdin/stdout/stderr.
    pub fn add_process_sockets(&mut self, pid: u32, inodes: &[u64]) {
        let fd_dir = PathBuf::from(format!("/proc/{}/fd", pid));
        self.add_dir(&fd_dir);
        self.add_link(fd_dir.join("0"), "/dev/null");
        for (i, inode) in inodes.iter().enumerate() {
            self.add_link(fd_dir.join((i + 3).to_string()), format!("socket:[{}]", inode));
        }
    }

    /// Removes a file, link or directory entry.
    pub fn remove(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        self.files.remove(path);
        self.links.remove(path);
        self.directories.remove(path);
    }

    fn add_parents(&mut self, path: &Path) {
        let mut parent = path.parent();
        while let Some(p) = parent {
            if !p.as_os_str().is_empty() {
                self.directories.insert(p.to_path_buf());
            }
            parent = p.parent();
        }
    }
}

fn not_found(what: &str, path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{} not found: {:?}", what, path),
    )
}

impl FileSystem for MockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| not_found("file", path))
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
            || self.directories.contains(path)
            || self.links.contains_key(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        if !self.directories.contains(path) {
            return Err(not_found("directory", path));
        }

        let children = self
            .files
            .keys()
            .chain(self.links.keys())
            .chain(self.directories.iter().filter(|d| d.as_path() != path))
            .filter(|p| p.parent().is_some_and(|parent| parent == path))
            .cloned()
            .collect::<HashSet<_>>();

        Ok(children.into_iter().collect())
    }

    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        match self.links.get(path) {
            Some(target) => Ok(target.clone()),
            None if self.exists(path) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a symbolic link: {:?}", path),
            )),
            None => Err(not_found("link", path)),
        }
    }
}
