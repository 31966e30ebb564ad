//! Abstractions over the host so collectors can be tested without one.
//!
//! `FileSystem` covers `/proc`, `/etc` and the nginx site directory;
//! `CommandRunner` covers the external tools (`docker`, `lastlog`).

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::CollectError;

/// Abstraction for filesystem operations.
pub trait FileSystem: Send + Sync {
    /// Reads the entire contents of a file as a string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Checks if a path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Lists entries in a directory.
    ///
    /// Order is unspecified; callers sort when it matters.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    /// Reads the target of a symbolic link.
    ///
    /// Used for `/proc/<pid>/fd/*`, whose targets look like `socket:[12345]`.
    fn read_link(&self, path: &Path) -> io::Result<PathBuf>;
}

/// Real filesystem implementation that delegates to `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for RealFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(path)?;
        let mut paths = Vec::new();
        for entry in entries {
            paths.push(entry?.path());
        }
        Ok(paths)
    }

    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        std::fs::read_link(path)
    }
}

/// Captured result of an external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Successful output with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with the given exit code and stderr.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Abstraction for running external programs.
pub trait CommandRunner: Send + Sync {
    /// Runs `program` with `args` and captures its output.
    ///
    /// A non-zero exit is not an error at this level: it is returned in
    /// [`CommandOutput::success`]. Errors mean the program could not be
    /// started or did not finish in time.
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, CollectError>;
}

/// Runs commands on the host, killing any that outlive `timeout`.
#[derive(Debug, Clone, Copy)]
pub struct RealRunner {
    timeout: Duration,
}

impl RealRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for RealRunner {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

const POLL_INTERVAL: Duration = Duration::from_millis(10);

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

impl CommandRunner for RealRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, CollectError> {
        debug!(program, ?args, "running command");
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CollectError::Command {
                program: program.to_string(),
                reason: format!("cannot start: {}", e),
            })?;

        // Pipes are drained on their own threads so a chatty child cannot
        // block on a full pipe while we poll for exit.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(CollectError::Timeout {
                        program: program.to_string(),
                        timeout: self.timeout,
                    });
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    let _ = child.kill();
                    return Err(CollectError::Command {
                        program: program.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        };

        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();

        Ok(CommandOutput {
            success: status.success(),
            code: status.code(),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }
}
