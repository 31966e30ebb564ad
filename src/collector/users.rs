//! User accounts and their last login.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::collector::resource::{Lookup, ResourceCollector};
use crate::collector::traits::{CommandRunner, FileSystem};
use crate::error::CollectError;
use crate::storage::model::{Record, ResourceKind, UserRecord};

pub(crate) const LASTLOG: &str = "lastlog";
const NEVER_LOGGED_IN: &str = "**Never logged in**";

/// Collects accounts from the passwd database, with last login times from
/// `lastlog`.
pub struct UserCollector<F: FileSystem> {
    fs: F,
    passwd_path: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl<F: FileSystem> UserCollector<F> {
    pub fn new(fs: F, passwd_path: impl Into<PathBuf>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            fs,
            passwd_path: passwd_path.into(),
            runner,
        }
    }

    fn usernames(&self) -> Result<Vec<String>, CollectError> {
        let content = self
            .fs
            .read_to_string(&self.passwd_path)
            .map_err(|e| CollectError::Unavailable {
                kind: ResourceKind::Users,
                reason: format!("cannot read {}: {}", self.passwd_path.display(), e),
            })?;
        Ok(parse_passwd(&content))
    }

    /// Last login of `username`; `None` when the account never logged in
    /// or `lastlog` cannot tell.
    fn last_login(&self, username: &str) -> Option<String> {
        let out = match self.runner.run(LASTLOG, &["-u", username]) {
            Ok(out) if out.success => out,
            Ok(out) => {
                debug!(username, code = ?out.code, "lastlog failed");
                return None;
            }
            Err(e) => {
                debug!(username, error = %e, "lastlog unavailable");
                return None;
            }
        };
        parse_lastlog(&out.stdout, username)
    }

    fn record(&self, username: String) -> UserRecord {
        let last_login = self.last_login(&username);
        UserRecord {
            username,
            last_login,
        }
    }
}

impl<F: FileSystem> ResourceCollector for UserCollector<F> {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Users
    }

    fn list(&self) -> Result<Vec<Record>, CollectError> {
        Ok(self
            .usernames()?
            .into_iter()
            .map(|name| Record::User(self.record(name)))
            .collect())
    }

    fn detail(&self, username: &str) -> Result<Lookup, CollectError> {
        let username = username.trim();
        if !self.usernames()?.iter().any(|u| u == username) {
            return Ok(Lookup::NotFound);
        }
        Ok(Lookup::Found(Record::User(self.record(username.to_string()))))
    }
}

/// Account names in file order.
fn parse_passwd(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter_map(|l| l.split(':').next())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Extracts the login columns (port, origin, time) from `lastlog -u` output.
fn parse_lastlog(stdout: &str, username: &str) -> Option<String> {
    let line = stdout
        .lines()
        .filter(|l| !l.trim().is_empty())
        .find(|l| !l.starts_with("Username"))?;

    let rest = line.trim().strip_prefix(username).unwrap_or(line).trim();
    if rest.is_empty() || rest.contains(NEVER_LOGGED_IN) {
        return None;
    }
    Some(rest.split_whitespace().collect::<Vec<_>>().join(" "))
}
