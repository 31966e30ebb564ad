//! Virtual hosts from the nginx site configuration.
//!
//! Every file in the sites directory is tokenized and its `server { }`
//! blocks are walked for `server_name` and `listen` directives. Each
//! `listen` of a block yields one record under the block's first name.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::collector::resource::{Lookup, ResourceCollector};
use crate::collector::traits::FileSystem;
use crate::error::CollectError;
use crate::storage::model::{Record, ResourceKind, VHostRecord};

/// Name reported for a server block without `server_name`.
pub const CATCH_ALL: &str = "_";
/// Port nginx listens on when a server block has no `listen`.
pub const DEFAULT_LISTEN: &str = "80";

/// One `server { }` block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct ServerBlock {
    names: Vec<String>,
    listens: Vec<String>,
}

impl ServerBlock {
    fn primary_name(&self) -> &str {
        self.names.first().map(String::as_str).unwrap_or(CATCH_ALL)
    }

    fn listens(&self) -> Vec<&str> {
        if self.listens.is_empty() {
            vec![DEFAULT_LISTEN]
        } else {
            self.listens.iter().map(String::as_str).collect()
        }
    }
}

/// Collects nginx virtual hosts.
pub struct NginxCollector<F: FileSystem> {
    fs: F,
    sites_dir: PathBuf,
}

impl<F: FileSystem> NginxCollector<F> {
    pub fn new(fs: F, sites_dir: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            sites_dir: sites_dir.into(),
        }
    }

    /// Site files with their content, in file name order.
    ///
    /// A missing sites directory makes the collector unavailable; single
    /// unreadable files (dangling links, permissions) are skipped.
    fn site_files(&self) -> Result<Vec<(PathBuf, String)>, CollectError> {
        let mut paths = self
            .fs
            .read_dir(&self.sites_dir)
            .map_err(|e| CollectError::Unavailable {
                kind: ResourceKind::VHosts,
                reason: format!("cannot read {}: {}", self.sites_dir.display(), e),
            })?;
        paths.sort();

        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            match self.fs.read_to_string(&path) {
                Ok(content) => files.push((path, content)),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable site file"),
            }
        }
        Ok(files)
    }
}

impl<F: FileSystem> ResourceCollector for NginxCollector<F> {
    fn kind(&self) -> ResourceKind {
        ResourceKind::VHosts
    }

    fn list(&self) -> Result<Vec<Record>, CollectError> {
        let mut records = Vec::new();
        for (path, content) in self.site_files()? {
            let blocks = parse_server_blocks(&content);
            debug!(path = %path.display(), blocks = blocks.len(), "parsed site file");
            for block in &blocks {
                for listen in block.listens() {
                    records.push(Record::VHost(VHostRecord {
                        domain: block.primary_name().to_string(),
                        port: listen.to_string(),
                        config: None,
                    }));
                }
            }
        }
        Ok(records)
    }

    /// Finds the first server block naming `domain` (any of its names) and
    /// returns it with the configuration text of its file.
    fn detail(&self, domain: &str) -> Result<Lookup, CollectError> {
        let domain = domain.trim();
        for (path, content) in self.site_files()? {
            let found = parse_server_blocks(&content)
                .into_iter()
                .find(|b| b.names.iter().any(|n| n == domain));
            if let Some(block) = found {
                debug!(domain, path = %path.display(), "vhost found");
                return Ok(Lookup::Found(Record::VHost(VHostRecord {
                    domain: domain.to_string(),
                    port: block.listens().join(", "),
                    config: Some(config_text(&path, &content)),
                })));
            }
        }
        Ok(Lookup::NotFound)
    }
}

fn config_text(path: &Path, content: &str) -> String {
    format!("# {}\n{}", path.display(), content.trim_end())
}

/// Splits configuration text into tokens, dropping comments.
///
/// `{`, `}` and `;` are always separate tokens. Quoting is not interpreted;
/// quoted values containing those characters are rare in server blocks.
fn tokenize(content: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for line in content.lines() {
        let line = match line.find('#') {
            Some(pos) => &line[..pos],
            None => line,
        };
        let mut current = String::new();
        for c in line.chars() {
            match c {
                '{' | '}' | ';' => {
                    if !current.is_empty() {
                        tokens.push(std::mem::take(&mut current));
                    }
                    tokens.push(c.to_string());
                }
                c if c.is_whitespace() => {
                    if !current.is_empty() {
                        tokens.push(std::mem::take(&mut current));
                    }
                }
                c => current.push(c),
            }
        }
        if !current.is_empty() {
            tokens.push(current);
        }
    }
    tokens
}

fn parse_server_blocks(content: &str) -> Vec<ServerBlock> {
    let mut blocks = Vec::new();
    // Open blocks, innermost last; `Some` for server blocks.
    let mut stack: Vec<Option<ServerBlock>> = Vec::new();
    let mut directive: Vec<String> = Vec::new();

    for token in tokenize(content) {
        match token.as_str() {
            "{" => {
                let is_server = directive.first().is_some_and(|d| d == "server");
                stack.push(is_server.then(ServerBlock::default));
                directive.clear();
            }
            "}" => {
                directive.clear();
                if let Some(Some(block)) = stack.pop() {
                    blocks.push(block);
                }
            }
            ";" => {
                if let (Some(Some(block)), Some((name, args))) =
                    (stack.last_mut(), directive.split_first())
                {
                    match name.as_str() {
                        "server_name" => block.names.extend(args.iter().cloned()),
                        "listen" => block.listens.extend(args.first().cloned()),
                        _ => {}
                    }
                }
                directive.clear();
            }
            _ => directive.push(token),
        }
    }

    // Unterminated blocks still describe a host.
    blocks.extend(stack.into_iter().flatten());
    blocks
}
