//! Runtime configuration.
//!
//! The binary fills a [`Config`] from command-line flags, each of which
//! falls back to a `HOSTFETCH_*` environment variable and then to the
//! defaults below.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::StoreError;
use crate::storage::store::RotationConfig;

pub const DEFAULT_LOG_FILE: &str = "/var/log/hostfetch.log";
pub const DEFAULT_MAX_BYTES: u64 = 1_000_000;
pub const DEFAULT_MAX_BACKUPS: usize = 5;
pub const DEFAULT_NGINX_DIR: &str = "/etc/nginx/sites-enabled";
pub const DEFAULT_PROC_PATH: &str = "/proc";
pub const DEFAULT_PASSWD_PATH: &str = "/etc/passwd";
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Active audit log file; rotated files sit next to it.
    pub log_file: PathBuf,
    /// Size limit of the active audit log file.
    pub max_bytes: u64,
    /// Number of rotated files kept.
    pub max_backups: usize,
    pub nginx_dir: PathBuf,
    pub proc_path: PathBuf,
    pub passwd_path: PathBuf,
    /// Pause between monitoring cycles. Zero runs cycles back to back.
    pub interval: Duration,
    /// Limit for each external command (`docker`, `lastlog`).
    pub command_timeout: Duration,
    /// Run collectors of one cycle concurrently.
    pub parallel: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            max_bytes: DEFAULT_MAX_BYTES,
            max_backups: DEFAULT_MAX_BACKUPS,
            nginx_dir: PathBuf::from(DEFAULT_NGINX_DIR),
            proc_path: PathBuf::from(DEFAULT_PROC_PATH),
            passwd_path: PathBuf::from(DEFAULT_PASSWD_PATH),
            interval: Duration::ZERO,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            parallel: false,
        }
    }
}

impl Config {
    pub fn rotation(&self) -> RotationConfig {
        RotationConfig::new(self.max_bytes, self.max_backups)
    }

    /// Checks settings that would make the store unusable.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.log_file.as_os_str().is_empty() {
            return Err(StoreError::InvalidConfig("log file path is empty".to_string()));
        }
        if self.command_timeout.is_zero() {
            return Err(StoreError::InvalidConfig(
                "command timeout must be positive".to_string(),
            ));
        }
        self.rotation().validate()
    }
}

/// Parses a human-readable size string (e.g., "1G", "500M", "1024K") into bytes.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty size string".to_string());
    }

    let (num_str, multiplier) = if let Some(num) = s.strip_suffix(['G', 'g']) {
        (num, 1024 * 1024 * 1024)
    } else if let Some(num) = s.strip_suffix(['M', 'm']) {
        (num, 1024 * 1024)
    } else if let Some(num) = s.strip_suffix(['K', 'k']) {
        (num, 1024)
    } else {
        (s, 1)
    };

    let n = num_str
        .trim()
        .parse::<u64>()
        .map_err(|e| format!("invalid size '{}': {}", s, e))?;
    n.checked_mul(multiplier)
        .ok_or_else(|| format!("size '{}' is too large", s))
}

/// Formats bytes as human-readable size string.
pub fn format_size(bytes: u64) -> String {
    const GB: u64 = 1024 * 1024 * 1024;
    const MB: u64 = 1024 * 1024;
    const KB: u64 = 1024;

    if bytes >= GB {
        format!("{:.1}G", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1}M", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1}K", bytes as f64 / KB as f64)
    } else {
        format!("{}B", bytes)
    }
}

/// Parses a duration such as "500ms", "10s", "2m", "1h". A bare number is
/// taken as seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let invalid = |e: std::num::ParseIntError| format!("invalid duration '{}': {}", s, e);

    if let Some(ms) = s.strip_suffix("ms") {
        return ms.trim().parse().map(Duration::from_millis).map_err(invalid);
    }

    let (num_str, unit) = match s.char_indices().last() {
        Some((i, c)) if c.is_ascii_alphabetic() => (&s[..i], c),
        _ => (s, 's'),
    };
    let n: u64 = num_str.trim().parse().map_err(invalid)?;
    let secs = match unit {
        's' => Some(n),
        'm' => n.checked_mul(60),
        'h' => n.checked_mul(3600),
        other => return Err(format!("invalid duration '{}': unknown unit '{}'", s, other)),
    };
    secs.map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{}' is too large", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.log_file, PathBuf::from("/var/log/hostfetch.log"));
        assert_eq!(config.max_bytes, 1_000_000);
        assert_eq!(config.max_backups, 5);
        assert_eq!(config.interval, Duration::ZERO);
        assert!(config.validate().is_ok());
        assert_eq!(config.rotation(), RotationConfig::default());
    }

    #[test]
    fn test_validate_rejects_zero_max_bytes() {
        let config = Config {
            max_bytes: 0,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(StoreError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_path() {
        let config = Config {
            log_file: PathBuf::new(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1024").unwrap(), 1024);
        assert_eq!(parse_size("1K").unwrap(), 1024);
        assert_eq!(parse_size("500M").unwrap(), 500 * 1024 * 1024);
        assert_eq!(parse_size("1g").unwrap(), 1024 * 1024 * 1024);
        assert!(parse_size("").is_err());
        assert!(parse_size("abc").is_err());
        assert!(parse_size("99999999999999G").is_err());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512B");
        assert_eq!(format_size(1024), "1.0K");
        assert_eq!(format_size(1_000_000), "976.6K");
        assert_eq!(format_size(1024 * 1024 * 1024), "1.0G");
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert!(parse_duration("5d").is_err());
        assert!(parse_duration("soon").is_err());
    }
}
