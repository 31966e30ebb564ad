//! Network connections from the kernel socket tables.
//!
//! Reads `/proc/net/{tcp,tcp6,udp,udp6}` and resolves the owning process by
//! matching each socket inode against `/proc/<pid>/fd/*` links.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::collector::resource::{Lookup, ResourceCollector};
use crate::collector::traits::FileSystem;
use crate::error::CollectError;
use crate::storage::model::{PortRecord, Record, ResourceKind};

const TABLES: [&str; 4] = ["tcp", "tcp6", "udp", "udp6"];

/// Status reported for sockets without connection state (UDP).
pub const STATUS_NONE: &str = "NONE";

/// One row of a `/proc/net/*` socket table.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SocketEntry {
    protocol: &'static str,
    local_port: u16,
    state: String,
    inode: u64,
}

/// Collects network connections.
pub struct PortCollector<F: FileSystem> {
    fs: F,
    proc_path: PathBuf,
}

impl<F: FileSystem> PortCollector<F> {
    pub fn new(fs: F, proc_path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
        }
    }

    /// Reads every socket table. Unreadable tables are skipped (IPv6 may be
    /// disabled); if none can be read the collector is unavailable.
    fn read_sockets(&self) -> Result<Vec<SocketEntry>, CollectError> {
        let mut entries = Vec::new();
        let mut readable = 0;
        let mut last_error = None;

        for table in TABLES {
            let path = self.proc_path.join("net").join(table);
            match self.fs.read_to_string(&path) {
                Ok(content) => {
                    readable += 1;
                    entries.extend(parse_socket_table(&content, table));
                }
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "socket table not readable");
                    last_error = Some(e);
                }
            }
        }

        if readable == 0 {
            let reason = last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no socket tables".to_string());
            return Err(CollectError::Unavailable {
                kind: ResourceKind::Ports,
                reason: format!(
                    "cannot read {}: {}",
                    self.proc_path.join("net").display(),
                    reason
                ),
            });
        }
        Ok(entries)
    }

    /// Maps socket inodes to the pid holding them.
    ///
    /// Processes we may not inspect (other users' fd tables) are silently
    /// skipped; their sockets end up without a pid.
    fn socket_owners(&self) -> HashMap<u64, u32> {
        let mut owners = HashMap::new();
        let entries = match self.fs.read_dir(&self.proc_path) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %self.proc_path.display(), error = %e, "cannot list processes");
                return owners;
            }
        };

        let mut pids: Vec<u32> = entries
            .iter()
            .filter_map(|p| p.file_name()?.to_str()?.parse().ok())
            .collect();
        pids.sort_unstable();

        for pid in pids {
            let fd_dir = self.proc_path.join(pid.to_string()).join("fd");
            let Ok(fds) = self.fs.read_dir(&fd_dir) else {
                continue;
            };
            for fd in fds {
                if let Some(inode) = self.socket_inode(&fd) {
                    owners.entry(inode).or_insert(pid);
                }
            }
        }
        owners
    }

    fn socket_inode(&self, fd: &Path) -> Option<u64> {
        let target = self.fs.read_link(fd).ok()?;
        parse_socket_inode(target.to_str()?)
    }

    fn records(&self) -> Result<Vec<PortRecord>, CollectError> {
        let sockets = self.read_sockets()?;
        let owners = self.socket_owners();
        Ok(sockets
            .into_iter()
            .map(|s| PortRecord {
                port: s.local_port,
                pid: owners.get(&s.inode).copied().filter(|_| s.inode != 0),
                status: s.state,
                protocol: s.protocol.to_string(),
            })
            .collect())
    }
}

impl<F: FileSystem> ResourceCollector for PortCollector<F> {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Ports
    }

    fn list(&self) -> Result<Vec<Record>, CollectError> {
        Ok(self.records()?.into_iter().map(Record::Port).collect())
    }

    /// Looks up the socket bound to a local port, preferring a listener
    /// over established or closing connections.
    fn detail(&self, identifier: &str) -> Result<Lookup, CollectError> {
        let port: u16 = identifier
            .trim()
            .parse()
            .map_err(|_| CollectError::InvalidIdentifier {
                kind: ResourceKind::Ports,
                identifier: identifier.to_string(),
            })?;

        let mut matching = self.records()?.into_iter().filter(|r| r.port == port);
        let first = matching.next();
        let listener = first
            .iter()
            .cloned()
            .chain(matching)
            .find(|r| r.status == "LISTEN");

        Ok(listener.or(first).map(Record::Port).into())
    }
}

fn parse_socket_table(content: &str, protocol: &'static str) -> Vec<SocketEntry> {
    let mut entries = Vec::new();
    for line in content.lines().skip(1) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 10 {
            continue;
        }
        let Some(local_port) = parse_port(parts[1]) else {
            continue;
        };
        let inode = parts[9].parse::<u64>().unwrap_or(0);
        let state = if protocol.starts_with("udp") {
            STATUS_NONE.to_string()
        } else {
            tcp_state_name(parts[3]).to_string()
        };

        entries.push(SocketEntry {
            protocol,
            local_port,
            state,
            inode,
        });
    }
    entries
}

/// Port half of `ADDR:PORT`, both hex.
fn parse_port(local: &str) -> Option<u16> {
    let (_, port_hex) = local.rsplit_once(':')?;
    u16::from_str_radix(port_hex, 16).ok()
}

fn tcp_state_name(hex: &str) -> &'static str {
    match hex.to_ascii_uppercase().as_str() {
        "01" => "ESTABLISHED",
        "02" => "SYN_SENT",
        "03" => "SYN_RECV",
        "04" => "FIN_WAIT1",
        "05" => "FIN_WAIT2",
        "06" => "TIME_WAIT",
        "07" => "CLOSE",
        "08" => "CLOSE_WAIT",
        "09" => "LAST_ACK",
        "0A" => "LISTEN",
        "0B" => "CLOSING",
        "0C" => "NEW_SYN_RECV",
        _ => "UNKNOWN",
    }
}

/// Inode from a `socket:[12345]` link target.
fn parse_socket_inode(link: &str) -> Option<u64> {
    link.strip_prefix("socket:[")?
        .strip_suffix(']')?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockFs;

    const TCP_HEADER: &str = "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode\n";

    fn tcp_row(sl: u32, port: u16, state: &str, inode: u64) -> String {
        format!(
            "   {}: 00000000:{:04X} 00000000:0000 {} 00000000:00000000 00:00000000 00000000  1000        0 {} 1 0000000000000000 100 0 0 10 0\n",
            sl, port, state, inode
        )
    }

    fn host_with_tcp(rows: &[String]) -> MockFs {
        let mut fs = MockFs::new();
        fs.add_file("/proc/net/tcp", format!("{}{}", TCP_HEADER, rows.concat()));
        fs
    }

    #[test]
    fn test_parse_socket_table() {
        let content = format!(
            "{}{}{}",
            TCP_HEADER,
            tcp_row(0, 8080, "0A", 5001),
            tcp_row(1, 22, "01", 5002)
        );
        let entries = parse_socket_table(&content, "tcp");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].local_port, 8080);
        assert_eq!(entries[0].state, "LISTEN");
        assert_eq!(entries[0].inode, 5001);
        assert_eq!(entries[1].state, "ESTABLISHED");
    }

    #[test]
    fn test_parse_ipv6_and_udp_rows() {
        let tcp6 = "  sl  local_address                         remote_address                        st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode\n   0: 00000000000000000000000000000000:0050 00000000000000000000000000000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 7001 1 0000000000000000 100 0 0 10 0\n";
        let entries = parse_socket_table(tcp6, "tcp6");
        assert_eq!(entries[0].local_port, 80);
        assert_eq!(entries[0].protocol, "tcp6");

        let udp = format!("{}{}", TCP_HEADER, tcp_row(0, 53, "07", 7002));
        let entries = parse_socket_table(&udp, "udp");
        assert_eq!(entries[0].state, STATUS_NONE);
    }

    #[test]
    fn test_short_and_garbage_rows_skipped() {
        let content = format!("{}garbage\n   1: nohex 00000000:0000 0A\n", TCP_HEADER);
        assert!(parse_socket_table(&content, "tcp").is_empty());
    }

    #[test]
    fn test_parse_socket_inode() {
        assert_eq!(parse_socket_inode("socket:[12345]"), Some(12345));
        assert_eq!(parse_socket_inode("pipe:[12345]"), None);
        assert_eq!(parse_socket_inode("/dev/null"), None);
    }

    #[test]
    fn test_list_resolves_owner_pid() {
        let mut fs = host_with_tcp(&[tcp_row(0, 8080, "0A", 5001), tcp_row(1, 9000, "0A", 5002)]);
        fs.add_process_sockets(1234, &[5001]);

        let records = PortCollector::new(fs, "/proc").list().unwrap();
        assert_eq!(
            records[0],
            Record::Port(PortRecord {
                port: 8080,
                status: "LISTEN".to_string(),
                pid: Some(1234),
                protocol: "tcp".to_string(),
            })
        );
        match &records[1] {
            Record::Port(p) => assert_eq!(p.pid, None),
            other => panic!("unexpected record {:?}", other),
        }
    }

    #[test]
    fn test_missing_ipv6_tables_tolerated() {
        let fs = host_with_tcp(&[tcp_row(0, 22, "0A", 0)]);
        let records = PortCollector::new(fs, "/proc").list().unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_no_tables_is_unavailable() {
        let err = PortCollector::new(MockFs::new(), "/proc").list().unwrap_err();
        assert!(matches!(
            err,
            CollectError::Unavailable {
                kind: ResourceKind::Ports,
                ..
            }
        ));
    }

    #[test]
    fn test_detail_prefers_listener() {
        let mut fs = host_with_tcp(&[tcp_row(0, 443, "01", 6001), tcp_row(1, 443, "0A", 6002)]);
        fs.add_process_sockets(77, &[6002]);

        let lookup = PortCollector::new(fs, "/proc").detail("443").unwrap();
        match lookup {
            Lookup::Found(Record::Port(p)) => {
                assert_eq!(p.status, "LISTEN");
                assert_eq!(p.pid, Some(77));
            }
            other => panic!("unexpected lookup {:?}", other),
        }
    }

    #[test]
    fn test_detail_without_listener_is_not_found() {
        let fs = host_with_tcp(&[tcp_row(0, 8080, "0A", 5001)]);
        let lookup = PortCollector::new(fs, "/proc").detail("9999").unwrap();
        assert_eq!(lookup, Lookup::NotFound);
    }

    #[test]
    fn test_detail_rejects_non_numeric_port() {
        let fs = host_with_tcp(&[]);
        let err = PortCollector::new(fs, "/proc").detail("http").unwrap_err();
        assert!(matches!(err, CollectError::InvalidIdentifier { .. }));
        let fs = host_with_tcp(&[]);
        assert!(PortCollector::new(fs, "/proc").detail("70000").is_err());
    }
}
