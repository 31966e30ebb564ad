//! Resource records produced by collectors.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of host resource a collector reports on.
///
/// Ordering follows the order in which resources are listed in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Ports,
    Containers,
    VHosts,
    Users,
}

impl ResourceKind {
    /// All resource kinds in report order.
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Ports,
        ResourceKind::Containers,
        ResourceKind::VHosts,
        ResourceKind::Users,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Ports => "ports",
            ResourceKind::Containers => "containers",
            ResourceKind::VHosts => "vhosts",
            ResourceKind::Users => "users",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ports" | "port" => Ok(ResourceKind::Ports),
            "containers" | "container" | "docker" => Ok(ResourceKind::Containers),
            "vhosts" | "vhost" | "nginx" => Ok(ResourceKind::VHosts),
            "users" | "user" => Ok(ResourceKind::Users),
            other => Err(format!("unknown resource kind '{}'", other)),
        }
    }
}

/// A socket bound to a local port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRecord {
    pub port: u16,
    /// Socket state as reported by the kernel (`LISTEN`, `ESTABLISHED`, ...).
    /// UDP sockets have no state and report `NONE`.
    pub status: String,
    /// Owning process, when the socket inode could be matched to a pid.
    pub pid: Option<u32>,
    /// `tcp`, `tcp6`, `udp` or `udp6`.
    pub protocol: String,
}

/// A container known to the container runtime, running or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRecord {
    pub name: String,
    pub status: String,
    pub image: String,
    /// Only filled by detail lookups.
    pub command: Option<String>,
    /// Published ports, only filled by detail lookups.
    pub ports: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: String,
    pub tags: Vec<String>,
}

/// A virtual host from the web server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VHostRecord {
    pub domain: String,
    /// Value of the `listen` directive (`80`, `443`, `[::]:80`, ...).
    pub port: String,
    /// Configuration text of the file declaring the host, only filled by
    /// detail lookups.
    pub config: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    /// `None` when the account never logged in or the lookup failed.
    pub last_login: Option<String>,
}

/// A single resource record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Record {
    Port(PortRecord),
    Container(ContainerRecord),
    Image(ImageRecord),
    VHost(VHostRecord),
    User(UserRecord),
}

impl Record {
    /// Resource kind this record is reported under.
    ///
    /// Images are part of the container inventory.
    pub fn kind(&self) -> ResourceKind {
        match self {
            Record::Port(_) => ResourceKind::Ports,
            Record::Container(_) | Record::Image(_) => ResourceKind::Containers,
            Record::VHost(_) => ResourceKind::VHosts,
            Record::User(_) => ResourceKind::Users,
        }
    }

    /// Identifier a detail lookup would use to address this record.
    pub fn identifier(&self) -> String {
        match self {
            Record::Port(p) => p.port.to_string(),
            Record::Container(c) => c.name.clone(),
            Record::Image(i) => i.id.clone(),
            Record::VHost(v) => v.domain.clone(),
            Record::User(u) => u.username.clone(),
        }
    }
}
