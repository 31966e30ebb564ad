//! Host resource collectors.
//!
//! # Architecture
//!
//! ```text
//!                        Aggregator
//!                            │ ResourceCollector (trait)
//!       ┌──────────────┬─────┴────────┬──────────────┐
//!  PortCollector  DockerCollector NginxCollector UserCollector
//!  /proc/net/*    docker ps       sites-enabled  /etc/passwd
//!  /proc/*/fd     docker images                  lastlog
//!
//!  FileSystem    (RealFs | MockFs):         ports, nginx, users
//!  CommandRunner (RealRunner | MockRunner): docker, users
//! ```
//!
//! # Usage
//!
//! ```
//! use hostfetch::collector::mock::typical_host_aggregator;
//! use hostfetch::storage::model::ResourceKind;
//!
//! let mut aggregator = typical_host_aggregator();
//! let snapshot = aggregator.collect(&[ResourceKind::Ports, ResourceKind::Users]);
//! assert_eq!(snapshot.records.len(), 2);
//! assert!(snapshot.is_complete());
//! ```

mod aggregator;
mod docker;
pub mod mock;
mod nginx;
mod ports;
mod resource;
pub mod traits;
mod users;

pub use aggregator::{Aggregator, CollectorTiming};
pub use docker::DockerCollector;
pub use nginx::{CATCH_ALL, DEFAULT_LISTEN, NginxCollector};
pub use ports::{PortCollector, STATUS_NONE};
pub use resource::{Lookup, ResourceCollector};
pub use traits::{CommandOutput, CommandRunner, FileSystem, RealFs, RealRunner};
pub use users::UserCollector;
