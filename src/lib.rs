//! hostfetch - host snapshot and audit log library.
//!
//! This library provides the functionality behind the `hostfetch` binary:
//! - `collector` - ports, containers, nginx vhosts and users, aggregated
//!   into snapshots
//! - `storage` - the rotating audit log store and its writer
//! - `provider` - time-range queries over the audit log
//! - `monitor` - the continuous collect-and-record loop
//! - `render` - tabular reports

pub mod collector;
pub mod config;
pub mod error;
pub mod monitor;
pub mod provider;
pub mod render;
pub mod storage;
pub mod util;
