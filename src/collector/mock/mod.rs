//! Test doubles for the host.
//!
//! `MockFs` and `MockRunner` stand in for the filesystem and external
//! commands, and the scenarios build a realistic host from them.

mod filesystem;
mod runner;
mod scenarios;

pub use filesystem::MockFs;
pub use runner::MockRunner;
pub use scenarios::typical_host_aggregator;
