//! Continuous monitoring loop.
//!
//! Each cycle collects a snapshot, shows it and records the cycle in the
//! audit log. The loop runs until its [`CancelToken`] is cancelled, which
//! is observed between cycles and during the pause between them, never
//! inside a collector call.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::collector::Aggregator;
use crate::render::{ReportSink, render_snapshot};
use crate::storage::model::{Level, LogEntry, Snapshot};
use crate::storage::writer::AuditLogWriter;

pub const MSG_STARTED: &str = "monitoring started";
pub const MSG_CYCLE_COMPLETED: &str = "cycle completed";
pub const MSG_STOPPED: &str = "monitoring stopped";

const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Shared stop flag, cheap to clone and safe to set from a signal handler.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Running,
    Stopped,
}

/// Counters of a finished monitoring run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorSummary {
    pub cycles: u64,
    /// Collector failures across all cycles.
    pub collector_failures: u64,
    /// Appends to the audit log that failed.
    pub write_failures: u64,
}

pub struct Monitor {
    aggregator: Aggregator,
    writer: AuditLogWriter,
    interval: Duration,
    state: MonitorState,
}

impl Monitor {
    pub fn new(aggregator: Aggregator, writer: AuditLogWriter) -> Self {
        Self {
            aggregator,
            writer,
            interval: Duration::ZERO,
            state: MonitorState::Stopped,
        }
    }

    /// Pause between cycles. Zero (the default) starts the next cycle
    /// right away.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn writer(&self) -> &AuditLogWriter {
        &self.writer
    }

    /// Runs cycles until `cancel` fires, then returns normally.
    ///
    /// Failures inside a cycle never end the loop: collector failures are
    /// recorded as `ERROR` entries and audit log write failures are
    /// reported through `tracing`.
    pub fn run(&mut self, sink: &mut dyn ReportSink, cancel: &CancelToken) -> MonitorSummary {
        let mut summary = MonitorSummary::default();
        self.state = MonitorState::Running;
        info!(interval = ?self.interval, "starting continuous monitoring");
        self.record(&mut summary, &[LogEntry::info(MSG_STARTED)]);

        while !cancel.is_cancelled() {
            let snapshot = self.aggregator.collect_all();
            summary.cycles += 1;
            summary.collector_failures += snapshot.diagnostics.len() as u64;

            if let Err(e) = render_snapshot(&snapshot, sink) {
                warn!(error = %e, "failed to display snapshot");
            }

            let entries = cycle_entries(&snapshot);
            self.record(&mut summary, &entries);
            debug!(
                cycle = summary.cycles,
                records = snapshot.total_records(),
                failures = snapshot.diagnostics.len(),
                "monitoring cycle completed"
            );

            self.pause(cancel);
        }

        self.record(&mut summary, &[LogEntry::info(MSG_STOPPED)]);
        if let Err(e) = self.writer.close() {
            error!(error = %e, "failed to close audit log");
        }
        self.state = MonitorState::Stopped;
        info!(
            cycles = summary.cycles,
            write_failures = summary.write_failures,
            "continuous monitoring stopped"
        );
        summary
    }

    fn record(&mut self, summary: &mut MonitorSummary, entries: &[LogEntry]) {
        if let Err(e) = self.writer.append(entries) {
            summary.write_failures += 1;
            error!(error = %e, "failed to write audit log");
        }
    }

    /// Sleeps for the interval in short slices, returning early on cancel.
    fn pause(&self, cancel: &CancelToken) {
        let mut remaining = self.interval;
        while remaining > Duration::ZERO && !cancel.is_cancelled() {
            let slice = remaining.min(SLEEP_SLICE);
            thread::sleep(slice);
            remaining = remaining.saturating_sub(slice);
        }
    }
}

/// Audit log entries describing one cycle: an `ERROR` per failed
/// collector, then the completion marker.
fn cycle_entries(snapshot: &Snapshot) -> Vec<LogEntry> {
    snapshot
        .diagnostics
        .iter()
        .map(|d| LogEntry::new(Level::Error, format!("{} unavailable: {}", d.kind, d.message)))
        .chain(std::iter::once(LogEntry::info(MSG_CYCLE_COMPLETED)))
        .collect()
}
