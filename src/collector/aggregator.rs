//! Snapshot aggregation over a set of resource collectors.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::Local;
use tracing::{debug, warn};

use crate::collector::docker::DockerCollector;
use crate::collector::nginx::NginxCollector;
use crate::collector::ports::PortCollector;
use crate::collector::resource::{Lookup, ResourceCollector};
use crate::collector::traits::{CommandRunner, RealFs, RealRunner};
use crate::collector::users::UserCollector;
use crate::config::Config;
use crate::error::CollectError;
use crate::storage::model::{Diagnostic, Record, ResourceKind, Snapshot};

/// Time spent in each collector during the last `collect` call.
pub type CollectorTiming = BTreeMap<ResourceKind, Duration>;

type Outcome = (ResourceKind, Result<Vec<Record>, CollectError>, Duration);

/// Runs collectors and assembles their output into a [`Snapshot`].
///
/// Collectors fail independently: an error empties the failing kind and
/// adds a [`Diagnostic`], the other kinds are unaffected.
pub struct Aggregator {
    collectors: Vec<Box<dyn ResourceCollector>>,
    parallel: bool,
    timing: CollectorTiming,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregator {
    pub fn new() -> Self {
        Self {
            collectors: Vec::new(),
            parallel: false,
            timing: CollectorTiming::new(),
        }
    }

    /// Aggregator over the real host, configured from `config`.
    pub fn for_host(config: &Config) -> Self {
        let runner: Arc<dyn CommandRunner> = Arc::new(RealRunner::new(config.command_timeout));
        Self::new()
            .with_collector(PortCollector::new(RealFs::new(), &config.proc_path))
            .with_collector(DockerCollector::new(runner.clone()))
            .with_collector(NginxCollector::new(RealFs::new(), &config.nginx_dir))
            .with_collector(UserCollector::new(
                RealFs::new(),
                &config.passwd_path,
                runner,
            ))
            .parallel(config.parallel)
    }

    /// Adds a collector, replacing any earlier one of the same kind.
    pub fn with_collector(mut self, collector: impl ResourceCollector + 'static) -> Self {
        self.collectors.retain(|c| c.kind() != collector.kind());
        self.collectors.push(Box::new(collector));
        self
    }

    /// Runs the collectors of one cycle on separate threads.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Kinds with a configured collector.
    pub fn kinds(&self) -> Vec<ResourceKind> {
        let mut kinds: Vec<ResourceKind> = self.collectors.iter().map(|c| c.kind()).collect();
        kinds.sort();
        kinds
    }

    pub fn timing(&self) -> &CollectorTiming {
        &self.timing
    }

    fn collector(&self, kind: ResourceKind) -> Option<&dyn ResourceCollector> {
        self.collectors
            .iter()
            .find(|c| c.kind() == kind)
            .map(|c| c.as_ref())
    }

    /// Collects every kind with a configured collector.
    pub fn collect_all(&mut self) -> Snapshot {
        let kinds = self.kinds();
        self.collect(&kinds)
    }

    /// Collects the requested kinds.
    ///
    /// The snapshot has an entry for every requested kind, even when its
    /// collector failed or is not configured.
    pub fn collect(&mut self, kinds: &[ResourceKind]) -> Snapshot {
        let captured_at = Local::now().naive_local();
        let mut requested = kinds.to_vec();
        requested.sort();
        requested.dedup();

        let mut records = BTreeMap::new();
        let mut diagnostics = Vec::new();
        let mut available = Vec::new();
        for kind in requested {
            match self.collector(kind) {
                Some(collector) => available.push(collector),
                None => {
                    records.insert(kind, Vec::new());
                    diagnostics.push(Diagnostic {
                        kind,
                        message: "no collector configured".to_string(),
                    });
                }
            }
        }

        let outcomes = if self.parallel && available.len() > 1 {
            run_parallel(&available)
        } else {
            available.iter().map(|c| run_one(*c)).collect()
        };

        self.timing.clear();
        for (kind, result, elapsed) in outcomes {
            self.timing.insert(kind, elapsed);
            match result {
                Ok(list) => {
                    debug!(%kind, records = list.len(), ?elapsed, "collector finished");
                    records.insert(kind, list);
                }
                Err(e) => {
                    warn!(%kind, error = %e, "collector failed");
                    records.insert(kind, Vec::new());
                    diagnostics.push(Diagnostic {
                        kind,
                        message: e.to_string(),
                    });
                }
            }
        }
        diagnostics.sort_by_key(|d| d.kind);

        Snapshot {
            captured_at,
            records,
            diagnostics,
        }
    }

    /// Looks up one resource of one kind.
    pub fn detail(&self, kind: ResourceKind, identifier: &str) -> Result<Lookup, CollectError> {
        let collector = self
            .collector(kind)
            .ok_or_else(|| CollectError::Unavailable {
                kind,
                reason: "no collector configured".to_string(),
            })?;
        let lookup = collector.detail(identifier)?;
        debug!(%kind, identifier, found = lookup.is_found(), "detail lookup");
        Ok(lookup)
    }
}

fn run_one(collector: &dyn ResourceCollector) -> Outcome {
    let start = Instant::now();
    let result = collector.list();
    (collector.kind(), result, start.elapsed())
}

/// Runs each collector on its own scoped thread and waits for all of them.
fn run_parallel(collectors: &[&dyn ResourceCollector]) -> Vec<Outcome> {
    thread::scope(|s| {
        let handles: Vec<_> = collectors
            .iter()
            .map(|c| (c.kind(), s.spawn(move || run_one(*c))))
            .collect();

        handles
            .into_iter()
            .map(|(kind, handle)| {
                handle.join().unwrap_or_else(|_| {
                    (
                        kind,
                        Err(CollectError::Unavailable {
                            kind,
                            reason: "collector panicked".to_string(),
                        }),
                        Duration::ZERO,
                    )
                })
            })
            .collect()
    })
}
