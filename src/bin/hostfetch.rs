//! hostfetch - what is running on this box.
//!
//! Lists or looks up ports, containers, nginx virtual hosts and users,
//! replays recorded activity for a time range, or keeps monitoring and
//! recording until interrupted.
//!
//! Usage:
//!   hostfetch -p               # all ports
//!   hostfetch -p 443           # details for port 443
//!   hostfetch -d web           # details for container "web"
//!   hostfetch -n               # all nginx domains
//!   hostfetch -u alice         # last login of alice
//!   hostfetch -t "2026-02-07 17:00:00" "2026-02-07 18:00:00"
//!   hostfetch -t -1h now       # the last hour
//!   hostfetch -l               # monitor until Ctrl-C

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{ArgGroup, CommandFactory, Parser};
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use hostfetch::collector::{Aggregator, Lookup};
use hostfetch::config::{
    Config, DEFAULT_LOG_FILE, DEFAULT_MAX_BACKUPS, DEFAULT_NGINX_DIR, DEFAULT_PASSWD_PATH,
    DEFAULT_PROC_PATH, format_size, parse_duration, parse_size,
};
use hostfetch::error::Result;
use hostfetch::monitor::{CancelToken, Monitor};
use hostfetch::provider::{HistoryProvider, TimeRange};
use hostfetch::render::{
    ReportSink, TableSink, render_detail, render_entries, render_snapshot,
};
use hostfetch::storage::model::{ResourceKind, Snapshot};
use hostfetch::storage::{AuditLogStore, AuditLogWriter};
use hostfetch::util::parse_time;

/// Host ports, containers, nginx vhosts and users at a glance.
#[derive(Parser, Debug)]
#[command(name = "hostfetch", about = "Host ports, containers, vhosts and users at a glance", version)]
#[command(group(
    ArgGroup::new("mode")
        .args(["port", "docker", "nginx", "users", "time", "log"])
        .multiple(false)
))]
struct Args {
    /// List active ports, or show the socket bound to PORT.
    #[arg(short = 'p', long = "port", value_name = "PORT", num_args = 0..=1)]
    port: Option<Option<String>>,

    /// List containers and images, or show details of container NAME.
    #[arg(short = 'd', long = "docker", value_name = "NAME", num_args = 0..=1)]
    docker: Option<Option<String>>,

    /// List nginx domains and ports, or show the configuration of DOMAIN.
    #[arg(short = 'n', long = "nginx", value_name = "DOMAIN", num_args = 0..=1)]
    nginx: Option<Option<String>>,

    /// List users and their last login, or show details of USER.
    #[arg(short = 'u', long = "users", value_name = "USER", num_args = 0..=1)]
    users: Option<Option<String>>,

    /// Show recorded activity between START and END (inclusive). Supported formats:
    /// - Log format: "2026-02-07 17:00:00"
    /// - ISO 8601: 2026-02-07T17:00:00
    /// - Date only: 2026-02-07
    /// - Unix timestamp: 1738944000
    /// - Relative: -1h, -30m, -2d, now
    #[arg(
        short = 't',
        long = "time",
        num_args = 2,
        value_names = ["START", "END"],
        allow_hyphen_values = true
    )]
    time: Option<Vec<String>>,

    /// Monitor continuously, recording every cycle to the log file.
    #[arg(short = 'l', long = "log")]
    log: bool,

    /// Audit log file.
    #[arg(long, env = "HOSTFETCH_LOG_FILE", default_value = DEFAULT_LOG_FILE)]
    log_file: PathBuf,

    /// Maximum size of the log file before rotation (e.g., "1M", "500K", "1000000").
    #[arg(long, env = "HOSTFETCH_MAX_BYTES", default_value = "1000000", value_parser = parse_size)]
    max_bytes: u64,

    /// Number of rotated log files to keep.
    #[arg(long, env = "HOSTFETCH_MAX_BACKUPS", default_value_t = DEFAULT_MAX_BACKUPS)]
    max_backups: usize,

    /// Directory with enabled nginx sites.
    #[arg(long, env = "HOSTFETCH_NGINX_DIR", default_value = DEFAULT_NGINX_DIR)]
    nginx_dir: PathBuf,

    /// Pause between monitoring cycles (e.g., "30s", "5m"). Default: none.
    #[arg(long, env = "HOSTFETCH_INTERVAL", default_value = "0", value_parser = parse_duration)]
    interval: Duration,

    /// Time limit for each external command (docker, lastlog).
    #[arg(long, env = "HOSTFETCH_COMMAND_TIMEOUT", default_value = "10s", value_parser = parse_duration)]
    command_timeout: Duration,

    /// Path to /proc filesystem.
    #[arg(long, default_value = DEFAULT_PROC_PATH)]
    proc_path: PathBuf,

    /// Path to the passwd database.
    #[arg(long, default_value = DEFAULT_PASSWD_PATH)]
    passwd_path: PathBuf,

    /// Run the collectors of a cycle concurrently.
    #[arg(long)]
    parallel: bool,

    /// Increase logging verbosity (-v info, -vv debug, -vvv trace). Default is warnings.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

/// What the invocation asks for.
#[derive(Debug, PartialEq, Eq)]
enum Mode {
    List(ResourceKind),
    Detail(ResourceKind, String),
    Query(String, String),
    Monitor,
    Help,
}

impl Args {
    fn config(&self) -> Config {
        Config {
            log_file: self.log_file.clone(),
            max_bytes: self.max_bytes,
            max_backups: self.max_backups,
            nginx_dir: self.nginx_dir.clone(),
            proc_path: self.proc_path.clone(),
            passwd_path: self.passwd_path.clone(),
            interval: self.interval,
            command_timeout: self.command_timeout,
            parallel: self.parallel,
        }
    }

    fn mode(&self) -> Mode {
        let lookups = [
            (ResourceKind::Ports, &self.port),
            (ResourceKind::Containers, &self.docker),
            (ResourceKind::VHosts, &self.nginx),
            (ResourceKind::Users, &self.users),
        ];
        for (kind, arg) in lookups {
            match arg {
                Some(Some(id)) if !id.trim().is_empty() => {
                    return Mode::Detail(kind, id.trim().to_string());
                }
                Some(_) => return Mode::List(kind),
                None => {}
            }
        }
        if let Some([start, end]) = self.time.as_deref() {
            return Mode::Query(start.clone(), end.clone());
        }
        if self.log {
            return Mode::Monitor;
        }
        Mode::Help
    }
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Default level is WARN so reports on stdout stay uncluttered; -q shows errors only.
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    match format!("hostfetch={}", level).parse() {
        Ok(directive) => filter = filter.add_directive(directive),
        Err(e) => eprintln!("invalid log directive: {}", e),
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Describes the contents of a snapshot for logging.
fn describe_snapshot(snapshot: &Snapshot) -> String {
    let mut parts: Vec<String> = snapshot
        .kinds()
        .map(|kind| format!("{} {}", snapshot.records_of(kind).len(), kind))
        .collect();
    if !snapshot.diagnostics.is_empty() {
        parts.push(format!("{} failed", snapshot.diagnostics.len()));
    }
    parts.join(", ")
}

fn list(config: &Config, kind: ResourceKind, sink: &mut dyn ReportSink) -> Result<()> {
    let mut aggregator = Aggregator::for_host(config);
    let snapshot = aggregator.collect(&[kind]);
    info!("Snapshot: {}", describe_snapshot(&snapshot));
    render_snapshot(&snapshot, sink)?;
    Ok(())
}

fn detail(
    config: &Config,
    kind: ResourceKind,
    identifier: &str,
    sink: &mut dyn ReportSink,
) -> Result<()> {
    let aggregator = Aggregator::for_host(config);
    let lookup = aggregator.detail(kind, identifier)?;
    if lookup == Lookup::NotFound {
        info!("No {} matching '{}'", kind, identifier);
    }
    render_detail(kind, identifier, &lookup, sink)?;
    Ok(())
}

fn query(config: &Config, start: &str, end: &str, sink: &mut dyn ReportSink) -> Result<()> {
    let range = TimeRange::new(parse_time(start)?, parse_time(end)?)?;
    let store = AuditLogStore::new(&config.log_file, config.rotation())?;
    debug!(
        "Querying {} from {} to {}",
        store.path().display(),
        range.start(),
        range.end()
    );

    let mut entries = HistoryProvider::new(store).query(range);
    let count = render_entries(entries.by_ref(), sink)?;
    info!(
        "{} entries matched, {} lines scanned, {} skipped",
        count,
        entries.scanned(),
        entries.skipped()
    );
    if count == 0 {
        sink.line(&format!(
            "No activity recorded between {} and {}",
            range.start(),
            range.end()
        ))?;
    }
    Ok(())
}

fn monitor(config: &Config, sink: &mut dyn ReportSink) -> Result<()> {
    // Opening the store up front turns an unwritable log path into a
    // startup error instead of a failure in every cycle.
    let store = AuditLogStore::open(&config.log_file, config.rotation())?;
    info!(
        "Audit log at {} (max_bytes={}, max_backups={})",
        store.path().display(),
        format_size(config.max_bytes),
        config.max_backups
    );

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        handler_token.cancel();
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    let mut monitor = Monitor::new(Aggregator::for_host(config), AuditLogWriter::new(store))
        .with_interval(config.interval);
    let summary = monitor.run(sink, &cancel);
    info!(
        "Monitoring finished: {} cycles, {} collector failures, {} write failures",
        summary.cycles, summary.collector_failures, summary.write_failures
    );
    Ok(())
}

fn run(args: &Args, sink: &mut dyn ReportSink) -> Result<()> {
    let config = args.config();
    config.validate()?;

    match args.mode() {
        Mode::List(kind) => list(&config, kind, sink),
        Mode::Detail(kind, id) => detail(&config, kind, &id, sink),
        Mode::Query(start, end) => query(&config, &start, &end, sink),
        Mode::Monitor => monitor(&config, sink),
        Mode::Help => {
            Args::command().print_help()?;
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);
    debug!("hostfetch {} starting", env!("CARGO_PKG_VERSION"));

    let mut sink = TableSink::stdout();
    match run(&args, &mut sink) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
