//! Human-readable reports.
//!
//! Everything shown to the operator goes through a [`ReportSink`]; the
//! monitor and the binary never format tables themselves.

use std::io::{self, Write};

use tabled::builder::Builder;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::collector::Lookup;
use crate::storage::model::{LogEntry, Record, ResourceKind, Snapshot};

/// Destination for tabular reports.
pub trait ReportSink {
    /// Displays rows under named columns.
    fn table(&mut self, title: &str, headers: Vec<String>, rows: Vec<Vec<String>>)
    -> io::Result<()>;

    /// Displays a line of free text.
    fn line(&mut self, text: &str) -> io::Result<()>;
}

/// Renders tables with box drawing to a writer.
pub struct TableSink<W: Write> {
    out: W,
}

impl TableSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TableSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ReportSink for TableSink<W> {
    fn table(
        &mut self,
        title: &str,
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
    ) -> io::Result<()> {
        let mut builder = Builder::default();
        builder.push_record(headers);
        for row in rows {
            builder.push_record(row);
        }
        let mut table: Table = builder.build();
        table.with(Style::rounded());

        writeln!(self.out, "{}", title)?;
        writeln!(self.out, "{}", table)?;
        writeln!(self.out)?;
        self.out.flush()
    }

    fn line(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{}", text)
    }
}

/// A table captured by [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedTable {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Keeps everything it is given, in order. Useful for tests and for
/// callers that post-process reports.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub tables: Vec<RenderedTable>,
    pub lines: Vec<String>,
}

impl ReportSink for RecordingSink {
    fn table(
        &mut self,
        title: &str,
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
    ) -> io::Result<()> {
        self.tables.push(RenderedTable {
            title: title.to_string(),
            headers,
            rows,
        });
        Ok(())
    }

    fn line(&mut self, text: &str) -> io::Result<()> {
        self.lines.push(text.to_string());
        Ok(())
    }
}

#[derive(Tabled)]
struct PortRow {
    #[tabled(rename = "Port")]
    port: u16,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "PID")]
    pid: String,
    #[tabled(rename = "Protocol")]
    protocol: String,
}

#[derive(Tabled)]
struct ContainerRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Image")]
    image: String,
}

#[derive(Tabled)]
struct ImageRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Tags")]
    tags: String,
}

#[derive(Tabled)]
struct VHostRow {
    #[tabled(rename = "Domain")]
    domain: String,
    #[tabled(rename = "Port")]
    port: String,
}

#[derive(Tabled)]
struct UserRow {
    #[tabled(rename = "Username")]
    username: String,
    #[tabled(rename = "Last Login")]
    last_login: String,
}

const NO_LOGIN: &str = "Never";
const NO_PID: &str = "-";

fn emit<T: Tabled>(sink: &mut dyn ReportSink, title: &str, rows: &[T]) -> io::Result<()> {
    let headers = T::headers().into_iter().map(|h| h.into_owned()).collect();
    let rows = rows
        .iter()
        .map(|r| r.fields().into_iter().map(|f| f.into_owned()).collect())
        .collect();
    sink.table(title, headers, rows)
}

fn short_id(id: &str) -> String {
    let hex = id.strip_prefix("sha256:").unwrap_or(id);
    hex.chars().take(12).collect()
}

/// Renders the records of one kind.
///
/// The containers kind renders two tables, containers then images.
pub fn render_records(
    kind: ResourceKind,
    records: &[Record],
    sink: &mut dyn ReportSink,
) -> io::Result<()> {
    match kind {
        ResourceKind::Ports => {
            let rows: Vec<PortRow> = records
                .iter()
                .filter_map(|r| match r {
                    Record::Port(p) => Some(PortRow {
                        port: p.port,
                        status: p.status.clone(),
                        pid: p.pid.map_or_else(|| NO_PID.to_string(), |pid| pid.to_string()),
                        protocol: p.protocol.clone(),
                    }),
                    _ => None,
                })
                .collect();
            emit(sink, "Active Ports", &rows)
        }
        ResourceKind::Containers => {
            let containers: Vec<ContainerRow> = records
                .iter()
                .filter_map(|r| match r {
                    Record::Container(c) => Some(ContainerRow {
                        name: c.name.clone(),
                        status: c.status.clone(),
                        image: c.image.clone(),
                    }),
                    _ => None,
                })
                .collect();
            let images: Vec<ImageRow> = records
                .iter()
                .filter_map(|r| match r {
                    Record::Image(i) => Some(ImageRow {
                        id: short_id(&i.id),
                        tags: i.tags.join(", "),
                    }),
                    _ => None,
                })
                .collect();
            emit(sink, "Docker Containers", &containers)?;
            emit(sink, "Docker Images", &images)
        }
        ResourceKind::VHosts => {
            let rows: Vec<VHostRow> = records
                .iter()
                .filter_map(|r| match r {
                    Record::VHost(v) => Some(VHostRow {
                        domain: v.domain.clone(),
                        port: v.port.clone(),
                    }),
                    _ => None,
                })
                .collect();
            emit(sink, "Nginx Domains", &rows)
        }
        ResourceKind::Users => {
            let rows: Vec<UserRow> = records
                .iter()
                .filter_map(|r| match r {
                    Record::User(u) => Some(UserRow {
                        username: u.username.clone(),
                        last_login: u.last_login.clone().unwrap_or_else(|| NO_LOGIN.to_string()),
                    }),
                    _ => None,
                })
                .collect();
            emit(sink, "Users", &rows)
        }
    }
}

/// Renders every kind of a snapshot followed by its diagnostics.
pub fn render_snapshot(snapshot: &Snapshot, sink: &mut dyn ReportSink) -> io::Result<()> {
    for kind in snapshot.kinds() {
        render_records(kind, snapshot.records_of(kind), sink)?;
    }
    for d in &snapshot.diagnostics {
        sink.line(&format!("warning: {} unavailable: {}", d.kind, d.message))?;
    }
    Ok(())
}

/// Renders the outcome of a detail lookup as a field/value table.
pub fn render_detail(
    kind: ResourceKind,
    identifier: &str,
    lookup: &Lookup,
    sink: &mut dyn ReportSink,
) -> io::Result<()> {
    let record = match lookup {
        Lookup::Found(record) => record,
        Lookup::NotFound => {
            return sink.line(&format!("No {} found matching '{}'", kind, identifier));
        }
    };

    let mut fields: Vec<(&str, String)> = Vec::new();
    let mut config = None;
    match record {
        Record::Port(p) => {
            fields.push(("Port", p.port.to_string()));
            fields.push(("Status", p.status.clone()));
            fields.push(("PID", p.pid.map_or_else(|| NO_PID.to_string(), |pid| pid.to_string())));
            fields.push(("Protocol", p.protocol.clone()));
        }
        Record::Container(c) => {
            fields.push(("Name", c.name.clone()));
            fields.push(("Status", c.status.clone()));
            fields.push(("Image", c.image.clone()));
            fields.extend(c.command.clone().map(|cmd| ("Command", cmd)));
            fields.extend(c.ports.clone().map(|ports| ("Ports", ports)));
        }
        Record::Image(i) => {
            fields.push(("ID", i.id.clone()));
            fields.push(("Tags", i.tags.join(", ")));
        }
        Record::VHost(v) => {
            fields.push(("Domain", v.domain.clone()));
            fields.push(("Port", v.port.clone()));
            config = v.config.as_deref();
        }
        Record::User(u) => {
            fields.push(("Username", u.username.clone()));
            fields.push((
                "Last Login",
                u.last_login.clone().unwrap_or_else(|| NO_LOGIN.to_string()),
            ));
        }
    }

    let rows = fields
        .into_iter()
        .map(|(name, value)| vec![name.to_string(), value])
        .collect();
    sink.table(
        &format!("Details for {}", identifier),
        vec!["Field".to_string(), "Value".to_string()],
        rows,
    )?;

    if let Some(config) = config {
        sink.line(&format!("Configuration for {}:", identifier))?;
        for line in config.lines() {
            sink.line(line)?;
        }
    }
    Ok(())
}

/// Prints entries in their log line format. Returns how many were printed.
pub fn render_entries(
    entries: impl IntoIterator<Item = LogEntry>,
    sink: &mut dyn ReportSink,
) -> io::Result<usize> {
    let mut count = 0;
    for entry in entries {
        sink.line(&entry.to_line())?;
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::model::{ContainerRecord, ImageRecord, PortRecord, UserRecord, VHostRecord};
    use crate::storage::model::{Diagnostic, Level};
    use chrono::NaiveDateTime;
    use std::collections::BTreeMap;

    fn ts() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2026-02-07 17:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn containers() -> Vec<Record> {
        vec![
            Record::Container(ContainerRecord {
                name: "web".to_string(),
                status: "running".to_string(),
                image: "nginx:latest".to_string(),
                command: None,
                ports: None,
            }),
            Record::Image(ImageRecord {
                id: "sha256:0123456789abcdef0123".to_string(),
                tags: vec!["nginx:latest".to_string(), "nginx:1.25".to_string()],
            }),
        ]
    }

    #[test]
    fn test_ports_table() {
        let mut sink = RecordingSink::default();
        let records = vec![Record::Port(PortRecord {
            port: 8080,
            status: "LISTEN".to_string(),
            pid: None,
            protocol: "tcp".to_string(),
        })];
        render_records(ResourceKind::Ports, &records, &mut sink).unwrap();

        let table = &sink.tables[0];
        assert_eq!(table.headers, vec!["Port", "Status", "PID", "Protocol"]);
        assert_eq!(table.rows, vec![vec!["8080", "LISTEN", "-", "tcp"]]);
    }

    #[test]
    fn test_containers_render_two_tables() {
        let mut sink = RecordingSink::default();
        render_records(ResourceKind::Containers, &containers(), &mut sink).unwrap();

        assert_eq!(sink.tables.len(), 2);
        assert_eq!(sink.tables[0].rows, vec![vec!["web", "running", "nginx:latest"]]);
        assert_eq!(
            sink.tables[1].rows,
            vec![vec!["0123456789ab", "nginx:latest, nginx:1.25"]]
        );
    }

    #[test]
    fn test_snapshot_lists_diagnostics_after_tables() {
        let mut records = BTreeMap::new();
        records.insert(ResourceKind::Containers, Vec::new());
        records.insert(
            ResourceKind::Users,
            vec![Record::User(UserRecord {
                username: "alice".to_string(),
                last_login: None,
            })],
        );
        let snapshot = Snapshot {
            captured_at: ts(),
            records,
            diagnostics: vec![Diagnostic {
                kind: ResourceKind::Containers,
                message: "docker not installed".to_string(),
            }],
        };

        let mut sink = RecordingSink::default();
        render_snapshot(&snapshot, &mut sink).unwrap();
        assert_eq!(sink.tables.len(), 3);
        assert_eq!(sink.tables[2].rows, vec![vec!["alice", "Never"]]);
        assert_eq!(
            sink.lines,
            vec!["warning: containers unavailable: docker not installed"]
        );
    }

    #[test]
    fn test_detail_not_found_message() {
        let mut sink = RecordingSink::default();
        render_detail(ResourceKind::Ports, "9999", &Lookup::NotFound, &mut sink).unwrap();
        assert!(sink.tables.is_empty());
        assert_eq!(sink.lines, vec!["No ports found matching '9999'"]);
    }

    #[test]
    fn test_vhost_detail_prints_config() {
        let lookup = Lookup::Found(Record::VHost(VHostRecord {
            domain: "example.com".to_string(),
            port: "443".to_string(),
            config: Some("server {\n    listen 443;\n}".to_string()),
        }));
        let mut sink = RecordingSink::default();
        render_detail(ResourceKind::VHosts, "example.com", &lookup, &mut sink).unwrap();

        assert_eq!(sink.tables[0].rows[1], vec!["Port", "443"]);
        assert_eq!(sink.lines[0], "Configuration for example.com:");
        assert_eq!(sink.lines.len(), 4);
    }

    #[test]
    fn test_render_entries_counts() {
        let entries = vec![
            LogEntry::at(ts(), Level::Info, "cycle completed"),
            LogEntry::at(ts(), Level::Error, "containers unavailable"),
        ];
        let mut sink = RecordingSink::default();
        assert_eq!(render_entries(entries, &mut sink).unwrap(), 2);
        assert_eq!(
            sink.lines[0],
            "2026-02-07 17:00:00,000000 INFO:cycle completed"
        );
    }

    #[test]
    fn test_table_sink_writes_title_and_cells() {
        let mut sink = TableSink::new(Vec::new());
        render_records(ResourceKind::Containers, &containers(), &mut sink).unwrap();
        let out = String::from_utf8(sink.into_inner()).unwrap();

        assert!(out.starts_with("Docker Containers\n"));
        assert!(out.contains("nginx:latest"));
        assert!(out.contains("Docker Images"));
        assert!(out.contains('╭'));
    }
}
