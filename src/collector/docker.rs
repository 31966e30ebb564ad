//! Container and image inventory from the docker CLI.
//!
//! Uses the JSON-lines output of `docker ps`/`docker images` and the JSON
//! array printed by `docker inspect`, so the collector does not depend on
//! column widths of the human-readable tables.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::collector::resource::{Lookup, ResourceCollector};
use crate::collector::traits::{CommandOutput, CommandRunner};
use crate::error::CollectError;
use crate::storage::model::{ContainerRecord, ImageRecord, Record, ResourceKind};

pub(crate) const DOCKER: &str = "docker";
pub(crate) const PS_ARGS: [&str; 5] = ["ps", "-a", "--no-trunc", "--format", "{{json .}}"];
pub(crate) const IMAGES_ARGS: [&str; 4] = ["images", "--no-trunc", "--format", "{{json .}}"];
const NONE_TAG: &str = "<none>";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PsLine {
    names: String,
    image: String,
    /// `running`, `exited`, ... (docker 20.10+).
    #[serde(default)]
    state: Option<String>,
    /// `Up 3 hours`, `Exited (0) 2 days ago`, ...
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct ImageLine {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Repository", default)]
    repository: String,
    #[serde(rename = "Tag", default)]
    tag: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Inspect {
    name: String,
    #[serde(default)]
    state: InspectState,
    #[serde(default)]
    config: InspectConfig,
    #[serde(default)]
    network_settings: InspectNetwork,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectState {
    #[serde(default)]
    status: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectConfig {
    #[serde(default)]
    image: String,
    #[serde(default)]
    cmd: Option<Vec<String>>,
    #[serde(default)]
    entrypoint: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectNetwork {
    #[serde(default)]
    ports: Option<BTreeMap<String, Option<Vec<PortBinding>>>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PortBinding {
    #[serde(default)]
    host_ip: String,
    #[serde(default)]
    host_port: String,
}

/// Collects containers (running and stopped) followed by images.
pub struct DockerCollector {
    runner: Arc<dyn CommandRunner>,
}

impl DockerCollector {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Runs a listing command; any failure means the runtime is unusable.
    fn run_listing(&self, args: &[&str]) -> Result<String, CollectError> {
        let unavailable = |reason: String| CollectError::Unavailable {
            kind: ResourceKind::Containers,
            reason,
        };
        let out = self
            .runner
            .run(DOCKER, args)
            .map_err(|e| unavailable(e.to_string()))?;
        if !out.success {
            return Err(unavailable(failure_reason(&out)));
        }
        Ok(out.stdout)
    }

    fn containers(&self) -> Result<Vec<ContainerRecord>, CollectError> {
        let stdout = self.run_listing(&PS_ARGS)?;
        let containers = parse_json_lines::<PsLine>(&stdout)?
            .into_iter()
            .map(|line| ContainerRecord {
                name: line.names,
                status: line.state.filter(|s| !s.is_empty()).unwrap_or(line.status),
                image: line.image,
                command: None,
                ports: None,
            })
            .collect();
        Ok(containers)
    }

    fn images(&self) -> Result<Vec<ImageRecord>, CollectError> {
        let stdout = self.run_listing(&IMAGES_ARGS)?;
        let mut images: Vec<ImageRecord> = Vec::new();

        // `docker images` prints one line per tag; fold them by id.
        for line in parse_json_lines::<ImageLine>(&stdout)? {
            let tag = (line.repository != NONE_TAG && line.tag != NONE_TAG)
                .then(|| format!("{}:{}", line.repository, line.tag));
            match images.iter_mut().find(|i| i.id == line.id) {
                Some(image) => image.tags.extend(tag),
                None => images.push(ImageRecord {
                    id: line.id,
                    tags: tag.into_iter().collect(),
                }),
            }
        }
        Ok(images)
    }
}

impl ResourceCollector for DockerCollector {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Containers
    }

    fn list(&self) -> Result<Vec<Record>, CollectError> {
        let containers = self.containers()?;
        let images = self.images()?;
        debug!(
            containers = containers.len(),
            images = images.len(),
            "docker inventory collected"
        );
        Ok(containers
            .into_iter()
            .map(Record::Container)
            .chain(images.into_iter().map(Record::Image))
            .collect())
    }

    fn detail(&self, identifier: &str) -> Result<Lookup, CollectError> {
        let args = ["inspect", "--type", "container", identifier];
        let out = self
            .runner
            .run(DOCKER, &args)
            .map_err(|e| CollectError::Unavailable {
                kind: ResourceKind::Containers,
                reason: e.to_string(),
            })?;

        if !out.success {
            if out.stderr.contains("No such") {
                return Ok(Lookup::NotFound);
            }
            return Err(CollectError::Command {
                program: DOCKER.to_string(),
                reason: failure_reason(&out),
            });
        }

        let inspected: Vec<Inspect> = serde_json::from_str(&out.stdout)
            .map_err(|e| CollectError::Parse(format!("docker inspect output: {}", e)))?;
        Ok(inspected
            .into_iter()
            .next()
            .map(|c| Record::Container(container_from_inspect(c)))
            .into())
    }
}

fn container_from_inspect(c: Inspect) -> ContainerRecord {
    let command = c
        .config
        .entrypoint
        .into_iter()
        .flatten()
        .chain(c.config.cmd.into_iter().flatten())
        .collect::<Vec<_>>()
        .join(" ");

    let ports = c
        .network_settings
        .ports
        .unwrap_or_default()
        .into_iter()
        .flat_map(|(container_port, bindings)| match bindings {
            Some(bindings) if !bindings.is_empty() => bindings
                .into_iter()
                .map(|b| format!("{}:{}->{}", b.host_ip, b.host_port, container_port))
                .collect::<Vec<_>>(),
            _ => vec![container_port],
        })
        .collect::<Vec<_>>()
        .join(", ");

    ContainerRecord {
        name: c.name.trim_start_matches('/').to_string(),
        status: c.state.status,
        image: c.config.image,
        command: (!command.is_empty()).then_some(command),
        ports: (!ports.is_empty()).then_some(ports),
    }
}

fn parse_json_lines<T: for<'de> Deserialize<'de>>(stdout: &str) -> Result<Vec<T>, CollectError> {
    stdout
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| {
            serde_json::from_str(l)
                .map_err(|e| CollectError::Parse(format!("docker output line '{}': {}", l, e)))
        })
        .collect()
}

fn failure_reason(out: &CommandOutput) -> String {
    let stderr = out.stderr.trim();
    match (stderr.is_empty(), out.code) {
        (false, _) => stderr.to_string(),
        (true, Some(code)) => format!("exit code {}", code),
        (true, None) => "terminated by signal".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockRunner;

    const PS_OUT: &str = r#"{"Command":"\"nginx -g 'daemon off;'\"","ID":"a1","Image":"nginx:latest","Names":"web","State":"running","Status":"Up 2 hours"}
{"Command":"\"redis-server\"","ID":"b2","Image":"redis:7","Names":"cache","State":"exited","Status":"Exited (0) 3 days ago"}
"#;

    const IMAGES_OUT: &str = r#"{"ID":"sha256:111","Repository":"nginx","Tag":"latest"}
{"ID":"sha256:111","Repository":"nginx","Tag":"1.25"}
{"ID":"sha256:222","Repository":"<none>","Tag":"<none>"}
"#;

    const INSPECT_OUT: &str = r#"[{"Name":"/web","State":{"Status":"running"},"Config":{"Image":"nginx:latest","Cmd":["nginx","-g","daemon off;"],"Entrypoint":["/docker-entrypoint.sh"]},"NetworkSettings":{"Ports":{"443/tcp":null,"80/tcp":[{"HostIp":"0.0.0.0","HostPort":"8080"}]}}}]"#;

    fn runner() -> MockRunner {
        let mut runner = MockRunner::new();
        runner
            .on(DOCKER, &PS_ARGS, PS_OUT)
            .on(DOCKER, &IMAGES_ARGS, IMAGES_OUT);
        runner
    }

    #[test]
    fn test_list_containers_then_images() {
        let collector = DockerCollector::new(Arc::new(runner()));
        let records = collector.list().unwrap();
        assert_eq!(records.len(), 4);

        match &records[1] {
            Record::Container(c) => {
                assert_eq!(c.name, "cache");
                assert_eq!(c.status, "exited");
                assert_eq!(c.image, "redis:7");
                assert_eq!(c.command, None);
            }
            other => panic!("unexpected record {:?}", other),
        }
        assert_eq!(
            records[2],
            Record::Image(ImageRecord {
                id: "sha256:111".to_string(),
                tags: vec!["nginx:latest".to_string(), "nginx:1.25".to_string()],
            })
        );
        assert_eq!(
            records[3],
            Record::Image(ImageRecord {
                id: "sha256:222".to_string(),
                tags: vec![],
            })
        );
    }

    #[test]
    fn test_status_falls_back_without_state_field() {
        let mut runner = MockRunner::new();
        runner
            .on(DOCKER, &PS_ARGS, r#"{"Image":"alpine","Names":"old","Status":"Up 1 second"}"#)
            .on(DOCKER, &IMAGES_ARGS, "");
        let records = DockerCollector::new(Arc::new(runner)).list().unwrap();
        match &records[0] {
            Record::Container(c) => assert_eq!(c.status, "Up 1 second"),
            other => panic!("unexpected record {:?}", other),
        }
    }

    #[test]
    fn test_docker_missing_is_unavailable() {
        let collector = DockerCollector::new(Arc::new(MockRunner::new()));
        let err = collector.list().unwrap_err();
        assert!(matches!(
            err,
            CollectError::Unavailable {
                kind: ResourceKind::Containers,
                ..
            }
        ));
    }

    #[test]
    fn test_daemon_unreachable_is_unavailable() {
        let mut runner = MockRunner::new();
        runner.on_failure(
            DOCKER,
            &PS_ARGS,
            1,
            "Cannot connect to the Docker daemon at unix:///var/run/docker.sock.",
        );
        let err = DockerCollector::new(Arc::new(runner)).list().unwrap_err();
        assert!(err.to_string().contains("Cannot connect"));
    }

    #[test]
    fn test_garbage_output_is_parse_error() {
        let mut runner = MockRunner::new();
        runner.on(DOCKER, &PS_ARGS, "not json\n");
        let err = DockerCollector::new(Arc::new(runner)).list().unwrap_err();
        assert!(matches!(err, CollectError::Parse(_)));
    }

    #[test]
    fn test_detail_enriches_container() {
        let mut runner = runner();
        runner.on(DOCKER, &["inspect", "--type", "container", "web"], INSPECT_OUT);

        let lookup = DockerCollector::new(Arc::new(runner)).detail("web").unwrap();
        assert_eq!(
            lookup,
            Lookup::Found(Record::Container(ContainerRecord {
                name: "web".to_string(),
                status: "running".to_string(),
                image: "nginx:latest".to_string(),
                command: Some("/docker-entrypoint.sh nginx -g daemon off;".to_string()),
                ports: Some("443/tcp, 0.0.0.0:8080->80/tcp".to_string()),
            }))
        );
    }

    #[test]
    fn test_detail_unknown_container_is_not_found() {
        let mut runner = runner();
        runner.on_failure(
            DOCKER,
            &["inspect", "--type", "container", "ghost"],
            1,
            "Error: No such container: ghost",
        );
        let lookup = DockerCollector::new(Arc::new(runner)).detail("ghost").unwrap();
        assert_eq!(lookup, Lookup::NotFound);
    }
}
