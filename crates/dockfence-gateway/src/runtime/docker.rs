//! Docker Engine backend (bollard).

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, ListContainersOptions, LogsOptions,
    RemoveContainerOptions, RestartContainerOptions, StartContainerOptions, StatsOptions,
    StopContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::models::{
    ContainerInspectResponse, ContainerStateStatusEnum, ContainerSummary, HostConfig,
    PortBinding as DockerPortBinding, PortTypeEnum, RestartPolicy as DockerRestartPolicy,
    RestartPolicyNameEnum,
};
use bollard::{Docker, API_DEFAULT_VERSION};
use chrono::{DateTime, Utc};
use futures_util::{StreamExt, TryStreamExt};

use dockfence_core::model::{CreationRequest, HostBinding, RestartPolicyName, UsageSample};

use crate::config::RuntimeSection;

use super::{
    ContainerRecord, ContainerRuntime, CreateSpec, CreatedContainer, LogOptions, LogStream,
    RemoveOptions, RuntimeError, RuntimeResult,
};

/// Client-side timeout for the HTTP connection itself; call budgets are
/// enforced above this layer.
const CONNECT_TIMEOUT_SECS: u64 = 120;

#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// `docker_host` accepts `unix://`, `tcp://` or `http://`; unset means the
    /// local defaults (`DOCKER_HOST` or the standard socket).
    pub fn connect(settings: &RuntimeSection) -> RuntimeResult<Self> {
        let docker = match settings.docker_host.as_deref() {
            None => Docker::connect_with_local_defaults(),
            Some(host) if host.starts_with("unix://") => {
                Docker::connect_with_unix(host, CONNECT_TIMEOUT_SECS, API_DEFAULT_VERSION)
            }
            Some(host) => Docker::connect_with_http(host, CONNECT_TIMEOUT_SECS, API_DEFAULT_VERSION),
        }
        .map_err(|e| RuntimeError::Unavailable(format!("docker client init failed: {e}")))?;
        Ok(Self { docker })
    }
}

fn map_docker_err(err: DockerError) -> RuntimeError {
    match err {
        DockerError::DockerResponseServerError {
            status_code,
            message,
        } => match status_code {
            304 => RuntimeError::NotModified,
            404 => RuntimeError::NotFound(message),
            409 => RuntimeError::Conflict(message),
            _ => RuntimeError::Unexpected(format!("docker returned {status_code}: {message}")),
        },
        DockerError::RequestTimeoutError => RuntimeError::Timeout,
        e @ (DockerError::JsonDataError { .. } | DockerError::JsonSerdeError { .. }) => {
            RuntimeError::Unexpected(e.to_string())
        }
        other => RuntimeError::Unavailable(other.to_string()),
    }
}

/// Create answers 404 for any missing reference (image, network, volume
/// driver); only "No such image" means the image is absent.
fn map_create_err(err: DockerError, image: &str) -> RuntimeError {
    match map_docker_err(err) {
        RuntimeError::NotFound(message) if message.contains("No such image") => {
            RuntimeError::ImageNotFound(image.to_string())
        }
        RuntimeError::NotFound(message) => {
            RuntimeError::Unexpected(format!("create referenced a missing object: {message}"))
        }
        other => other,
    }
}

fn restart_policy(req: &CreationRequest) -> Option<DockerRestartPolicy> {
    req.restart_policy.as_ref().map(|rp| {
        let name = match rp.name {
            RestartPolicyName::No => RestartPolicyNameEnum::NO,
            RestartPolicyName::Always => RestartPolicyNameEnum::ALWAYS,
            RestartPolicyName::OnFailure => RestartPolicyNameEnum::ON_FAILURE,
            RestartPolicyName::UnlessStopped => RestartPolicyNameEnum::UNLESS_STOPPED,
        };
        DockerRestartPolicy {
            name: Some(name),
            maximum_retry_count: (rp.name == RestartPolicyName::OnFailure)
                .then_some(rp.maximum_retry_count),
        }
    })
}

/// Translate an accepted, tagged request into the engine's create body.
fn container_config(req: &CreationRequest) -> RuntimeResult<Config<String>> {
    let invalid = |e: dockfence_core::FenceError| RuntimeError::Unexpected(e.to_string());

    let mut exposed_ports = HashMap::new();
    let mut port_bindings = HashMap::new();
    for (key, spec) in &req.ports {
        let key = dockfence_core::model::request::normalize_port_key(key).map_err(invalid)?;
        let bindings = spec
            .bindings()
            .into_iter()
            .map(|b| DockerPortBinding {
                host_ip: Some(b.host_ip),
                host_port: Some(b.host_port.to_string()),
            })
            .collect::<Vec<_>>();
        exposed_ports.insert(key.clone(), HashMap::new());
        port_bindings.insert(key, Some(bindings));
    }

    let binds = req
        .volumes
        .iter()
        .map(|(host, vol)| format!("{host}:{}:{}", vol.bind, vol.mode.as_str()))
        .collect::<Vec<_>>();

    let env = req
        .environment
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>();

    let host_config = HostConfig {
        port_bindings: (!port_bindings.is_empty()).then_some(port_bindings),
        binds: (!binds.is_empty()).then_some(binds),
        restart_policy: restart_policy(req),
        network_mode: req.network_mode.clone().or_else(|| req.network.clone()),
        pid_mode: req.pid_mode.clone(),
        ipc_mode: req.ipc_mode.clone(),
        privileged: Some(false),
        cap_add: (!req.cap_add.is_empty()).then(|| req.cap_add.clone()),
        memory: req.memory_bytes().map_err(invalid)?,
        cpu_period: req.cpu_period,
        cpu_quota: req.cpu_quota,
        ..Default::default()
    };

    Ok(Config {
        image: Some(req.image.clone()),
        cmd: req.command.as_ref().map(|c| c.to_args()).transpose().map_err(invalid)?,
        entrypoint: req
            .entrypoint
            .as_ref()
            .map(|c| c.to_args())
            .transpose()
            .map_err(invalid)?,
        env: (!env.is_empty()).then_some(env),
        labels: Some(req.labels.clone().into_iter().collect()),
        exposed_ports: (!exposed_ports.is_empty()).then_some(exposed_ports),
        working_dir: req.working_dir.clone(),
        user: req.user.clone(),
        hostname: req.hostname.clone(),
        host_config: Some(host_config),
        ..Default::default()
    })
}

fn state_str(status: Option<ContainerStateStatusEnum>) -> String {
    match status {
        Some(ContainerStateStatusEnum::CREATED) => "created",
        Some(ContainerStateStatusEnum::RUNNING) => "running",
        Some(ContainerStateStatusEnum::PAUSED) => "paused",
        Some(ContainerStateStatusEnum::RESTARTING) => "restarting",
        Some(ContainerStateStatusEnum::REMOVING) => "removing",
        Some(ContainerStateStatusEnum::EXITED) => "exited",
        Some(ContainerStateStatusEnum::DEAD) => "dead",
        Some(ContainerStateStatusEnum::EMPTY) | None => "unknown",
    }
    .to_string()
}

fn trim_name(name: &str) -> String {
    name.trim_start_matches('/').to_string()
}

fn record_from_inspect(info: ContainerInspectResponse) -> ContainerRecord {
    let config = info.config.unwrap_or_default();
    let mut ports = BTreeMap::new();
    if let Some(map) = info.network_settings.and_then(|n| n.ports) {
        for (key, bindings) in map {
            let bindings = bindings
                .unwrap_or_default()
                .into_iter()
                .map(|b| HostBinding {
                    host_ip: b.host_ip.unwrap_or_default(),
                    host_port: b.host_port.unwrap_or_default(),
                })
                .collect();
            ports.insert(key, bindings);
        }
    }

    ContainerRecord {
        id: info.id.unwrap_or_default(),
        name: info.name.as_deref().map(trim_name).unwrap_or_default(),
        image: config.image.unwrap_or_default(),
        state: state_str(info.state.and_then(|s| s.status)),
        created: info
            .created
            .as_deref()
            .and_then(|c| DateTime::parse_from_rfc3339(c).ok())
            .map(|c| c.with_timezone(&Utc)),
        labels: config.labels.unwrap_or_default().into_iter().collect(),
        ports,
    }
}

fn record_from_summary(summary: ContainerSummary) -> ContainerRecord {
    let mut ports: BTreeMap<String, Vec<HostBinding>> = BTreeMap::new();
    for p in summary.ports.unwrap_or_default() {
        let proto = match p.typ {
            Some(PortTypeEnum::UDP) => "udp",
            Some(PortTypeEnum::SCTP) => "sctp",
            Some(PortTypeEnum::TCP) | Some(PortTypeEnum::EMPTY) | None => "tcp",
        };
        let entry = ports.entry(format!("{}/{proto}", p.private_port)).or_default();
        if let Some(public) = p.public_port {
            entry.push(HostBinding {
                host_ip: p.ip.unwrap_or_default(),
                host_port: public.to_string(),
            });
        }
    }

    ContainerRecord {
        id: summary.id.unwrap_or_default(),
        name: summary
            .names
            .and_then(|n| n.into_iter().next())
            .as_deref()
            .map(trim_name)
            .unwrap_or_default(),
        image: summary.image.unwrap_or_default(),
        state: summary.state.unwrap_or_else(|| "unknown".into()),
        created: summary.created.and_then(|secs| DateTime::from_timestamp(secs, 0)),
        labels: summary.labels.unwrap_or_default().into_iter().collect(),
        ports,
    }
}

fn grace_secs(grace: Duration) -> i64 {
    i64::try_from(grace.as_secs()).unwrap_or(i64::MAX)
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn ping(&self) -> RuntimeResult<()> {
        self.docker.ping().await.map(|_| ()).map_err(map_docker_err)
    }

    async fn create(&self, spec: CreateSpec) -> RuntimeResult<CreatedContainer> {
        let req = spec.request();
        let config = container_config(req)?;
        let options = req.name.clone().map(|name| CreateContainerOptions {
            name,
            ..Default::default()
        });

        let created = self
            .docker
            .create_container(options, config)
            .await
            .map_err(|e| map_create_err(e, &req.image))?;

        let name = match &req.name {
            Some(n) => n.clone(),
            None => self
                .docker
                .inspect_container(&created.id, None::<InspectContainerOptions>)
                .await
                .ok()
                .and_then(|info| info.name)
                .as_deref()
                .map(trim_name)
                .unwrap_or_default(),
        };

        Ok(CreatedContainer {
            id: created.id,
            name,
            warnings: created.warnings,
        })
    }

    async fn start(&self, id: &str) -> RuntimeResult<()> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .map_err(map_docker_err)
    }

    async fn stop(&self, id: &str, grace: Duration) -> RuntimeResult<()> {
        let options = StopContainerOptions { t: grace_secs(grace) };
        self.docker
            .stop_container(id, Some(options))
            .await
            .map_err(map_docker_err)
    }

    async fn restart(&self, id: &str, grace: Duration) -> RuntimeResult<()> {
        let t = isize::try_from(grace.as_secs()).unwrap_or(isize::MAX);
        self.docker
            .restart_container(id, Some(RestartContainerOptions { t }))
            .await
            .map_err(map_docker_err)
    }

    async fn remove(&self, id: &str, opts: RemoveOptions) -> RuntimeResult<()> {
        let options = RemoveContainerOptions {
            force: opts.force,
            v: opts.volumes,
            ..Default::default()
        };
        self.docker
            .remove_container(id, Some(options))
            .await
            .map_err(map_docker_err)
    }

    async fn inspect(&self, id: &str) -> RuntimeResult<ContainerRecord> {
        self.docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
            .map(record_from_inspect)
            .map_err(map_docker_err)
    }

    async fn list(&self, label_filters: &[String], all: bool) -> RuntimeResult<Vec<ContainerRecord>> {
        let mut filters = HashMap::new();
        if !label_filters.is_empty() {
            filters.insert("label".to_string(), label_filters.to_vec());
        }
        let options = ListContainersOptions {
            all,
            filters,
            ..Default::default()
        };
        let summaries = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(map_docker_err)?;
        Ok(summaries.into_iter().map(record_from_summary).collect())
    }

    async fn logs(&self, id: &str, opts: LogOptions) -> RuntimeResult<LogStream> {
        // The log endpoint doesn't report a missing container until the
        // stream is polled; resolve first so that surfaces as NotFound.
        self.inspect(id).await?;

        let options = LogsOptions::<String> {
            follow: opts.follow,
            stdout: opts.stdout,
            stderr: opts.stderr,
            since: opts.since.unwrap_or(0),
            until: opts.until.unwrap_or(0),
            timestamps: false,
            tail: opts.tail.map_or_else(|| "all".to_string(), |n| n.to_string()),
        };
        let stream = self
            .docker
            .logs(id, Some(options))
            .map_ok(|chunk| chunk.into_bytes())
            .map_err(map_docker_err);
        Ok(stream.boxed())
    }

    async fn stats(&self, id: &str) -> RuntimeResult<UsageSample> {
        let options = StatsOptions {
            stream: false,
            one_shot: false,
        };
        let mut stream = Box::pin(self.docker.stats(id, Some(options)));
        let stats = match stream.next().await {
            Some(res) => res.map_err(map_docker_err)?,
            None => return Err(RuntimeError::Unexpected("empty stats response".into())),
        };

        let (rx, tx) = stats
            .networks
            .unwrap_or_default()
            .values()
            .fold((0u64, 0u64), |(rx, tx), n| (rx + n.rx_bytes, tx + n.tx_bytes));

        Ok(UsageSample {
            cpu_total: stats.cpu_stats.cpu_usage.total_usage,
            precpu_total: stats.precpu_stats.cpu_usage.total_usage,
            system_cpu: stats.cpu_stats.system_cpu_usage.unwrap_or(0),
            presystem_cpu: stats.precpu_stats.system_cpu_usage.unwrap_or(0),
            online_cpus: stats.cpu_stats.online_cpus.unwrap_or(1),
            memory_usage: stats.memory_stats.usage.unwrap_or(0),
            memory_limit: stats.memory_stats.limit.unwrap_or(0),
            network_rx_bytes: rx,
            network_tx_bytes: tx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dockfence_core::model::{PortSpec, RestartPolicy, VolumeConfig};

    #[test]
    fn config_carries_bindings_and_never_privileged() {
        let mut req = CreationRequest::for_image("nginx:alpine");
        req.ports.insert("80".into(), PortSpec::HostPort(8080));
        req.volumes.insert(
            "/srv/data".into(),
            VolumeConfig {
                bind: "/data".into(),
                mode: dockfence_core::model::MountMode::Ro,
            },
        );
        req.restart_policy = Some(RestartPolicy {
            name: RestartPolicyName::OnFailure,
            maximum_retry_count: 3,
        });
        req.mem_limit = Some("256m".into());

        let cfg = container_config(&req).unwrap();
        let host = cfg.host_config.unwrap();
        assert_eq!(host.privileged, Some(false));
        assert_eq!(host.binds.unwrap(), vec!["/srv/data:/data:ro".to_string()]);
        let bindings = host.port_bindings.unwrap();
        let b = bindings["80/tcp"].as_ref().unwrap();
        assert_eq!(b[0].host_port.as_deref(), Some("8080"));
        assert_eq!(host.memory, Some(256 * 1024 * 1024));
        assert_eq!(host.restart_policy.unwrap().maximum_retry_count, Some(3));
        assert!(cfg.exposed_ports.unwrap().contains_key("80/tcp"));
    }

    #[test]
    fn server_errors_map_by_status() {
        let e = |status_code| DockerError::DockerResponseServerError {
            status_code,
            message: "m".into(),
        };
        assert!(matches!(map_docker_err(e(304)), RuntimeError::NotModified));
        assert!(matches!(map_docker_err(e(404)), RuntimeError::NotFound(_)));
        assert!(matches!(map_docker_err(e(409)), RuntimeError::Conflict(_)));
        assert!(matches!(map_docker_err(e(500)), RuntimeError::Unexpected(_)));
    }

    #[test]
    fn create_not_found_means_image_only_when_daemon_says_so() {
        let e = |message: &str| DockerError::DockerResponseServerError {
            status_code: 404,
            message: message.into(),
        };
        match map_create_err(e("No such image: nginx:latest"), "nginx") {
            RuntimeError::ImageNotFound(image) => assert_eq!(image, "nginx"),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(
            map_create_err(e("network nosuchnet not found"), "nginx"),
            RuntimeError::Unexpected(_)
        ));
        let conflict = DockerError::DockerResponseServerError {
            status_code: 409,
            message: "name in use".into(),
        };
        assert!(matches!(
            map_create_err(conflict, "nginx"),
            RuntimeError::Conflict(_)
        ));
    }
}
