//! Docker Engine backend built on bollard

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use bollard::errors::Error as BollardError;
use bollard::models::{
    ContainerCreateBody, ContainerInspectResponse, ContainerStatsResponse, HostConfig, PortBinding,
};
use bollard::query_parameters::{
    CreateContainerOptionsBuilder, CreateImageOptionsBuilder, InspectContainerOptions,
    ListContainersOptionsBuilder, LogsOptionsBuilder, RemoveContainerOptionsBuilder,
    RestartContainerOptions, StartContainerOptions, StatsOptionsBuilder, StopContainerOptions,
    WaitContainerOptions,
};
use bollard::{Docker, API_DEFAULT_VERSION};
use tokio_stream::StreamExt;
use tracing::{debug, info};

use super::{ContainerInfo, ContainerRuntime, ContainerStats, RunSpec};
use crate::config::DockerConfig;
use crate::error::RuntimeError;

/// Where to find the Docker daemon
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DockerEndpoint {
    /// `DOCKER_HOST` or the platform default socket
    Local,
    UnixSocket(String),
    Http(String),
}

impl DockerEndpoint {
    pub fn parse(raw: &str) -> Result<Self, RuntimeError> {
        let raw = raw.trim();
        if raw.is_empty() || raw == "local" {
            Ok(DockerEndpoint::Local)
        } else if let Some(path) = raw.strip_prefix("unix://") {
            Ok(DockerEndpoint::UnixSocket(path.to_string()))
        } else if let Some(addr) = raw.strip_prefix("tcp://") {
            Ok(DockerEndpoint::Http(format!("http://{addr}")))
        } else if raw.starts_with("http://") {
            Ok(DockerEndpoint::Http(raw.to_string()))
        } else {
            Err(RuntimeError::Transport(format!(
                "unsupported docker endpoint '{raw}'"
            )))
        }
    }
}

impl From<BollardError> for RuntimeError {
    fn from(error: BollardError) -> Self {
        match error {
            BollardError::DockerResponseServerError {
                status_code: 404,
                message,
            } => RuntimeError::NotFound(message),
            BollardError::DockerResponseServerError {
                status_code,
                message,
            } => RuntimeError::Api {
                status: status_code,
                message,
            },
            BollardError::DockerContainerWaitError { error, code } => RuntimeError::Api {
                status: 500,
                message: format!("container exited with code {code}: {error}"),
            },
            other => RuntimeError::Transport(other.to_string()),
        }
    }
}

/// Container runtime backed by a Docker Engine daemon
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Open the daemon connection described by `config`. No request is sent
    /// until the first call; use `ping` to verify reachability.
    pub fn connect(config: &DockerConfig) -> Result<Self, RuntimeError> {
        let endpoint = DockerEndpoint::parse(&config.endpoint)?;
        let docker = match &endpoint {
            DockerEndpoint::Local => Docker::connect_with_local_defaults()?,
            DockerEndpoint::UnixSocket(path) => {
                Docker::connect_with_socket(path, config.timeout_secs, API_DEFAULT_VERSION)?
            }
            DockerEndpoint::Http(addr) => {
                Docker::connect_with_http(addr, config.timeout_secs, API_DEFAULT_VERSION)?
            }
        };
        info!("Docker client configured for {:?}", endpoint);
        Ok(Self::from_client(
            docker.with_timeout(Duration::from_secs(config.timeout_secs)),
        ))
    }

    pub fn from_client(docker: Docker) -> Self {
        Self { docker }
    }

    async fn create(&self, spec: &RunSpec) -> Result<String, BollardError> {
        let options = spec
            .name
            .as_deref()
            .map(|name| CreateContainerOptionsBuilder::new().name(name).build());

        let response = self.docker.create_container(options, create_body(spec)).await?;
        Ok(response.id)
    }

    async fn pull(&self, image: &str) -> Result<(), BollardError> {
        let (from_image, tag) = split_image_tag(image);
        info!("Pulling image {from_image}:{tag}");
        let options = CreateImageOptionsBuilder::new()
            .from_image(from_image)
            .tag(tag)
            .build();
        let stream = self.docker.create_image(Some(options), None, None);
        tokio::pin!(stream);
        while let Some(progress) = stream.next().await {
            progress?;
        }
        Ok(())
    }

    async fn wait_for_exit(&self, id: &str) -> Result<(), BollardError> {
        let stream = self.docker.wait_container(id, None::<WaitContainerOptions>);
        tokio::pin!(stream);
        while let Some(status) = stream.next().await {
            status?;
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn ping(&self) -> Result<(), RuntimeError> {
        self.docker.ping().await?;
        Ok(())
    }

    async fn inspect(&self, reference: &str) -> Result<ContainerInfo, RuntimeError> {
        let response = self
            .docker
            .inspect_container(reference, None::<InspectContainerOptions>)
            .await?;
        container_info(response)
    }

    async fn list(&self, include_stopped: bool) -> Result<Vec<ContainerInfo>, RuntimeError> {
        let options = ListContainersOptionsBuilder::new()
            .all(include_stopped)
            .build();
        let summaries = self.docker.list_containers(Some(options)).await?;

        let mut containers = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let Some(id) = summary.id else { continue };
            match self.inspect(&id).await {
                Ok(info) => containers.push(info),
                // Removed between the listing and the inspect
                Err(RuntimeError::NotFound(_)) => debug!("container {id} vanished while listing"),
                Err(err) => return Err(err),
            }
        }
        Ok(containers)
    }

    async fn create_and_run(&self, spec: RunSpec) -> Result<ContainerInfo, RuntimeError> {
        let id = match self.create(&spec).await {
            Ok(id) => id,
            Err(BollardError::DockerResponseServerError {
                status_code: 404, ..
            }) => {
                self.pull(&spec.image).await?;
                self.create(&spec).await?
            }
            Err(err) => return Err(err.into()),
        };

        self.docker
            .start_container(&id, None::<StartContainerOptions>)
            .await?;

        if !spec.detach {
            self.wait_for_exit(&id).await?;
        }

        self.inspect(&id).await
    }

    async fn logs(&self, id: &str, tail: Option<u64>) -> Result<Vec<u8>, RuntimeError> {
        let tail = tail.map_or_else(|| "all".to_string(), |n| n.to_string());
        let options = LogsOptionsBuilder::new()
            .stdout(true)
            .stderr(true)
            .timestamps(false)
            .tail(&tail)
            .build();

        let stream = self.docker.logs(id, Some(options));
        tokio::pin!(stream);
        let mut buf = Vec::new();
        while let Some(chunk) = stream.next().await {
            buf.extend_from_slice(&chunk?.into_bytes());
        }
        Ok(buf)
    }

    async fn start(&self, id: &str) -> Result<(), RuntimeError> {
        self.docker
            .start_container(id, None::<StartContainerOptions>)
            .await?;
        Ok(())
    }

    async fn stop(&self, id: &str) -> Result<(), RuntimeError> {
        self.docker
            .stop_container(id, None::<StopContainerOptions>)
            .await?;
        Ok(())
    }

    async fn restart(&self, id: &str) -> Result<(), RuntimeError> {
        self.docker
            .restart_container(id, None::<RestartContainerOptions>)
            .await?;
        Ok(())
    }

    async fn stats(&self, id: &str) -> Result<ContainerStats, RuntimeError> {
        let options = StatsOptionsBuilder::new().stream(false).build();
        let stream = self.docker.stats(id, Some(options));
        tokio::pin!(stream);
        let sample = stream
            .next()
            .await
            .ok_or_else(|| RuntimeError::Unexpected(format!("no stats returned for {id}")))??;
        stats_from_sample(&sample)
    }

    async fn remove(&self, id: &str, force: bool) -> Result<(), RuntimeError> {
        let options = RemoveContainerOptionsBuilder::new().force(force).build();
        self.docker.remove_container(id, Some(options)).await?;
        Ok(())
    }
}

fn container_info(response: ContainerInspectResponse) -> Result<ContainerInfo, RuntimeError> {
    let id = response
        .id
        .ok_or_else(|| RuntimeError::Unexpected("inspect response has no container id".into()))?;
    let name = response
        .name
        .map(|n| n.trim_start_matches('/').to_string())
        .unwrap_or_default();
    let status = response
        .state
        .and_then(|state| state.status)
        .map(|status| status.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    Ok(ContainerInfo { id, name, status })
}

/// Pull the two counters the stats tool reports out of a sample
fn stats_from_sample(sample: &ContainerStatsResponse) -> Result<ContainerStats, RuntimeError> {
    let missing = |field: &str| RuntimeError::Unexpected(format!("stats sample has no {field}"));
    let cpu_usage_total = sample
        .cpu_stats
        .as_ref()
        .and_then(|cpu| cpu.cpu_usage.as_ref())
        .and_then(|usage| usage.total_usage)
        .ok_or_else(|| missing("cpu_stats.cpu_usage.total_usage"))?;
    let memory_usage_bytes = sample
        .memory_stats
        .as_ref()
        .and_then(|memory| memory.usage)
        .ok_or_else(|| missing("memory_stats.usage"))?;
    Ok(ContainerStats {
        cpu_usage_total,
        memory_usage_bytes,
    })
}

/// Container config for `spec`. Published ports are exposed as well as bound.
fn create_body(spec: &RunSpec) -> ContainerCreateBody {
    let ports = spec.ports.as_ref();
    ContainerCreateBody {
        image: Some(spec.image.clone()),
        exposed_ports: ports.map(|ports| {
            ports
                .keys()
                .map(|container_port| (port_key(container_port), HashMap::new()))
                .collect()
        }),
        host_config: ports.map(|ports| HostConfig {
            port_bindings: Some(port_bindings(ports)),
            ..HostConfig::default()
        }),
        ..ContainerCreateBody::default()
    }
}

fn port_bindings(ports: &BTreeMap<String, u16>) -> HashMap<String, Option<Vec<PortBinding>>> {
    ports
        .iter()
        .map(|(container_port, host_port)| {
            let binding = PortBinding {
                host_ip: None,
                host_port: Some(host_port.to_string()),
            };
            (port_key(container_port), Some(vec![binding]))
        })
        .collect()
}

/// `"<port>/<proto>"`, with tcp when no protocol is given
fn port_key(container_port: &str) -> String {
    if container_port.contains('/') {
        container_port.to_string()
    } else {
        format!("{container_port}/tcp")
    }
}

/// Split `repo[:tag]`, ignoring a colon that belongs to a registry port
fn split_image_tag(image: &str) -> (&str, &str) {
    match image.rsplit_once(':') {
        Some((repo, tag)) if !tag.contains('/') => (repo, tag),
        _ => (image, "latest"),
    }
}
