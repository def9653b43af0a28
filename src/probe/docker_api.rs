// Probe backend that talks to the Docker Engine API via bollard.
// Output is rendered in the same delimited text as the CLI so parsing is shared.

use async_trait::async_trait;
use bollard::Docker;
use bollard::query_parameters::{
    ListContainersOptions, LogsOptions, RestartContainerOptions, StartContainerOptions,
    StatsOptions, StopContainerOptions,
};
use futures_util::StreamExt;
use futures_util::future::join_all;
use std::fmt::Write;
use std::future::Future;
use tracing::{instrument, warn};

use super::stats::resource_stats;
use super::{CliProbe, FIELD_SEP, Probe, ProbeError, ProbeErrorKind, ProbeRequest, ProbeTimeouts};
use crate::config::ProbeConfig;
use crate::models::ControlAction;

/// Length the CLI truncates container ids to.
const SHORT_ID_LEN: usize = 12;

pub struct DockerApiProbe {
    docker: Docker,
    /// GPU tools have no API; those requests still go through the CLI.
    gpu: CliProbe,
    timeouts: ProbeTimeouts,
}

impl DockerApiProbe {
    pub fn connect(config: &ProbeConfig) -> anyhow::Result<Self> {
        let docker = Docker::connect_with_unix_defaults()?;
        Ok(Self {
            docker,
            gpu: CliProbe::new(config),
            timeouts: config.timeouts(),
        })
    }

    async fn bounded<T, F>(&self, request: &ProbeRequest, fut: F) -> Result<T, ProbeError>
    where
        F: Future<Output = Result<T, bollard::errors::Error>>,
    {
        let limit = request.timeout(&self.timeouts);
        match tokio::time::timeout(limit, fut).await {
            Ok(r) => r.map_err(|e| api_error(request, e)),
            Err(_) => Err(ProbeError::timeout(request, limit)),
        }
    }

    async fn list_containers(&self) -> Result<String, bollard::errors::Error> {
        let options = ListContainersOptions {
            all: true,
            ..Default::default()
        };
        let containers = self.docker.list_containers(Some(options)).await?;

        let mut out = String::new();
        for c in &containers {
            let id = short_id(c.id.as_deref().unwrap_or_default());
            let name = c
                .names
                .as_ref()
                .and_then(|n| n.first())
                .map(|n| n.trim_start_matches('/'))
                .unwrap_or(id);
            let ports = c
                .ports
                .as_deref()
                .unwrap_or_default()
                .iter()
                .filter_map(|p| {
                    let public = p.public_port?;
                    let ip = p.ip.as_deref().unwrap_or("0.0.0.0");
                    Some(format!("{}:{}->{}", ip, public, p.private_port))
                })
                .collect::<Vec<_>>()
                .join(", ");
            let mut networks: Vec<&str> = c
                .network_settings
                .as_ref()
                .and_then(|s| s.networks.as_ref())
                .map(|n| n.keys().map(String::as_str).collect())
                .unwrap_or_default();
            networks.sort_unstable();
            let _ = writeln!(
                out,
                "{id}{sep}{name}{sep}{status}{sep}{image}{sep}{ports}{sep}{networks}",
                sep = FIELD_SEP,
                status = c.status.as_deref().unwrap_or_default(),
                image = c.image.as_deref().unwrap_or_default(),
                networks = networks.join(","),
            );
        }
        Ok(out)
    }

    /// One `id|cpu%|mem%` line. A non-streaming request makes the daemon sample twice,
    /// so the precpu counters are populated.
    async fn stats_line(&self, id: &str) -> Result<String, bollard::errors::Error> {
        let options = StatsOptions {
            stream: false,
            ..Default::default()
        };
        let mut stream = self.docker.stats(id, Some(options));
        let Some(first) = stream.next().await else {
            return Ok(String::new());
        };
        let stats = resource_stats(&first?);
        Ok(format!(
            "{}{sep}{}{sep}{}\n",
            short_id(id),
            render_percent(stats.cpu_percent),
            render_percent(stats.memory_percent),
            sep = FIELD_SEP,
        ))
    }

    async fn bulk_stats(&self, ids: &[String]) -> Result<String, bollard::errors::Error> {
        let results = join_all(ids.iter().map(|id| self.stats_line(id))).await;
        let mut out = String::new();
        let mut last_err = None;
        for (id, r) in ids.iter().zip(results) {
            match r {
                Ok(line) => out.push_str(&line),
                Err(e) => {
                    warn!(container = %id, error = %e, "stats request failed");
                    last_err = Some(e);
                }
            }
        }
        match last_err {
            Some(e) if out.is_empty() => Err(e),
            _ => Ok(out),
        }
    }

    async fn control(
        &self,
        name: &str,
        action: ControlAction,
    ) -> Result<String, bollard::errors::Error> {
        match action {
            ControlAction::Start => {
                self.docker
                    .start_container(name, None::<StartContainerOptions>)
                    .await?
            }
            ControlAction::Stop => {
                self.docker
                    .stop_container(name, None::<StopContainerOptions>)
                    .await?
            }
            ControlAction::Restart => {
                self.docker
                    .restart_container(name, None::<RestartContainerOptions>)
                    .await?
            }
        }
        Ok(format!("{}\n", name))
    }

    async fn logs(&self, name: &str, tail: usize) -> Result<String, bollard::errors::Error> {
        let options = LogsOptions {
            stdout: true,
            stderr: true,
            timestamps: true,
            tail: tail.to_string(),
            ..Default::default()
        };
        let mut stream = self.docker.logs(name, Some(options));
        let mut out = String::new();
        while let Some(chunk) = stream.next().await {
            out.push_str(&String::from_utf8_lossy(&chunk?.into_bytes()));
        }
        Ok(out)
    }
}

#[async_trait]
impl Probe for DockerApiProbe {
    #[instrument(skip(self), fields(repo = "docker_api", domain = %request.domain(), operation = request.operation()))]
    async fn run(&self, request: &ProbeRequest) -> Result<String, ProbeError> {
        match request {
            ProbeRequest::ListContainers => self.bounded(request, self.list_containers()).await,
            ProbeRequest::BulkStats { ids } => self.bounded(request, self.bulk_stats(ids)).await,
            ProbeRequest::ContainerStats { id } => {
                self.bounded(request, self.stats_line(id)).await
            }
            ProbeRequest::Control { name, action } => {
                self.bounded(request, self.control(name, *action)).await
            }
            ProbeRequest::Logs { name, tail } => {
                self.bounded(request, self.logs(name, *tail)).await
            }
            ProbeRequest::GpuMetrics
            | ProbeRequest::GpuDriver
            | ProbeRequest::CudaDriver
            | ProbeRequest::CudaToolkit => self.gpu.run(request).await,
        }
    }
}

fn short_id(id: &str) -> &str {
    id.get(..SHORT_ID_LEN).unwrap_or(id)
}

/// Same shape as the CLI: "12.34%", or "--" when there is no reading.
fn render_percent(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}%", v),
        None => "--".into(),
    }
}

fn api_error(request: &ProbeRequest, e: bollard::errors::Error) -> ProbeError {
    match e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } => ProbeError::new(
            ProbeErrorKind::NonZeroExit,
            request,
            format!("daemon returned {}: {}", status_code, message),
        ),
        other => ProbeError::new(ProbeErrorKind::Io, request, other.to_string()),
    }
}
