// The core facade the HTTP layer talks to: cached reads per domain, lifecycle control and logs.

use futures_util::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::aggregate::{ServiceCatalog, build_service_records, running_ids};
use crate::cache::{Served, SnapshotCache};
use crate::config::{AppConfig, ProbeBackend};
use crate::error::CollectError;
use crate::host_repo::HostRepo;
use crate::models::{
    ContainerRow, ControlAction, ControlResponse, Domain, GpuRecord, NvidiaInfo, ServiceRecord,
    StatsRow, SystemSnapshot,
};
use crate::parse::{
    parse_container_rows, parse_cuda_driver, parse_cuda_toolkit, parse_driver_rows,
    parse_gpu_rows, parse_stats_rows,
};
use crate::probe::{CliProbe, DockerApiProbe, Probe, ProbeRequest};

pub struct Collector {
    probe: Arc<dyn Probe>,
    host: HostRepo,
    catalog: ServiceCatalog,
    disk_mount: String,
    default_log_tail: usize,
    max_log_tail: usize,
    services: SnapshotCache<Vec<ServiceRecord>>,
    gpu: SnapshotCache<Vec<GpuRecord>>,
    system: SnapshotCache<SystemSnapshot>,
}

impl Collector {
    pub fn new(config: &AppConfig, probe: Arc<dyn Probe>) -> Self {
        Self {
            probe,
            host: HostRepo::new(),
            catalog: config.services.catalog(),
            disk_mount: config.system.disk_mount.clone(),
            default_log_tail: config.services.default_log_tail,
            max_log_tail: config.services.max_log_tail,
            services: SnapshotCache::new(Domain::Services, config.cache.services_ttl()),
            gpu: SnapshotCache::new(Domain::Gpu, config.cache.gpu_ttl()),
            system: SnapshotCache::new(Domain::System, config.cache.system_ttl()),
        }
    }

    /// Build with the probe backend named in `[probes]`.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let probe: Arc<dyn Probe> = match config.probes.backend {
            ProbeBackend::Cli => Arc::new(CliProbe::new(&config.probes)),
            ProbeBackend::Api => Arc::new(DockerApiProbe::connect(&config.probes)?),
        };
        info!(backend = ?config.probes.backend, "probe backend ready");
        Ok(Self::new(config, probe))
    }

    #[instrument(skip(self), fields(domain = "services"))]
    pub async fn get_service_records(&self) -> Result<Served<Vec<ServiceRecord>>, CollectError> {
        self.services
            .get_or_refresh(|| self.collect_services())
            .await
    }

    #[instrument(skip(self), fields(domain = "gpu"))]
    pub async fn get_gpu_metrics(&self) -> Result<Served<Vec<GpuRecord>>, CollectError> {
        self.gpu.get_or_refresh(|| self.collect_gpus()).await
    }

    #[instrument(skip(self), fields(domain = "system"))]
    pub async fn get_system_snapshot(&self) -> Result<Served<SystemSnapshot>, CollectError> {
        self.system.get_or_refresh(|| self.collect_system()).await
    }

    /// Last GPU snapshot, if any, without probing.
    pub async fn cached_gpu_metrics(&self) -> Option<Served<Vec<GpuRecord>>> {
        self.gpu.peek().await
    }

    /// Start, stop or restart a visible service. Returns once the runtime accepted the command.
    #[instrument(skip(self))]
    pub async fn control_service(
        &self,
        name: &str,
        action: &str,
    ) -> Result<ControlResponse, CollectError> {
        let action: ControlAction = action.parse()?;
        let row = self.find_visible(name).await?;
        self.probe
            .run(&ProbeRequest::Control {
                name: row.name.clone(),
                action,
            })
            .await?;
        self.services.invalidate().await;
        info!(service = %row.name, %action, "control command sent");
        Ok(ControlResponse::success(&row.name, action))
    }

    /// Last `tail` log lines of a visible service, oldest first. Never cached.
    #[instrument(skip(self))]
    pub async fn get_logs(
        &self,
        name: &str,
        tail: Option<usize>,
    ) -> Result<Vec<String>, CollectError> {
        let tail = tail.unwrap_or(self.default_log_tail).min(self.max_log_tail);
        let row = self.find_visible(name).await?;
        let raw = self
            .probe
            .run(&ProbeRequest::Logs {
                name: row.name,
                tail,
            })
            .await?;
        Ok(raw.lines().map(str::to_string).collect())
    }

    async fn list_rows(&self) -> Result<Vec<ContainerRow>, CollectError> {
        let raw = self.probe.run(&ProbeRequest::ListContainers).await?;
        Ok(parse_container_rows(&raw).into_result("container list")?)
    }

    async fn find_visible(&self, name: &str) -> Result<ContainerRow, CollectError> {
        self.list_rows()
            .await?
            .into_iter()
            .find(|r| r.name == name && self.catalog.is_visible(r))
            .ok_or_else(|| CollectError::NotFound(name.to_string()))
    }

    async fn collect_services(&self) -> Result<Vec<ServiceRecord>, CollectError> {
        let rows = self.list_rows().await?;
        let stats = self.collect_stats(running_ids(&rows, &self.catalog)).await;
        Ok(build_service_records(&rows, &stats, &self.catalog))
    }

    /// One bulk query; if that fails, one query per container, run concurrently.
    /// Stats are best effort: failures leave the affected records without stats.
    async fn collect_stats(&self, ids: Vec<String>) -> Vec<StatsRow> {
        if ids.is_empty() {
            return Vec::new();
        }
        let bulk = ProbeRequest::BulkStats { ids: ids.clone() };
        let error = match self.probe.run(&bulk).await {
            Ok(raw) => match parse_stats_rows(&raw).into_result("bulk stats") {
                Ok(rows) => return rows,
                Err(e) => CollectError::from(e),
            },
            Err(e) => CollectError::from(e),
        };
        warn!(error = %error, containers = ids.len(), "bulk stats failed; querying containers one by one");

        let per_container = ids.into_iter().map(|id| async move {
            let request = ProbeRequest::ContainerStats { id };
            match self.probe.run(&request).await {
                Ok(raw) => parse_stats_rows(&raw).records,
                Err(e) => {
                    warn!(error = %e, "container stats failed");
                    Vec::new()
                }
            }
        });
        join_all(per_container).await.into_iter().flatten().collect()
    }

    async fn collect_gpus(&self) -> Result<Vec<GpuRecord>, CollectError> {
        let raw = self.probe.run(&ProbeRequest::GpuMetrics).await?;
        Ok(parse_gpu_rows(&raw).into_result("gpu metrics")?)
    }

    async fn collect_system(&self) -> Result<SystemSnapshot, CollectError> {
        let (host, nvidia, gpus) = tokio::join!(
            self.host.host_stats(&self.disk_mount),
            self.nvidia_info(),
            self.get_gpu_metrics(),
        );
        let host = host.map_err(CollectError::Host)?;
        let gpus = match gpus {
            Ok(served) => served.data.as_ref().clone(),
            Err(e) => {
                debug!(error = %e, "no gpu metrics for system snapshot");
                Vec::new()
            }
        };
        Ok(SystemSnapshot::assemble(
            host,
            nvidia,
            gpus,
            chrono::Utc::now(),
        ))
    }

    /// `None` when none of the NVIDIA tools answered.
    async fn nvidia_info(&self) -> Option<NvidiaInfo> {
        let (driver, cuda, toolkit) = tokio::join!(
            self.probe_text(ProbeRequest::GpuDriver),
            self.probe_text(ProbeRequest::CudaDriver),
            self.probe_text(ProbeRequest::CudaToolkit),
        );
        if driver.is_none() && cuda.is_none() && toolkit.is_none() {
            return None;
        }
        let devices = driver
            .map(|raw| parse_driver_rows(&raw).records)
            .unwrap_or_default();
        Some(NvidiaInfo {
            driver_version: devices.first().map(|(version, _)| version.clone()),
            cuda_driver: cuda.as_deref().and_then(parse_cuda_driver),
            cuda_toolkit: toolkit.as_deref().and_then(parse_cuda_toolkit),
            gpu_names: devices.into_iter().map(|(_, name)| name).collect(),
        })
    }

    async fn probe_text(&self, request: ProbeRequest) -> Option<String> {
        match self.probe.run(&request).await {
            Ok(raw) => Some(raw),
            Err(e) => {
                debug!(error = %e, "optional probe failed");
                None
            }
        }
    }
}
