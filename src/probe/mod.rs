// Telemetry probes: one bounded call to an external tool per request.

mod cli;
mod docker_api;
mod stats;

pub use cli::CliProbe;
pub use docker_api::DockerApiProbe;
pub use stats::{cpu_percent, memory_percent};

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::models::{ControlAction, Domain};

/// Field separator used by every container-domain probe output.
pub const FIELD_SEP: char = '|';

/// Everything the core can ask of the outside world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeRequest {
    /// `id|name|status|image|ports|networks` per container, including stopped ones.
    ListContainers,
    /// `id|cpu%|mem%` per running container, in one call.
    BulkStats { ids: Vec<String> },
    /// `id|cpu%|mem%` for one container.
    ContainerStats { id: String },
    /// CSV rows: index, name, temperature, gpu util, mem util, mem used, mem total, power draw, power limit.
    GpuMetrics,
    /// CSV rows: driver version, gpu name.
    GpuDriver,
    /// Free-form banner that contains "CUDA Version: X.Y".
    CudaDriver,
    /// Toolkit compiler banner that contains "release X.Y".
    CudaToolkit,
    Control { name: String, action: ControlAction },
    Logs { name: String, tail: usize },
}

impl ProbeRequest {
    pub fn domain(&self) -> Domain {
        match self {
            ProbeRequest::ListContainers
            | ProbeRequest::BulkStats { .. }
            | ProbeRequest::ContainerStats { .. }
            | ProbeRequest::Control { .. }
            | ProbeRequest::Logs { .. } => Domain::Services,
            ProbeRequest::GpuMetrics => Domain::Gpu,
            ProbeRequest::GpuDriver | ProbeRequest::CudaDriver | ProbeRequest::CudaToolkit => {
                Domain::System
            }
        }
    }

    /// Short label for logs and errors.
    pub fn operation(&self) -> &'static str {
        match self {
            ProbeRequest::ListContainers => "list_containers",
            ProbeRequest::BulkStats { .. } => "bulk_stats",
            ProbeRequest::ContainerStats { .. } => "container_stats",
            ProbeRequest::GpuMetrics => "gpu_metrics",
            ProbeRequest::GpuDriver => "gpu_driver",
            ProbeRequest::CudaDriver => "cuda_driver",
            ProbeRequest::CudaToolkit => "cuda_toolkit",
            ProbeRequest::Control { .. } => "control",
            ProbeRequest::Logs { .. } => "logs",
        }
    }

    pub fn timeout(&self, t: &ProbeTimeouts) -> Duration {
        match self {
            ProbeRequest::ListContainers => t.list,
            ProbeRequest::BulkStats { .. } => t.bulk_stats,
            ProbeRequest::ContainerStats { .. } => t.stats,
            ProbeRequest::GpuMetrics
            | ProbeRequest::GpuDriver
            | ProbeRequest::CudaDriver
            | ProbeRequest::CudaToolkit => t.gpu,
            ProbeRequest::Control { .. } => t.control,
            ProbeRequest::Logs { .. } => t.logs,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeTimeouts {
    pub list: Duration,
    pub bulk_stats: Duration,
    pub stats: Duration,
    pub gpu: Duration,
    pub control: Duration,
    pub logs: Duration,
}

impl Default for ProbeTimeouts {
    fn default() -> Self {
        Self {
            list: Duration::from_secs(5),
            bulk_stats: Duration::from_secs(15),
            stats: Duration::from_secs(5),
            gpu: Duration::from_secs(5),
            control: Duration::from_secs(30),
            logs: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeErrorKind {
    Timeout,
    ToolMissing,
    NonZeroExit,
    /// Spawn or transport failure other than a missing binary.
    Io,
}

impl ProbeErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProbeErrorKind::Timeout => "timeout",
            ProbeErrorKind::ToolMissing => "tool missing",
            ProbeErrorKind::NonZeroExit => "non-zero exit",
            ProbeErrorKind::Io => "io error",
        }
    }
}

impl fmt::Display for ProbeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation} probe failed ({kind}): {detail}")]
pub struct ProbeError {
    pub kind: ProbeErrorKind,
    pub operation: &'static str,
    pub detail: String,
}

impl ProbeError {
    pub fn new(kind: ProbeErrorKind, request: &ProbeRequest, detail: impl Into<String>) -> Self {
        Self {
            kind,
            operation: request.operation(),
            detail: detail.into(),
        }
    }

    pub fn timeout(request: &ProbeRequest, after: Duration) -> Self {
        Self::new(
            ProbeErrorKind::Timeout,
            request,
            format!("no result after {:?}", after),
        )
    }
}

/// The narrow seam between the core and the tools it polls. Implementations must bound
/// every call by the request's timeout and must not retry.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn run(&self, request: &ProbeRequest) -> Result<String, ProbeError>;
}
