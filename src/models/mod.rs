// Domain models

mod control;
mod gpu;
mod service;
mod system;

pub use control::{ControlAction, ControlResponse, ControlStatus, UnknownAction};
pub use gpu::{GpuRecord, NvidiaInfo};
pub use service::{ContainerRow, ResourceStats, ServiceRecord, ServiceState, StatsRow};
pub use system::{CpuSummary, DiskSummary, HostStats, MemorySummary, SystemSnapshot};

use serde::{Deserialize, Serialize};
use std::fmt;

/// A category of telemetry with its own cache entry and TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Services,
    System,
    Gpu,
}

impl Domain {
    pub fn as_str(self) -> &'static str {
        match self {
            Domain::Services => "services",
            Domain::System => "system",
            Domain::Gpu => "gpu",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
