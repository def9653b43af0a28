// Service (container) models

use serde::{Deserialize, Serialize};

/// Lifecycle state of a service; serializes to lowercase JSON (e.g. "running").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Created,
    Running,
    Restarting,
    Stopped,
    #[serde(other)]
    Unknown,
}

impl ServiceState {
    /// Classify a free-text runtime status such as "Up 2 hours" or "Exited (0) 3 days ago".
    /// Markers are checked in order; the first one found wins.
    pub fn classify(status: &str) -> Self {
        if status.contains("Up") {
            ServiceState::Running
        } else if status.contains("Exited") {
            ServiceState::Stopped
        } else if status.contains("Restarting") {
            ServiceState::Restarting
        } else if status.contains("Created") {
            ServiceState::Created
        } else {
            ServiceState::Unknown
        }
    }

    pub fn is_running(self) -> bool {
        self == ServiceState::Running
    }
}

/// Live resource usage. `None` means the runtime gave no usable value, which is
/// different from an idle container reporting 0.0.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceStats {
    pub cpu_percent: Option<f64>,
    pub memory_percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRecord {
    pub id: String,
    pub name: String,
    pub status: ServiceState,
    pub image: String,
    pub category: String,
    pub port: Option<u16>,
    pub stats: Option<ResourceStats>,
}

/// One row of the container listing, before filtering and enrichment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRow {
    pub id: String,
    pub name: String,
    pub status_text: String,
    pub image: String,
    pub ports_text: String,
    pub networks_text: String,
}

impl ContainerRow {
    pub fn state(&self) -> ServiceState {
        ServiceState::classify(&self.status_text)
    }

    /// True when `network` is one of the comma-separated networks the container is attached to.
    pub fn on_network(&self, network: &str) -> bool {
        self.networks_text
            .split(',')
            .map(str::trim)
            .any(|n| n == network)
    }
}

/// One row of the stats query. `id_prefix` may be truncated by the runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsRow {
    pub id_prefix: String,
    pub stats: ResourceStats,
}

impl StatsRow {
    /// Ids may be truncated on either side, so match by prefix in both directions.
    pub fn matches(&self, container_id: &str) -> bool {
        !self.id_prefix.is_empty()
            && (container_id.starts_with(&self.id_prefix)
                || self.id_prefix.starts_with(container_id))
    }
}
