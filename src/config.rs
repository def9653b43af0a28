use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::aggregate::ServiceCatalog;
use crate::probe::ProbeTimeouts;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub probes: ProbeConfig,
    #[serde(default)]
    pub services: ServicesConfig,
    #[serde(default)]
    pub system: SystemConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

/// Per-domain TTLs. Short enough that a polling client sees state at most one interval old.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub services_ttl_ms: u64,
    pub gpu_ttl_ms: u64,
    pub system_ttl_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            services_ttl_ms: 2_000,
            gpu_ttl_ms: 5_000,
            system_ttl_ms: 2_000,
        }
    }
}

impl CacheConfig {
    pub fn services_ttl(&self) -> Duration {
        Duration::from_millis(self.services_ttl_ms)
    }

    pub fn gpu_ttl(&self) -> Duration {
        Duration::from_millis(self.gpu_ttl_ms)
    }

    pub fn system_ttl(&self) -> Duration {
        Duration::from_millis(self.system_ttl_ms)
    }
}

/// Which container runtime client backs the probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeBackend {
    /// Shell out to the docker CLI.
    Cli,
    /// Talk to the Docker Engine API over its unix socket.
    Api,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub backend: ProbeBackend,
    pub docker_bin: String,
    pub nvidia_smi_bin: String,
    pub nvcc_bin: String,
    pub list_timeout_ms: u64,
    pub bulk_stats_timeout_ms: u64,
    pub stats_timeout_ms: u64,
    pub gpu_timeout_ms: u64,
    pub control_timeout_ms: u64,
    pub logs_timeout_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            backend: ProbeBackend::Cli,
            docker_bin: "docker".into(),
            nvidia_smi_bin: "nvidia-smi".into(),
            nvcc_bin: "nvcc".into(),
            list_timeout_ms: 5_000,
            bulk_stats_timeout_ms: 15_000,
            stats_timeout_ms: 5_000,
            gpu_timeout_ms: 5_000,
            control_timeout_ms: 30_000,
            logs_timeout_ms: 10_000,
        }
    }
}

impl ProbeConfig {
    pub fn timeouts(&self) -> ProbeTimeouts {
        ProbeTimeouts {
            list: Duration::from_millis(self.list_timeout_ms),
            bulk_stats: Duration::from_millis(self.bulk_stats_timeout_ms),
            stats: Duration::from_millis(self.stats_timeout_ms),
            gpu: Duration::from_millis(self.gpu_timeout_ms),
            control: Duration::from_millis(self.control_timeout_ms),
            logs: Duration::from_millis(self.logs_timeout_ms),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    /// Only containers attached to this network are shown.
    pub network: String,
    /// Names hidden from the dashboard (its own components, exporters).
    pub exclude: Vec<String>,
    pub default_log_tail: usize,
    pub max_log_tail: usize,
    pub categories: HashMap<String, String>,
    pub default_ports: HashMap<String, u16>,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        let categories = [
            ("localai", "LLM Services"),
            ("ollama", "LLM Services"),
            ("forge", "Image Generation"),
            ("comfyui", "Image Generation"),
            ("stable-diffusion", "Image Generation"),
            ("n8n", "Automation"),
            ("chromadb", "Database"),
            ("whisper", "Audio"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let default_ports = [
            ("localai", 8080),
            ("ollama", 11434),
            ("forge", 7860),
            ("comfyui", 8188),
            ("n8n", 5678),
            ("chromadb", 8000),
            ("whisper", 9000),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        Self {
            network: "ai-network".into(),
            exclude: ["dashboard", "dashboard-backend", "dcgm", "dcgm-exporter", "gpu-server"]
                .into_iter()
                .map(String::from)
                .collect(),
            default_log_tail: 100,
            max_log_tail: 5_000,
            categories,
            default_ports,
        }
    }
}

impl ServicesConfig {
    /// Static metadata used by the aggregator. Names are matched case-insensitively.
    pub fn catalog(&self) -> ServiceCatalog {
        ServiceCatalog {
            network: self.network.clone(),
            exclude: self
                .exclude
                .iter()
                .map(|n| n.to_lowercase())
                .collect::<HashSet<_>>(),
            categories: self
                .categories
                .iter()
                .map(|(k, v)| (k.to_lowercase(), v.clone()))
                .collect(),
            default_ports: self
                .default_ports
                .iter()
                .map(|(k, v)| (k.to_lowercase(), *v))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Mount point reported as the disk total.
    pub disk_mount: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            disk_mount: "/".into(),
        }
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            self.cache.services_ttl_ms > 0,
            "cache.services_ttl_ms must be > 0, got {}",
            self.cache.services_ttl_ms
        );
        anyhow::ensure!(
            self.cache.gpu_ttl_ms > 0,
            "cache.gpu_ttl_ms must be > 0, got {}",
            self.cache.gpu_ttl_ms
        );
        anyhow::ensure!(
            self.cache.system_ttl_ms > 0,
            "cache.system_ttl_ms must be > 0, got {}",
            self.cache.system_ttl_ms
        );
        for (key, bin) in [
            ("probes.docker_bin", &self.probes.docker_bin),
            ("probes.nvidia_smi_bin", &self.probes.nvidia_smi_bin),
            ("probes.nvcc_bin", &self.probes.nvcc_bin),
        ] {
            anyhow::ensure!(!bin.trim().is_empty(), "{} must be non-empty", key);
        }
        for (key, ms) in [
            ("probes.list_timeout_ms", self.probes.list_timeout_ms),
            ("probes.bulk_stats_timeout_ms", self.probes.bulk_stats_timeout_ms),
            ("probes.stats_timeout_ms", self.probes.stats_timeout_ms),
            ("probes.gpu_timeout_ms", self.probes.gpu_timeout_ms),
            ("probes.control_timeout_ms", self.probes.control_timeout_ms),
            ("probes.logs_timeout_ms", self.probes.logs_timeout_ms),
        ] {
            anyhow::ensure!(ms > 0, "{} must be > 0, got {}", key, ms);
        }
        anyhow::ensure!(
            !self.services.network.trim().is_empty(),
            "services.network must be non-empty"
        );
        anyhow::ensure!(
            self.services.default_log_tail > 0,
            "services.default_log_tail must be > 0, got {}",
            self.services.default_log_tail
        );
        anyhow::ensure!(
            self.services.default_log_tail <= self.services.max_log_tail,
            "services.default_log_tail ({}) must not exceed services.max_log_tail ({})",
            self.services.default_log_tail,
            self.services.max_log_tail
        );
        anyhow::ensure!(
            !self.system.disk_mount.is_empty(),
            "system.disk_mount must be non-empty"
        );
        Ok(())
    }
}
