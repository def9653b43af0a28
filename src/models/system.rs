// Host identity, CPU, memory and disk models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{GpuRecord, NvidiaInfo};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuSummary {
    pub count: u32,
    pub usage_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorySummary {
    pub total: u64,
    pub used: u64,
    pub usage_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskSummary {
    pub mount: String,
    pub total: u64,
    pub used: u64,
    pub usage_percent: f64,
}

/// Host metrics gathered in-process (no external tool involved).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostStats {
    pub hostname: String,
    pub os: String,
    pub cpu: CpuSummary,
    pub memory: MemorySummary,
    pub disk: Option<DiskSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemSnapshot {
    pub hostname: String,
    pub os: String,
    pub cpu: CpuSummary,
    pub memory: MemorySummary,
    pub disk: Option<DiskSummary>,
    /// `None` on hosts without the NVIDIA tools.
    pub nvidia: Option<NvidiaInfo>,
    pub gpus: Vec<GpuRecord>,
    pub captured_at: DateTime<Utc>,
}

impl SystemSnapshot {
    pub fn assemble(
        host: HostStats,
        nvidia: Option<NvidiaInfo>,
        gpus: Vec<GpuRecord>,
        captured_at: DateTime<Utc>,
    ) -> Self {
        let HostStats {
            hostname,
            os,
            cpu,
            memory,
            disk,
        } = host;
        Self {
            hostname,
            os,
            cpu,
            memory,
            disk,
            nvidia,
            gpus,
            captured_at,
        }
    }
}
