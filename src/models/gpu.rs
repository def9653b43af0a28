// GPU models

use serde::{Deserialize, Serialize};

/// Per-device metrics. Memory is in MiB, power in watts, temperature in °C.
/// Readings the tool reports as unsupported are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpuRecord {
    pub index: u32,
    pub name: String,
    pub temperature: Option<f64>,
    pub gpu_util: Option<f64>,
    pub mem_util: Option<f64>,
    pub mem_used_mib: Option<f64>,
    pub mem_total_mib: Option<f64>,
    pub power_draw: Option<f64>,
    pub power_limit: Option<f64>,
}

/// Driver and toolkit versions. Each piece comes from a separate tool and may be missing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NvidiaInfo {
    pub driver_version: Option<String>,
    pub cuda_driver: Option<String>,
    pub cuda_toolkit: Option<String>,
    pub gpu_names: Vec<String>,
}
