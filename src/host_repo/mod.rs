// Host metrics via sysinfo

mod linux;

use crate::models::{CpuSummary, DiskSummary, HostStats, MemorySummary};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use sysinfo::{Disks, System};
use tracing::instrument;

pub struct HostRepo {
    sys: Arc<std::sync::Mutex<System>>,
    disks: Arc<std::sync::Mutex<Disks>>,
    last_cpu_refresh: Arc<std::sync::Mutex<Option<(Instant, f64)>>>,
}

impl Default for HostRepo {
    fn default() -> Self {
        Self::new()
    }
}

fn percent(used: u64, total: u64) -> f64 {
    if total > 0 {
        (used as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}

impl HostRepo {
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        sys.refresh_cpu_all();
        Self {
            sys: Arc::new(std::sync::Mutex::new(sys)),
            disks: Arc::new(std::sync::Mutex::new(Disks::new_with_refreshed_list())),
            last_cpu_refresh: Arc::new(std::sync::Mutex::new(None)),
        }
    }

    /// Hostname, OS, CPU, memory and the disk mounted at `disk_mount`
    /// (`None` when nothing is mounted there).
    #[instrument(skip(self), fields(repo = "host", operation = "host_stats"))]
    pub async fn host_stats(&self, disk_mount: &str) -> anyhow::Result<HostStats> {
        let sys = self.sys.clone();
        let disks = self.disks.clone();
        let last_cpu_refresh = self.last_cpu_refresh.clone();
        let disk_mount = disk_mount.to_string();
        tokio::task::spawn_blocking(move || {
            let mut sys = sys
                .lock()
                .map_err(|e| anyhow::anyhow!("sysinfo lock poisoned: {}", e))?;

            let mut guard = last_cpu_refresh
                .lock()
                .map_err(|e| anyhow::anyhow!("cpu refresh lock poisoned: {}", e))?;
            let now = Instant::now();
            let usage = match *guard {
                Some((prev_ts, prev_usage))
                    if now.duration_since(prev_ts) < sysinfo::MINIMUM_CPU_UPDATE_INTERVAL =>
                {
                    prev_usage
                }
                Some(_) => {
                    sys.refresh_cpu_all();
                    sys.global_cpu_usage() as f64
                }
                None => {
                    // usage needs two samples
                    sys.refresh_cpu_all();
                    std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
                    sys.refresh_cpu_all();
                    sys.global_cpu_usage() as f64
                }
            };
            *guard = Some((Instant::now(), usage));
            drop(guard);

            sys.refresh_memory();
            let total = sys.total_memory();
            let used = total.saturating_sub(sys.available_memory());

            let mut disks = disks
                .lock()
                .map_err(|e| anyhow::anyhow!("sysinfo disks lock poisoned: {}", e))?;
            disks.refresh(true);
            let disk = disks
                .list()
                .iter()
                .find(|d| d.mount_point() == Path::new(&disk_mount))
                .map(|d| {
                    let total = d.total_space();
                    let used = total.saturating_sub(d.available_space());
                    DiskSummary {
                        mount: disk_mount.clone(),
                        total,
                        used,
                        usage_percent: percent(used, total),
                    }
                });

            let os = linux::read_os_pretty_name()
                .or_else(|| {
                    System::name().map(|name| match System::kernel_version() {
                        Some(kernel) => format!("{} {}", name, kernel),
                        None => name,
                    })
                })
                .unwrap_or_else(|| std::env::consts::OS.into());

            Ok(HostStats {
                hostname: System::host_name().unwrap_or_default(),
                os,
                cpu: CpuSummary {
                    count: sys.cpus().len() as u32,
                    usage_percent: usage.clamp(0.0, 100.0),
                },
                memory: MemorySummary {
                    total,
                    used,
                    usage_percent: percent(used, total),
                },
                disk,
            })
        })
        .await
        .map_err(|e| anyhow::anyhow!("sysinfo task join: {}", e))?
    }
}
