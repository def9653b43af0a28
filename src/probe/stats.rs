// CPU and memory percentages from raw Docker stats counters.

use bollard::models::ContainerStatsResponse;

use crate::models::ResourceStats;

/// `(Δcontainer / Δsystem) * online_cpus * 100`, the figure `docker stats` prints.
/// `None` when the system delta is not positive or no CPU is online.
pub fn cpu_percent(
    total_usage: u64,
    prev_total_usage: u64,
    system_usage: u64,
    prev_system_usage: u64,
    online_cpus: u32,
) -> Option<f64> {
    let cpu_delta = total_usage as i64 - prev_total_usage as i64;
    let system_delta = system_usage as i64 - prev_system_usage as i64;
    if system_delta <= 0 || online_cpus == 0 {
        return None;
    }
    Some((cpu_delta.max(0) as f64 / system_delta as f64) * online_cpus as f64 * 100.0)
}

/// `usage / limit * 100`; `None` for a zero limit.
pub fn memory_percent(usage: u64, limit: u64) -> Option<f64> {
    if limit == 0 {
        return None;
    }
    Some(usage as f64 / limit as f64 * 100.0)
}

/// Reduce a one-shot stats response to the two percentages the dashboard shows.
pub(crate) fn resource_stats(s: &ContainerStatsResponse) -> ResourceStats {
    let cpu = (|| {
        let cpu_stats = s.cpu_stats.as_ref()?;
        let precpu_stats = s.precpu_stats.as_ref()?;
        let total = cpu_stats.cpu_usage.as_ref()?.total_usage?;
        let prev_total = precpu_stats.cpu_usage.as_ref()?.total_usage?;
        let system = cpu_stats.system_cpu_usage?;
        // Without a previous sample the counters only give a lifetime average.
        let prev_system = precpu_stats.system_cpu_usage?;
        let online = cpu_stats.online_cpus.unwrap_or(1);
        cpu_percent(total, prev_total, system, prev_system, online)
    })();

    let memory = s.memory_stats.as_ref().and_then(|m| {
        let usage = m.usage?;
        memory_percent(usage, m.limit.unwrap_or(0))
    });

    ResourceStats {
        cpu_percent: cpu,
        memory_percent: memory,
    }
}
