// Probe backend that shells out to the docker, nvidia-smi and nvcc CLIs.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, instrument};

use super::{Probe, ProbeError, ProbeErrorKind, ProbeRequest, ProbeTimeouts};
use crate::config::ProbeConfig;

const LIST_FORMAT: &str = "{{.ID}}|{{.Names}}|{{.Status}}|{{.Image}}|{{.Ports}}|{{.Networks}}";
const STATS_FORMAT: &str = "{{.ID}}|{{.CPUPerc}}|{{.MemPerc}}";
const GPU_QUERY: &str = "--query-gpu=index,name,temperature.gpu,utilization.gpu,utilization.memory,memory.used,memory.total,power.draw,power.limit";

pub struct CliProbe {
    docker_bin: String,
    nvidia_smi_bin: String,
    nvcc_bin: String,
    timeouts: ProbeTimeouts,
}

impl CliProbe {
    pub fn new(config: &ProbeConfig) -> Self {
        Self {
            docker_bin: config.docker_bin.clone(),
            nvidia_smi_bin: config.nvidia_smi_bin.clone(),
            nvcc_bin: config.nvcc_bin.clone(),
            timeouts: config.timeouts(),
        }
    }

    /// Program and arguments for a request. Arguments are passed directly, never through a shell.
    pub fn argv(&self, request: &ProbeRequest) -> (String, Vec<String>) {
        let args = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        match request {
            ProbeRequest::ListContainers => (
                self.docker_bin.clone(),
                args(&["ps", "-a", "--format", LIST_FORMAT]),
            ),
            ProbeRequest::BulkStats { ids } => {
                let mut a = args(&["stats", "--no-stream", "--format", STATS_FORMAT]);
                a.extend(ids.iter().cloned());
                (self.docker_bin.clone(), a)
            }
            ProbeRequest::ContainerStats { id } => {
                let mut a = args(&["stats", "--no-stream", "--format", STATS_FORMAT]);
                a.push(id.clone());
                (self.docker_bin.clone(), a)
            }
            ProbeRequest::GpuMetrics => (
                self.nvidia_smi_bin.clone(),
                args(&[GPU_QUERY, "--format=csv,noheader,nounits"]),
            ),
            ProbeRequest::GpuDriver => (
                self.nvidia_smi_bin.clone(),
                args(&["--query-gpu=driver_version,name", "--format=csv,noheader"]),
            ),
            ProbeRequest::CudaDriver => (self.nvidia_smi_bin.clone(), Vec::new()),
            ProbeRequest::CudaToolkit => (self.nvcc_bin.clone(), args(&["--version"])),
            ProbeRequest::Control { name, action } => (
                self.docker_bin.clone(),
                vec![action.as_str().to_string(), name.clone()],
            ),
            ProbeRequest::Logs { name, tail } => (
                self.docker_bin.clone(),
                vec![
                    "logs".into(),
                    "--tail".into(),
                    tail.to_string(),
                    "--timestamps".into(),
                    name.clone(),
                ],
            ),
        }
    }
}

#[async_trait]
impl Probe for CliProbe {
    #[instrument(skip(self), fields(repo = "cli", domain = %request.domain(), operation = request.operation()))]
    async fn run(&self, request: &ProbeRequest) -> Result<String, ProbeError> {
        // `docker stats` with no ids would report every running container.
        if let ProbeRequest::BulkStats { ids } = request
            && ids.is_empty()
        {
            return Ok(String::new());
        }
        let (program, args) = self.argv(request);
        let output = exec(request, &program, &args, request.timeout(&self.timeouts)).await?;
        // The runtime writes container logs to both streams.
        if matches!(request, ProbeRequest::Logs { .. }) {
            return Ok(merge_log_streams(&output.stdout, &output.stderr));
        }
        Ok(output.stdout)
    }
}

/// One log line plus any continuation lines that carry no timestamp of their own.
struct LogEntry<'a> {
    at: Option<DateTime<FixedOffset>>,
    lines: Vec<&'a str>,
}

fn log_entries(raw: &str) -> Vec<LogEntry<'_>> {
    let mut entries: Vec<LogEntry<'_>> = Vec::new();
    for line in raw.lines() {
        let at = line
            .split_whitespace()
            .next()
            .and_then(|token| DateTime::parse_from_rfc3339(token).ok());
        match (at, entries.last_mut()) {
            (None, Some(last)) => last.lines.push(line),
            _ => entries.push(LogEntry {
                at,
                lines: vec![line],
            }),
        }
    }
    entries
}

/// Interleave stdout and stderr by the leading `--timestamps` token. Each stream is
/// already in order, so this is a merge; stdout wins ties.
fn merge_log_streams(stdout: &str, stderr: &str) -> String {
    let out_entries = log_entries(stdout);
    let err_entries = log_entries(stderr);
    let mut merged = String::with_capacity(stdout.len() + stderr.len() + 1);
    let (mut i, mut j) = (0, 0);
    while i < out_entries.len() || j < err_entries.len() {
        let take_stdout = match (out_entries.get(i), err_entries.get(j)) {
            (Some(a), Some(b)) => a.at <= b.at,
            (Some(_), None) => true,
            _ => false,
        };
        let entry = if take_stdout {
            i += 1;
            &out_entries[i - 1]
        } else {
            j += 1;
            &err_entries[j - 1]
        };
        for line in &entry.lines {
            merged.push_str(line);
            merged.push('\n');
        }
    }
    merged
}

pub(crate) struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Run one process to completion within `timeout`. The child is killed if the deadline passes.
pub(crate) async fn exec(
    request: &ProbeRequest,
    program: &str,
    args: &[String],
    timeout: Duration,
) -> Result<CapturedOutput, ProbeError> {
    debug!(program, ?args, ?timeout, "spawning probe");
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            let kind = if e.kind() == std::io::ErrorKind::NotFound {
                ProbeErrorKind::ToolMissing
            } else {
                ProbeErrorKind::Io
            };
            ProbeError::new(kind, request, format!("{}: {}", program, e))
        })?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(o)) => o,
        Ok(Err(e)) => {
            return Err(ProbeError::new(
                ProbeErrorKind::Io,
                request,
                format!("{}: {}", program, e),
            ));
        }
        // Dropping the future drops the child, and kill_on_drop reaps it.
        Err(_) => return Err(ProbeError::timeout(request, timeout)),
    };

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    if !output.status.success() {
        let detail = match stderr.trim() {
            "" => format!("{} exited with {}", program, output.status),
            msg => msg.to_string(),
        };
        return Err(ProbeError::new(ProbeErrorKind::NonZeroExit, request, detail));
    }
    Ok(CapturedOutput { stdout, stderr })
}
