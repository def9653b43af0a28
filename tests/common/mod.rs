// Shared test helpers

#![allow(dead_code)]

use async_trait::async_trait;
use boxwatch::config::AppConfig;
use boxwatch::probe::{Probe, ProbeError, ProbeErrorKind, ProbeRequest};
use std::collections::HashMap;
use std::sync::Mutex;

pub const TEST_CONFIG: &str = r#"
[server]
port = 8085
host = "127.0.0.1"

[cache]
services_ttl_ms = 60000
gpu_ttl_ms = 60000
system_ttl_ms = 60000
"#;

pub fn test_config() -> AppConfig {
    AppConfig::load_from_str(TEST_CONFIG).unwrap()
}

/// Same as [`test_config`] but every read refreshes. Not loadable from TOML.
pub fn zero_ttl_config() -> AppConfig {
    let mut config = test_config();
    config.cache.services_ttl_ms = 0;
    config.cache.gpu_ttl_ms = 0;
    config.cache.system_ttl_ms = 0;
    config
}

pub const LISTING: &str = "\
a1b2c3d4e5f6|ollama|Up 2 hours|ollama/ollama:latest|0.0.0.0:11434->11434/tcp|ai-network
b2c3d4e5f6a1|chromadb|Exited (0) 3 days ago|chromadb/chroma:latest||ai-network
c3d4e5f6a1b2|dashboard|Up 2 hours|aibox/dashboard:latest|0.0.0.0:8085->8085/tcp|ai-network
d4e5f6a1b2c3|postgres|Up 5 hours|postgres:16|0.0.0.0:5432->5432/tcp|bridge
e5f6a1b2c3d4|forge|Up 10 minutes|aibox/forge:latest|0.0.0.0:7861->7860/tcp|bridge,ai-network
";

pub const BULK_STATS: &str = "\
a1b2c3d4e5f6|12.50%|3.10%
e5f6a1b2c3d4|150.02%|40.00%
";

pub const GPU_ROWS: &str = "\
0, NVIDIA GeForce RTX 4090, 45, 12, 5, 2048, 24564, 65.32, 450.00
";

/// Scripted probe. Responses are keyed by operation name; unscripted operations fail
/// as if the tool were missing. In `container_stats` responses `{id}` is replaced by
/// the requested id.
#[derive(Default)]
pub struct FakeProbe {
    script: Mutex<HashMap<&'static str, Result<String, ProbeErrorKind>>>,
    calls: Mutex<Vec<ProbeRequest>>,
}

impl FakeProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers for a host with the standard listing, stats and one GPU.
    pub fn healthy() -> Self {
        let probe = Self::new();
        probe.respond("list_containers", LISTING);
        probe.respond("bulk_stats", BULK_STATS);
        probe.respond("container_stats", "{id}|1.00%|2.00%");
        probe.respond("gpu_metrics", GPU_ROWS);
        probe.respond("gpu_driver", "535.104.05, NVIDIA GeForce RTX 4090\n");
        probe.respond(
            "cuda_driver",
            "| NVIDIA-SMI 535.104.05   Driver Version: 535.104.05   CUDA Version: 12.2     |",
        );
        probe.respond("cuda_toolkit", "Cuda compilation tools, release 12.1, V12.1.105");
        probe.respond("control", "");
        probe.respond("logs", "2024-01-01T00:00:00Z line one\n2024-01-01T00:00:01Z line two\n");
        probe
    }

    pub fn respond(&self, operation: &'static str, output: &str) {
        self.script
            .lock()
            .unwrap()
            .insert(operation, Ok(output.to_string()));
    }

    pub fn fail(&self, operation: &'static str, kind: ProbeErrorKind) {
        self.script.lock().unwrap().insert(operation, Err(kind));
    }

    pub fn calls(&self) -> Vec<ProbeRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.operation() == operation)
            .count()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl Probe for FakeProbe {
    async fn run(&self, request: &ProbeRequest) -> Result<String, ProbeError> {
        self.calls.lock().unwrap().push(request.clone());
        let scripted = self
            .script
            .lock()
            .unwrap()
            .get(request.operation())
            .cloned();
        match scripted {
            Some(Ok(output)) => match request {
                ProbeRequest::ContainerStats { id } => Ok(output.replace("{id}", id)),
                _ => Ok(output),
            },
            Some(Err(kind)) => Err(ProbeError::new(kind, request, "scripted failure")),
            None => Err(ProbeError::new(
                ProbeErrorKind::ToolMissing,
                request,
                "not scripted",
            )),
        }
    }
}
