// Integration tests: HTTP endpoints over a scripted probe

mod common;

use axum::http::StatusCode;
use axum_test::TestServer;
use boxwatch::collector::Collector;
use boxwatch::probe::ProbeErrorKind;
use boxwatch::routes;
use common::{FakeProbe, test_config, zero_ttl_config};
use std::sync::Arc;

fn test_server_with(probe: FakeProbe) -> (TestServer, Arc<FakeProbe>) {
    let probe = Arc::new(probe);
    let collector = Arc::new(Collector::new(&test_config(), probe.clone()));
    let server = TestServer::new(routes::app(collector));
    (server, probe)
}

fn test_server() -> (TestServer, Arc<FakeProbe>) {
    test_server_with(FakeProbe::healthy())
}

#[tokio::test]
async fn test_root_endpoint() {
    let (server, _) = test_server();
    let response = server.get("/").await;
    response.assert_status_ok();
    response.assert_text("boxwatch: container and GPU telemetry");
}

#[tokio::test]
async fn test_version_endpoint() {
    let (server, _) = test_server();
    let response = server.get("/version").await;
    response.assert_status_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(json.get("name").and_then(|v| v.as_str()), Some("boxwatch"));
    assert!(json.get("version").and_then(|v| v.as_str()).is_some());
}

#[tokio::test]
async fn test_health_endpoint() {
    let (server, _) = test_server();
    let response = server.get("/health").await;
    response.assert_status_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(json["status"], "healthy");
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn test_services_endpoint() {
    let (server, _) = test_server();
    let response = server.get("/api/services").await;
    response.assert_status_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(json["count"], 3);
    assert_eq!(json["stale"], false);
    assert_eq!(json["services"][0]["name"], "chromadb");
    assert_eq!(json["services"][0]["status"], "stopped");
    assert_eq!(json["services"][2]["stats"]["cpuPercent"], 12.5);
    assert!(json["capturedAt"].is_string());
}

#[tokio::test]
async fn test_services_endpoint_cold_failure_is_503() {
    let probe = FakeProbe::healthy();
    probe.fail("list_containers", ProbeErrorKind::ToolMissing);
    let (server, _) = test_server_with(probe);
    let response = server.get("/api/services").await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let json: serde_json::Value = response.json();
    assert_eq!(json["error"], "unavailable");
}

#[tokio::test]
async fn test_services_endpoint_serves_stale() {
    let probe = Arc::new(FakeProbe::healthy());
    let collector = Arc::new(Collector::new(&zero_ttl_config(), probe.clone()));
    let server = TestServer::new(routes::app(collector));
    server.get("/api/services").await.assert_status_ok();

    probe.fail("list_containers", ProbeErrorKind::Timeout);
    let response = server.get("/api/services").await;
    response.assert_status_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(json["stale"], true);
    assert_eq!(json["count"], 3);
}

#[tokio::test]
async fn test_gpu_endpoint() {
    let (server, _) = test_server();
    let response = server.get("/api/gpu/metrics").await;
    response.assert_status_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(json["gpus"][0]["index"], 0);
    assert_eq!(json["gpus"][0]["temperature"], 45.0);
}

#[tokio::test]
async fn test_system_endpoint() {
    let (server, _) = test_server();
    let response = server.get("/api/system").await;
    response.assert_status_ok();
    let json: serde_json::Value = response.json();
    assert!(json["memory"]["total"].as_u64().unwrap() > 0);
    assert_eq!(json["nvidia"]["cudaDriver"], "12.2");
    assert_eq!(json["stale"], false);
}

#[tokio::test]
async fn test_dashboard_reports_failing_domain_in_place() {
    let probe = FakeProbe::healthy();
    probe.fail("gpu_metrics", ProbeErrorKind::ToolMissing);
    let (server, _) = test_server_with(probe);
    let response = server.get("/api/dashboard").await;
    response.assert_status_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(json["services"]["count"], 3);
    assert!(json["system"]["hostname"].is_string());
    assert!(json["gpu"]["error"].is_string());
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn test_control_endpoint() {
    let (server, probe) = test_server();
    let response = server.post("/api/services/ollama/stop").await;
    response.assert_status_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(json["status"], "success");
    assert_eq!(json["message"], "ollama stop command sent");
    assert_eq!(probe.count("control"), 1);
}

#[tokio::test]
async fn test_control_endpoint_errors() {
    let (server, probe) = test_server();
    server
        .post("/api/services/ghost/start")
        .await
        .assert_status(StatusCode::NOT_FOUND);
    let response = server.post("/api/services/ollama/pause").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let json: serde_json::Value = response.json();
    assert_eq!(json["error"], "invalid_action");
    assert_eq!(probe.count("control"), 0);
}

#[tokio::test]
async fn test_control_endpoint_probe_failure_is_502() {
    let probe = FakeProbe::healthy();
    probe.fail("control", ProbeErrorKind::NonZeroExit);
    let (server, _) = test_server_with(probe);
    server
        .post("/api/services/ollama/start")
        .await
        .assert_status(StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_logs_endpoint() {
    let (server, probe) = test_server();
    let response = server
        .get("/api/services/ollama/logs")
        .add_query_param("tail", 20)
        .await;
    response.assert_status_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(json["service"], "ollama");
    assert_eq!(json["logs"].as_array().unwrap().len(), 2);
    assert!(probe.calls().contains(&boxwatch::probe::ProbeRequest::Logs {
        name: "ollama".into(),
        tail: 20,
    }));
}

#[tokio::test]
async fn test_logs_endpoint_unknown_service() {
    let (server, _) = test_server();
    server
        .get("/api/services/ghost/logs")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_endpoint_uses_cached_gpus_only() {
    let (server, probe) = test_server();
    let empty = server.get("/metrics").await;
    empty.assert_status_ok();
    assert!(!empty.text().contains("gpu_utilization{"));
    assert_eq!(probe.count("gpu_metrics"), 0);

    server.get("/api/gpu/metrics").await.assert_status_ok();
    let text = server.get("/metrics").await.text();
    assert!(text.contains("gpu_utilization{gpu=\"0\",name=\"NVIDIA GeForce RTX 4090\"} 12"));
    assert_eq!(probe.count("gpu_metrics"), 1);
}
