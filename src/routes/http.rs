// JSON handlers. Each one is a thin wrapper over a collector operation.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt::Write as _;

use super::AppState;
use crate::cache::Served;
use crate::error::CollectError;
use crate::models::{GpuRecord, ServiceRecord, SystemSnapshot};
use crate::version::{NAME, VERSION};

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
}

impl IntoResponse for CollectError {
    fn into_response(self) -> Response {
        let (status, error) = match &self {
            CollectError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            CollectError::InvalidAction(_) => (StatusCode::BAD_REQUEST, "invalid_action"),
            CollectError::Unavailable { .. } => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
            CollectError::Probe(_) | CollectError::Parse(_) | CollectError::Host(_) => {
                (StatusCode::BAD_GATEWAY, "collection_failed")
            }
        };
        let body = ErrorResponse {
            error,
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ServicesBody<'a> {
    services: &'a [ServiceRecord],
    count: usize,
    captured_at: DateTime<Utc>,
    stale: bool,
}

impl<'a> ServicesBody<'a> {
    fn new(served: &'a Served<Vec<ServiceRecord>>) -> Self {
        Self {
            services: &served.data,
            count: served.data.len(),
            captured_at: served.captured_at,
            stale: served.stale,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GpuBody<'a> {
    gpus: &'a [GpuRecord],
    captured_at: DateTime<Utc>,
    stale: bool,
}

impl<'a> GpuBody<'a> {
    fn new(served: &'a Served<Vec<GpuRecord>>) -> Self {
        Self {
            gpus: &served.data,
            captured_at: served.captured_at,
            stale: served.stale,
        }
    }
}

#[derive(Serialize)]
struct SystemBody<'a> {
    #[serde(flatten)]
    snapshot: &'a SystemSnapshot,
    stale: bool,
}

impl<'a> SystemBody<'a> {
    fn new(served: &'a Served<SystemSnapshot>) -> Self {
        Self {
            snapshot: &served.data,
            stale: served.stale,
        }
    }
}

/// One domain of the combined read: its body, or the error that replaced it.
fn domain_json<'a, T, B: Serialize>(
    result: &'a Result<Served<T>, CollectError>,
    body: impl FnOnce(&'a Served<T>) -> B,
) -> serde_json::Value {
    match result {
        Ok(served) => json!(body(served)),
        Err(e) => json!({ "error": e.to_string() }),
    }
}

/// GET /health
pub(super) async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now(),
    }))
}

/// GET /version: service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /api/services
pub(super) async fn services_handler(
    State(state): State<AppState>,
) -> Result<Response, CollectError> {
    let served = state.collector.get_service_records().await?;
    Ok(Json(ServicesBody::new(&served)).into_response())
}

/// GET /api/gpu/metrics
pub(super) async fn gpu_handler(State(state): State<AppState>) -> Result<Response, CollectError> {
    let served = state.collector.get_gpu_metrics().await?;
    Ok(Json(GpuBody::new(&served)).into_response())
}

/// GET /api/system
pub(super) async fn system_handler(State(state): State<AppState>) -> Result<Response, CollectError> {
    let served = state.collector.get_system_snapshot().await?;
    Ok(Json(SystemBody::new(&served)).into_response())
}

/// GET /api/dashboard: all three domains; a failing domain is reported in place.
pub(super) async fn dashboard_handler(State(state): State<AppState>) -> impl IntoResponse {
    let collector = &state.collector;
    let (services, system, gpu) = tokio::join!(
        collector.get_service_records(),
        collector.get_system_snapshot(),
        collector.get_gpu_metrics(),
    );
    Json(json!({
        "services": domain_json(&services, ServicesBody::new),
        "system": domain_json(&system, SystemBody::new),
        "gpu": domain_json(&gpu, GpuBody::new),
        "timestamp": Utc::now(),
    }))
}

/// POST /api/services/{name}/{action}
pub(super) async fn control_handler(
    State(state): State<AppState>,
    Path((name, action)): Path<(String, String)>,
) -> Result<Response, CollectError> {
    let response = state.collector.control_service(&name, &action).await?;
    Ok(Json(response).into_response())
}

#[derive(Debug, Deserialize)]
pub(super) struct LogsQuery {
    tail: Option<usize>,
}

/// GET /api/services/{name}/logs?tail=N
pub(super) async fn logs_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<LogsQuery>,
) -> Result<Response, CollectError> {
    let logs = state.collector.get_logs(&name, query.tail).await?;
    Ok(Json(json!({
        "service": name,
        "logs": logs,
    }))
    .into_response())
}

/// GET /metrics: Prometheus text from the last GPU snapshot. Never probes.
pub(super) async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let gpus = state.collector.cached_gpu_metrics().await;
    let body = render_gpu_metrics(gpus.as_ref().map(|s| s.data.as_slice()).unwrap_or_default());
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}

fn render_gpu_metrics(gpus: &[GpuRecord]) -> String {
    let mut out = String::from(
        "# HELP gpu_utilization GPU utilization percentage\n# TYPE gpu_utilization gauge\n",
    );
    for gpu in gpus {
        if let Some(util) = gpu.gpu_util {
            let _ = writeln!(
                out,
                "gpu_utilization{{gpu=\"{}\",name=\"{}\"}} {}",
                gpu.index,
                escape_label(&gpu.name),
                util
            );
        }
    }
    out
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
