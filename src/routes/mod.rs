// HTTP routes

mod http;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::collector::Collector;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) collector: Arc<Collector>,
}

pub fn app(collector: Arc<Collector>) -> Router {
    let state = AppState { collector };
    Router::new()
        .route("/", get(|| async { "boxwatch: container and GPU telemetry" })) // GET /
        .route("/health", get(http::health_handler)) // GET /health
        .route("/version", get(http::version_handler)) // GET /version
        .route("/metrics", get(http::metrics_handler)) // GET /metrics
        .route("/api/dashboard", get(http::dashboard_handler)) // GET /api/dashboard
        .route("/api/services", get(http::services_handler)) // GET /api/services
        .route("/api/system", get(http::system_handler)) // GET /api/system
        .route("/api/gpu/metrics", get(http::gpu_handler)) // GET /api/gpu/metrics
        .route("/api/services/{name}/logs", get(http::logs_handler)) // GET /api/services/:name/logs
        .route("/api/services/{name}/{action}", post(http::control_handler)) // POST /api/services/:name/:action
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
