use axum::{extract::State, routing::get, Json, Router};
use tower_http::cors::CorsLayer;

use crate::ingest::scheduler::{Monitor, MonitorStatus};

pub const ALIVE_MESSAGE: &str = "✅ Bot is alive and working!";

/// Liveness and status routes. Merge with [`crate::telemetry::Metrics::router`] for `/metrics`.
pub fn router(monitor: Monitor) -> Router {
    Router::new()
        .route("/", get(alive))
        .route("/health", get(alive))
        .route("/status", get(status))
        .layer(CorsLayer::very_permissive())
        .with_state(monitor)
}

async fn alive() -> &'static str {
    ALIVE_MESSAGE
}

async fn status(State(monitor): State<Monitor>) -> Json<MonitorStatus> {
    Json(monitor.status())
}
