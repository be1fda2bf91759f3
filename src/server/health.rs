use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use super::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: u64,
    pub total_jobs: usize,
    pub saved_searches: usize,
    pub sources: Vec<String>,
    pub version: String,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    tracing::debug!("Health check");

    let mut status = "ok";
    let total_jobs = match state.store.count().await {
        Ok(n) => n,
        Err(e) => {
            tracing::error!("Health check could not count jobs: {}", e);
            status = "degraded";
            0
        }
    };
    let saved_searches = match state.registry.list().await {
        Ok(list) => list.len(),
        Err(e) => {
            tracing::error!("Health check could not list saved searches: {}", e);
            status = "degraded";
            0
        }
    };

    let response = HealthResponse {
        status: status.to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        total_jobs,
        saved_searches,
        sources: state.ingestor.source_names(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (StatusCode::OK, Json(response))
}
