//! Health check endpoint

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use super::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub action: &'static str,
    pub running: bool,
}

/// Always OK while the process is up; reports whether a run is active
async fn health(State(dispatcher): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        action: dispatcher.action().as_str(),
        running: dispatcher.is_running(),
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
