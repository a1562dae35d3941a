//! HTTP surface: health probe and remote action triggers

pub mod actions;
pub mod health;

use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::pipeline::TriggerDispatcher;

/// Shared handler state
pub type AppState = Arc<TriggerDispatcher>;

/// Build the full router
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .nest("/api", actions::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
