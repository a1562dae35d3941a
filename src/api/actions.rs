//! Remote action triggers
//!
//! `POST /api/actions/{token}` runs the pipeline when the token names its
//! action and answers with the run summary.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::Serialize;
use tracing::error;

use super::AppState;
use crate::pipeline::TriggerError;

#[derive(Debug, Serialize)]
pub struct ActionError {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ActionError {
            error: message.into(),
        }),
    )
        .into_response()
}

async fn trigger(State(dispatcher): State<AppState>, Path(token): Path<String>) -> Response {
    match dispatcher.handle_remote_trigger(&token).await {
        Ok(Some(summary)) => (StatusCode::OK, Json(summary)).into_response(),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            format!(
                "unknown action '{}', this instance handles '{}'",
                token,
                dispatcher.action().as_str()
            ),
        ),
        Err(TriggerError::AlreadyRunning) => {
            error_response(StatusCode::CONFLICT, "a run is already in progress")
        }
        Err(TriggerError::Pipeline(e)) => {
            error!(error = %e, kind = %e.kind(), "Triggered run failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/actions/{token}", post(trigger))
}
