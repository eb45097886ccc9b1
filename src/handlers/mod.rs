pub mod load;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::AppState;

// ─── GET /metrics ────────────────────────────────────────────────

/// Prometheus text exposition of every collector in the registry.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Result<String, AppError> {
    state
        .registry
        .metrics()
        .gather_text()
        .map_err(|e| AppError::Internal(e.to_string()))
}

// ─── Unified error type ──────────────────────────────────────────

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Internal(String),
    AlreadyRunning,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            Self::AlreadyRunning => (StatusCode::CONFLICT, "Load already running".into()),
        };

        let body = serde_json::json!({
            "error":  message,
            "status": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}
