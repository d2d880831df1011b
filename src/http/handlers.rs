use super::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use tracing::{error, info};

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct InputResponse {
    pub accepted: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn client_gone() -> axum::response::Response {
    error!("Client loop is no longer running");
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorResponse {
            error: "Client loop is not running".to_string(),
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /ptt/press
/// Queue a start request; the outcome shows up on /status
pub async fn press(State(state): State<AppState>) -> impl IntoResponse {
    info!("Push-to-talk press via HTTP");

    if !state.input.request_start() {
        return client_gone();
    }

    (
        StatusCode::ACCEPTED,
        Json(InputResponse {
            accepted: true,
            message: "Start requested".to_string(),
        }),
    )
        .into_response()
}

/// POST /ptt/release
/// Queue a stop request
pub async fn release(State(state): State<AppState>) -> impl IntoResponse {
    info!("Push-to-talk release via HTTP");

    if !state.input.request_stop() {
        return client_gone();
    }

    (
        StatusCode::ACCEPTED,
        Json(InputResponse {
            accepted: true,
            message: "Stop requested".to_string(),
        }),
    )
        .into_response()
}

/// GET /status
/// Current session, connection, status, transcript, and response text
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.observers.snapshot()))
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
