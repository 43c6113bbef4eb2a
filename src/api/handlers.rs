//! HTTP request handlers

use super::ws::ws_handler;
use super::AppState;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Interview sessions, one per connection
        .route("/ws", get(ws_handler))
        .route("/ws/:client_id", get(ws_handler))
        .route("/health", get(health))
        .route("/version", get(get_version))
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub active_sessions: usize,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        active_sessions: state.sessions.active_sessions(),
    })
}

async fn get_version() -> &'static str {
    concat!("interview-coach ", env!("CARGO_PKG_VERSION"))
}
