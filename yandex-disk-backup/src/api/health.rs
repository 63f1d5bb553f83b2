//! Health check endpoints.

use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;
use std::time::{SystemTime, UNIX_EPOCH};

use super::AppState;
use crate::backup::BackupAgent;

static START_TIME: std::sync::OnceLock<u64> = std::sync::OnceLock::new();

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

pub fn init_start_time() {
    START_TIME.get_or_init(now_secs);
}

/// GET /health - Health check endpoint
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = now_secs().saturating_sub(*START_TIME.get().unwrap_or(&0));

    Json(json!({
        "status": "ok",
        "agent": state.agent.name(),
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": uptime,
    }))
}

/// GET /version - Version information endpoint
pub async fn version() -> impl IntoResponse {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /diagnostics - Redacted configuration and cached disk capacity
pub async fn diagnostics(State(state): State<AppState>) -> impl IntoResponse {
    Json(crate::diagnostics::collect(&state.config, &state.agent))
}
