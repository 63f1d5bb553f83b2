//! HTTP API exposing the backup agent.

pub mod backups;
pub mod error;
pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::backup::YandexDiskAgent;
use crate::config::Config;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<YandexDiskAgent>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(agent: Arc<YandexDiskAgent>, config: Arc<Config>) -> Self {
        Self { agent, config }
    }
}

/// Create the API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(health::health))
        .route("/version", get(health::version))
        .route("/diagnostics", get(health::diagnostics))
        // Backup endpoints
        .route(
            "/backups",
            get(backups::list_backups)
                .post(backups::upload_backup)
                .layer(DefaultBodyLimit::disable()),
        )
        .route(
            "/backups/{backup_id}",
            get(backups::get_backup).delete(backups::delete_backup),
        )
        .route("/backups/{backup_id}/download", get(backups::download_backup))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
