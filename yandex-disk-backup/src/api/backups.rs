//! Backup endpoints: the five agent operations over HTTP.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::TryStreamExt;
use serde::Serialize;

use super::error::ApiError;
use super::AppState;
use crate::backup::{BackupAgent, BackupRecord};
use crate::disk::{ByteStream, DiskError};

/// Request header carrying the JSON record of an uploaded backup
pub const METADATA_HEADER: &str = "x-backup-metadata";

#[derive(Debug, Serialize)]
pub struct ListBackupsResponse {
    pub backups: Vec<BackupRecord>,
}

#[derive(Debug, Serialize)]
pub struct UploadBackupResponse {
    pub backup_id: String,
}

/// GET /backups
pub async fn list_backups(
    State(state): State<AppState>,
) -> Result<Json<ListBackupsResponse>, ApiError> {
    let backups = state.agent.list_backups().await?;
    Ok(Json(ListBackupsResponse { backups }))
}

/// GET /backups/{backup_id}
pub async fn get_backup(
    State(state): State<AppState>,
    Path(backup_id): Path<String>,
) -> Result<Json<BackupRecord>, ApiError> {
    Ok(Json(state.agent.get_backup(&backup_id).await?))
}

/// POST /backups - body is the archive, the record travels in
/// `x-backup-metadata`
pub async fn upload_backup(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<(StatusCode, Json<UploadBackupResponse>), ApiError> {
    let raw = headers
        .get(METADATA_HEADER)
        .ok_or_else(|| ApiError::BadRequest(format!("missing {METADATA_HEADER} header")))?;
    let record: BackupRecord = serde_json::from_slice(raw.as_bytes())
        .map_err(|e| ApiError::BadRequest(format!("invalid {METADATA_HEADER} header: {e}")))?;

    tracing::info!("Receiving backup {} ({} bytes)", record.name, record.size);

    let stream: ByteStream = Box::pin(
        body.into_data_stream()
            .map_err(|e| DiskError::Stream(std::io::Error::other(e))),
    );
    let backup_id = state.agent.upload_backup(stream, record).await?;

    Ok((StatusCode::CREATED, Json(UploadBackupResponse { backup_id })))
}

/// GET /backups/{backup_id}/download
pub async fn download_backup(
    State(state): State<AppState>,
    Path(backup_id): Path<String>,
) -> Result<Response, ApiError> {
    let stream = state.agent.download_backup(&backup_id).await?;

    let mut response = Body::from_stream(stream).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/x-tar"),
    );
    if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{backup_id}\"")) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    Ok(response)
}

/// DELETE /backups/{backup_id}
pub async fn delete_backup(
    State(state): State<AppState>,
    Path(backup_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.agent.delete_backup(&backup_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
