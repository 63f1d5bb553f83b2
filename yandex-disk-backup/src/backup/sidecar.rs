//! Metadata files stored next to each archive.
//!
//! The metadata of `<folder>/X.tar` lives in `<folder>/X.tar.metadata.json`.
//! Older deployments wrote it to `<folder>/X.metadata.json`; that name is
//! still read and cleaned up.
//!
//! Only [`write`] reports failures. Reading never fails: a missing or
//! unreadable file is reported as `None` and the caller falls back to the
//! archive's own attributes.

use bytes::{Bytes, BytesMut};
use futures_util::{stream, StreamExt};
use tracing::{debug, warn};

use super::record::{is_backup_file, BackupRecord};
use crate::disk::{DiskApi, DiskError, UploadOptions};

pub const SIDECAR_SUFFIX: &str = ".metadata.json";

/// Metadata files larger than this are treated as unreadable
const MAX_SIDECAR_SIZE: usize = 1024 * 1024;

pub fn sidecar_path(archive_path: &str) -> String {
    format!("{archive_path}{SIDECAR_SUFFIX}")
}

/// Pre-suffix name used by older deployments, if it differs from the
/// current one.
///
/// There is none when the stem is itself a backup file name: `abcdef12.metadata.json`
/// belongs to the archive `abcdef12`, not to `abcdef12.tar`.
pub fn legacy_sidecar_path(archive_path: &str) -> Option<String> {
    let stem = archive_path.strip_suffix(".tar")?;
    let stem_name = stem.rsplit('/').next().unwrap_or(stem);
    if is_backup_file(stem_name) {
        return None;
    }
    Some(format!("{stem}{SIDECAR_SUFFIX}"))
}

pub fn is_sidecar_name(name: &str) -> bool {
    name.ends_with(SIDECAR_SUFFIX)
}

pub fn encode(record: &BackupRecord) -> Result<Bytes, serde_json::Error> {
    serde_json::to_vec_pretty(record).map(Bytes::from)
}

pub fn decode(data: &[u8]) -> Option<BackupRecord> {
    serde_json::from_slice(data).ok()
}

/// Upload the metadata file for `archive_path`.
pub async fn write(
    disk: &dyn DiskApi,
    archive_path: &str,
    record: &BackupRecord,
) -> Result<(), DiskError> {
    let path = sidecar_path(archive_path);
    let data = encode(record).map_err(|e| DiskError::Decode(e.to_string()))?;

    let body = Box::pin(stream::once(async move { Ok::<_, DiskError>(data) }));
    disk.upload(&path, body, UploadOptions::metadata()).await?;

    debug!("Uploaded metadata to {}", path);
    Ok(())
}

/// Load the metadata of `archive_path`, trying the legacy name second.
pub async fn read(disk: &dyn DiskApi, archive_path: &str) -> Option<BackupRecord> {
    let primary = sidecar_path(archive_path);
    let candidates = std::iter::once(primary).chain(legacy_sidecar_path(archive_path));

    for path in candidates {
        match fetch(disk, &path).await {
            Ok(data) => match decode(&data) {
                Some(record) => return Some(record),
                None => {
                    warn!("Ignoring malformed metadata file {}", path);
                    return None;
                }
            },
            Err(DiskError::NotFound(_)) => {
                debug!("No metadata file found at {}", path);
            }
            Err(e) => {
                warn!("Failed to load metadata from {}: {}", path, e);
                return None;
            }
        }
    }

    None
}

async fn fetch(disk: &dyn DiskApi, path: &str) -> Result<Bytes, DiskError> {
    let mut body = disk.download(path).await?;
    let mut buffer = BytesMut::new();

    while let Some(chunk) = body.next().await {
        buffer.extend_from_slice(&chunk?);
        if buffer.len() > MAX_SIDECAR_SIZE {
            return Err(DiskError::Decode(format!(
                "metadata file {path} exceeds {MAX_SIDECAR_SIZE} bytes"
            )));
        }
    }

    Ok(buffer.freeze())
}

/// Move the metadata files of `archive_path` to the trash. Failures are
/// logged and ignored.
pub async fn remove(disk: &dyn DiskApi, archive_path: &str) {
    let primary = sidecar_path(archive_path);
    let candidates = std::iter::once(primary).chain(legacy_sidecar_path(archive_path));

    for path in candidates {
        match disk.remove(&path, false).await {
            Ok(()) => debug!("Deleted metadata file: {}", path),
            Err(DiskError::NotFound(_)) => {
                debug!("Metadata file not found: {}", path)
            }
            Err(e) => warn!("Failed to delete metadata file {}: {}", path, e),
        }
    }
}
