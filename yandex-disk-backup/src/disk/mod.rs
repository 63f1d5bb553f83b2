//! Remote store abstraction.
//!
//! `DiskApi` is the seam between the backup agent and Yandex Disk. The
//! production implementation is [`client::YandexDiskClient`]; tests run the
//! agent against an in-memory store.

pub mod client;
pub mod error;
#[cfg(test)]
pub(crate) mod memory;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::time::Duration;

pub use client::YandexDiskClient;
pub use error::DiskError;

/// Streamed payload flowing to or from the remote store.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, DiskError>> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    File,
    Dir,
}

/// A file or folder on the remote store, as reported by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,

    pub path: String,

    #[serde(rename = "type")]
    pub kind: ResourceKind,

    /// Byte length; only present for files
    #[serde(default)]
    pub size: Option<u64>,

    #[serde(default)]
    pub created: Option<DateTime<Utc>>,

    #[serde(default)]
    pub modified: Option<DateTime<Utc>>,
}

impl Resource {
    pub fn is_file(&self) -> bool {
        self.kind == ResourceKind::File
    }
}

/// Remote storage capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskInfo {
    #[serde(default)]
    pub total_space: u64,

    #[serde(default)]
    pub used_space: u64,
}

impl DiskInfo {
    pub fn free_space(&self) -> u64 {
        self.total_space.saturating_sub(self.used_space)
    }
}

/// Per-upload transport settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadOptions {
    pub overwrite: bool,

    /// Present a browser-style client identifier instead of the default one.
    /// The API throttles uploads from its default identifier to 128 KiB/s.
    pub spoof_user_agent: bool,

    pub timeout: Duration,
}

impl UploadOptions {
    /// Settings for a backup archive: long timeout, unthrottled identifier.
    pub fn archive() -> Self {
        Self {
            overwrite: true,
            spoof_user_agent: true,
            timeout: Duration::from_secs(3600),
        }
    }

    /// Settings for a small metadata document.
    pub fn metadata() -> Self {
        Self {
            overwrite: true,
            spoof_user_agent: false,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Remote filesystem operations used by the backup agent.
#[async_trait]
pub trait DiskApi: Send + Sync {
    /// Fetch total and used capacity.
    async fn disk_info(&self) -> Result<DiskInfo, DiskError>;

    /// Fetch the attributes of a single file or folder.
    async fn get_meta(&self, path: &str) -> Result<Resource, DiskError>;

    /// List the direct children of a folder.
    async fn list_dir(&self, path: &str) -> Result<Vec<Resource>, DiskError>;

    /// Create a single folder; its parent must exist.
    async fn mkdir(&self, path: &str) -> Result<(), DiskError>;

    /// Remove a resource, to the trash unless `permanently` is set.
    async fn remove(&self, path: &str, permanently: bool) -> Result<(), DiskError>;

    /// Upload a streamed body to `path`.
    async fn upload(
        &self,
        path: &str,
        body: ByteStream,
        options: UploadOptions,
    ) -> Result<(), DiskError>;

    /// Open a streamed download of `path`.
    async fn download(&self, path: &str) -> Result<ByteStream, DiskError>;
}

/// Join a folder path and a file name.
pub fn join_path(folder: &str, name: &str) -> String {
    format!("{}/{}", folder.trim_end_matches('/'), name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_from_api_json() {
        let json = r#"{
            "name": "backup.tar",
            "path": "disk:/Home Assistant Backups/backup.tar",
            "type": "file",
            "size": 1048576,
            "created": "2025-01-10T05:17:22+00:00",
            "modified": "2025-01-10T05:20:01+00:00",
            "md5": "ignored"
        }"#;

        let resource: Resource = serde_json::from_str(json).unwrap();
        assert!(resource.is_file());
        assert_eq!(resource.size, Some(1_048_576));
        assert_eq!(
            resource.modified.unwrap().to_rfc3339(),
            "2025-01-10T05:20:01+00:00"
        );
    }

    #[test]
    fn test_free_space_never_underflows() {
        let info = DiskInfo {
            total_space: 10,
            used_space: 12,
        };
        assert_eq!(info.free_space(), 0);
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("/Backups", "a.tar"), "/Backups/a.tar");
        assert_eq!(join_path("/Backups/", "a.tar"), "/Backups/a.tar");
    }
}
