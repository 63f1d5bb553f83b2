//! Backup agent: the five host operations and their building blocks.

pub mod agent;
pub mod cache;
pub mod reconcile;
pub mod record;
pub mod sidecar;

use async_trait::async_trait;

use crate::disk::ByteStream;
use crate::utils::errors::Result;

pub use agent::YandexDiskAgent;
pub use record::{AddonInfo, BackupRecord};

/// Operations a backup store offers to the host.
#[async_trait]
pub trait BackupAgent: Send + Sync {
    /// Display name of the store.
    fn name(&self) -> &str;

    /// All backups in the store, newest first.
    async fn list_backups(&self) -> Result<Vec<BackupRecord>>;

    async fn get_backup(&self, backup_id: &str) -> Result<BackupRecord>;

    /// Store the archive read from `stream` and return its backup id.
    async fn upload_backup(&self, stream: ByteStream, record: BackupRecord) -> Result<String>;

    async fn download_backup(&self, backup_id: &str) -> Result<ByteStream>;

    /// Move the archive and its metadata to the trash.
    async fn delete_backup(&self, backup_id: &str) -> Result<()>;
}
