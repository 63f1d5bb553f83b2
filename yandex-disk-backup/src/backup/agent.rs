//! Yandex Disk implementation of [`BackupAgent`].
//!
//! Archives live in the configured backup folder under the name returned
//! by [`BackupRecord::suggested_filename`]; that name is the backup id.
//! Each archive has a metadata file next to it (see [`super::sidecar`]).

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::cache::{CachedDiskInfo, DiskInfoCache};
use super::reconcile::{newest_first, reconcile};
use super::record::{is_backup_file, BackupRecord};
use super::{sidecar, BackupAgent};
use crate::config::DiskConfig;
use crate::disk::{
    join_path, ByteStream, DiskApi, DiskError, DiskInfo, UploadOptions, YandexDiskClient,
};
use crate::transfer::{self, progress};
use crate::utils::errors::{AgentError, Result};

pub type ClientResult = std::result::Result<Arc<dyn DiskApi>, DiskError>;

/// Builds the remote client. Called on the blocking pool.
pub type ClientFactory = Arc<dyn Fn() -> ClientResult + Send + Sync>;

pub struct YandexDiskAgent {
    config: DiskConfig,
    factory: ClientFactory,
    client: tokio::sync::Mutex<Option<Arc<dyn DiskApi>>>,
    folder_ready: AtomicBool,
    cache: DiskInfoCache,
    cancel: Mutex<CancellationToken>,
}

impl YandexDiskAgent {
    /// Agent talking to the Yandex Disk REST API.
    pub fn new(config: DiskConfig) -> Self {
        let token = config.token.clone();
        let api_url = config.api_url.clone();
        let factory: ClientFactory = Arc::new(move || -> ClientResult {
            Ok(Arc::new(YandexDiskClient::new(&token, &api_url)?))
        });
        Self::with_factory(config, factory)
    }

    pub fn with_factory(config: DiskConfig, factory: ClientFactory) -> Self {
        Self {
            config,
            factory,
            client: tokio::sync::Mutex::new(None),
            folder_ready: AtomicBool::new(false),
            cache: DiskInfoCache::default(),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn config(&self) -> &DiskConfig {
        &self.config
    }

    fn folder(&self) -> &str {
        &self.config.backup_folder
    }

    /// The shared client, built on first use.
    async fn client(&self) -> Result<Arc<dyn DiskApi>> {
        let mut slot = self.client.lock().await;
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }

        let factory = self.factory.clone();
        let client = tokio::task::spawn_blocking(move || factory())
            .await
            .map_err(|e| AgentError::Remote(format!("client construction failed: {e}")))??;

        debug!("Created Yandex Disk client");
        *slot = Some(client.clone());
        Ok(client)
    }

    fn cancel_token(&self) -> CancellationToken {
        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Disk capacity, served from the cache unless stale or `force` is set.
    pub async fn disk_info(&self, force: bool) -> Result<DiskInfo> {
        let client = self.client().await?;
        self.cache
            .get(force, || async move { client.disk_info().await })
            .await
            .map_err(|e| log_failure("get disk info", e))
    }

    /// Cached capacity without contacting the disk.
    pub fn cached_disk_info(&self) -> Option<CachedDiskInfo> {
        self.cache.snapshot()
    }

    /// Check the token with a capacity round-trip.
    pub async fn validate(&self) -> Result<DiskInfo> {
        let info = self.disk_info(true).await?;
        info!(
            "Connected to Yandex Disk: {} free of {}",
            progress::format_bytes(info.free_space()),
            progress::format_bytes(info.total_space)
        );
        Ok(info)
    }

    /// Cancel in-flight transfers and release the client.
    pub async fn close(&self) {
        {
            let mut cancel = self.cancel.lock().unwrap_or_else(PoisonError::into_inner);
            cancel.cancel();
            *cancel = CancellationToken::new();
        }

        if self.client.lock().await.take().is_some() {
            debug!("Closed Yandex Disk client");
        }
        self.folder_ready.store(false, Ordering::SeqCst);
    }

    /// Create the backup folder and any missing parents.
    async fn ensure_backup_folder(&self, client: &dyn DiskApi) -> Result<()> {
        if self.folder_ready.load(Ordering::SeqCst) {
            return Ok(());
        }

        let mut current = String::new();
        for segment in self.folder().split('/').filter(|s| !s.is_empty()) {
            current.push('/');
            current.push_str(segment);

            match client.mkdir(&current).await {
                Ok(()) => info!("Created folder: {}", current),
                Err(DiskError::AlreadyExists(_)) => {}
                Err(e) => {
                    // Might still be usable, e.g. created concurrently
                    match client.get_meta(&current).await {
                        Ok(meta) if !meta.is_file() => {}
                        _ => {
                            error!("Failed to create backup folder {}: {}", current, e);
                            return Err(match e {
                                DiskError::Unauthorized(msg) => AgentError::Authentication(msg),
                                _ => AgentError::Folder(self.folder().to_string()),
                            });
                        }
                    }
                }
            }
        }

        self.folder_ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Remote path of a backup id; ids that cannot name an archive in the
    /// backup folder are reported as not found.
    fn archive_path(&self, backup_id: &str) -> Result<String> {
        let valid = !backup_id.is_empty()
            && backup_id != "."
            && backup_id != ".."
            && !backup_id.contains(['/', '\\'])
            && !sidecar::is_sidecar_name(backup_id);

        if !valid {
            debug!("Rejecting invalid backup id {:?}", backup_id);
            return Err(AgentError::NotFound(backup_id.to_string()));
        }
        Ok(join_path(self.folder(), backup_id))
    }

    async fn list(
        &self,
        client: &dyn DiskApi,
    ) -> std::result::Result<Vec<BackupRecord>, DiskError> {
        debug!("Listing backups in folder: {}", self.folder());
        let items = client.list_dir(self.folder()).await?;
        let total = items.len();

        let mut found = Vec::new();
        for item in items {
            let accepted = item.is_file() && is_backup_file(&item.name);
            debug!("Filter check for {:?}: backup={}", item.name, accepted);
            if !accepted {
                continue;
            }

            let path = join_path(self.folder(), &item.name);
            let metadata = sidecar::read(client, &path).await;
            let reconciled = reconcile(&item.name, &item, metadata);
            if reconciled.is_reconstructed() {
                debug!("No metadata for {}, using file attributes", item.name);
            }
            found.push((item.modified, reconciled.into_record()));
        }

        found.sort_by(|a, b| {
            newest_first((a.0, a.1.backup_id.as_str()), (b.0, b.1.backup_id.as_str()))
        });
        debug!("Listed {} backups out of {} items", found.len(), total);
        Ok(found.into_iter().map(|(_, record)| record).collect())
    }
}

/// Log a remote failure; a plain miss only at debug level.
fn trace_failure(operation: &str, err: &DiskError) {
    match err {
        DiskError::NotFound(msg) => debug!("{} failed: not found: {}", operation, msg),
        DiskError::Cancelled => info!("{} cancelled", operation),
        other => error!("{} failed: {}", operation, other),
    }
}

fn log_failure(operation: &str, err: DiskError) -> AgentError {
    trace_failure(operation, &err);
    err.into()
}

fn log_backup_failure(operation: &str, backup_id: &str, err: DiskError) -> AgentError {
    trace_failure(operation, &err);
    AgentError::for_backup(backup_id, err)
}

#[async_trait]
impl BackupAgent for YandexDiskAgent {
    fn name(&self) -> &str {
        "Yandex Disk"
    }

    async fn list_backups(&self) -> Result<Vec<BackupRecord>> {
        let client = self.client().await?;

        match self.list(client.as_ref()).await {
            Ok(backups) => Ok(backups),
            Err(DiskError::NotFound(_)) => {
                info!("Backup folder not found, creating: {}", self.folder());
                self.folder_ready.store(false, Ordering::SeqCst);
                self.ensure_backup_folder(client.as_ref()).await?;
                Ok(Vec::new())
            }
            Err(e) => Err(log_failure("List backups", e)),
        }
    }

    async fn get_backup(&self, backup_id: &str) -> Result<BackupRecord> {
        let path = self.archive_path(backup_id)?;
        let client = self.client().await?;

        let meta = client
            .get_meta(&path)
            .await
            .map_err(|e| log_backup_failure("Get backup", backup_id, e))?;
        if !meta.is_file() {
            return Err(AgentError::NotFound(backup_id.to_string()));
        }

        let metadata = sidecar::read(client.as_ref(), &path).await;
        Ok(reconcile(backup_id, &meta, metadata).into_record())
    }

    async fn upload_backup(&self, stream: ByteStream, record: BackupRecord) -> Result<String> {
        let filename = record.suggested_filename();
        let path = join_path(self.folder(), &filename);
        let client = self.client().await?;

        self.ensure_backup_folder(client.as_ref()).await?;

        let info = self.disk_info(false).await?;
        if info.free_space() < record.size {
            let msg = format!(
                "{} free, {} needed",
                progress::format_bytes(info.free_space()),
                progress::format_bytes(record.size)
            );
            error!("Not enough space for {}: {}", filename, msg);
            return Err(AgentError::InsufficientStorage(msg));
        }

        debug!(
            "Starting upload of {} to {} (expected size: {})",
            record.name,
            path,
            progress::format_bytes(record.size)
        );

        let cancel = self.cancel_token();
        let body = transfer::instrument(stream, format!("Upload {filename}"), cancel.clone());
        let transferred = body.counter();
        let started = Instant::now();

        let upload = client.upload(&path, Box::pin(body), UploadOptions::archive());
        let result = tokio::select! {
            result = upload => result,
            _ = cancel.cancelled() => Err(DiskError::Cancelled),
        };
        if let Err(e) = result {
            // A cancelled body surfaces as a transport error
            let e = if cancel.is_cancelled() { DiskError::Cancelled } else { e };
            if matches!(e, DiskError::NotFound(_)) {
                // Folder removed behind our back; recreate it next time
                self.folder_ready.store(false, Ordering::SeqCst);
            }
            return Err(log_failure("Upload", e));
        }

        let elapsed = started.elapsed();
        let bytes = transferred.load(Ordering::Relaxed);

        let mut stored = record.clone();
        stored.backup_id = filename.clone();
        if let Err(e) = sidecar::write(client.as_ref(), &path, &stored).await {
            warn!("Failed to upload metadata for {}: {}", filename, e);
        }

        match client.get_meta(&path).await {
            Ok(meta) if meta.size != Some(record.size) => warn!(
                "Upload size mismatch for {}: expected {}, got {:?}",
                filename, record.size, meta.size
            ),
            Ok(_) => {}
            Err(e) => error!("Upload verification failed for {}: {}", filename, e),
        }

        info!(
            "Uploaded backup {} as {} ({} in {}, {})",
            record.name,
            filename,
            progress::format_bytes(bytes),
            progress::format_duration(elapsed.as_secs()),
            progress::format_speed(progress::average_speed(bytes, elapsed))
        );
        Ok(filename)
    }

    async fn download_backup(&self, backup_id: &str) -> Result<ByteStream> {
        let path = self.archive_path(backup_id)?;
        let client = self.client().await?;

        let stream = client
            .download(&path)
            .await
            .map_err(|e| log_backup_failure("Download", backup_id, e))?;

        info!("Downloading backup {}", backup_id);
        let label = format!("Download {backup_id}");
        let body = transfer::instrument(stream, label, self.cancel_token());
        Ok(Box::pin(body))
    }

    async fn delete_backup(&self, backup_id: &str) -> Result<()> {
        let path = self.archive_path(backup_id)?;
        let client = self.client().await?;

        match client.remove(&path, false).await {
            Ok(()) => info!("Deleted backup: {}", backup_id),
            Err(DiskError::NotFound(_)) => {
                debug!("Backup not found, may already be deleted: {}", backup_id);
                sidecar::remove(client.as_ref(), &path).await;
                return Err(AgentError::NotFound(backup_id.to_string()));
            }
            Err(e) => return Err(log_failure("Delete", e)),
        }

        sidecar::remove(client.as_ref(), &path).await;
        Ok(())
    }
}
