//! In-memory `DiskApi` used by the agent and API tests.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use futures_util::{stream, StreamExt};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use super::{ByteStream, DiskApi, DiskError, DiskInfo, Resource, ResourceKind, UploadOptions};

#[derive(Debug, Clone)]
struct StoredFile {
    data: Bytes,
    modified: DateTime<Utc>,
}

#[derive(Debug)]
struct State {
    files: BTreeMap<String, StoredFile>,
    dirs: BTreeSet<String>,
    trash: Vec<String>,
    info: DiskInfo,
    clock: DateTime<Utc>,
    disk_info_calls: usize,
    uploads: Vec<(String, UploadOptions)>,
    fail_disk_info: bool,
    fail_sidecar_uploads: bool,
    fail_removals: bool,
}

pub(crate) struct MemoryDisk {
    state: Mutex<State>,
}

fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

impl MemoryDisk {
    pub(crate) fn new() -> Self {
        let mut dirs = BTreeSet::new();
        dirs.insert("/".to_string());

        Self {
            state: Mutex::new(State {
                files: BTreeMap::new(),
                dirs,
                trash: Vec::new(),
                info: DiskInfo {
                    total_space: 10 * 1024 * 1024 * 1024,
                    used_space: 1024 * 1024 * 1024,
                },
                clock: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
                disk_info_calls: 0,
                uploads: Vec::new(),
                fail_disk_info: false,
                fail_sidecar_uploads: false,
                fail_removals: false,
            }),
        }
    }

    /// Store a file directly, creating its parent folders.
    pub(crate) fn put(&self, path: &str, data: &[u8], modified: DateTime<Utc>) {
        let mut state = self.state.lock().unwrap();
        let mut dir = parent(path).to_string();
        while dir != "/" {
            state.dirs.insert(dir.clone());
            dir = parent(&dir).to_string();
        }
        state.files.insert(
            path.to_string(),
            StoredFile {
                data: Bytes::copy_from_slice(data),
                modified,
            },
        );
    }

    pub(crate) fn add_dir(&self, path: &str) {
        self.state.lock().unwrap().dirs.insert(path.to_string());
    }

    pub(crate) fn file(&self, path: &str) -> Option<Bytes> {
        self.state
            .lock()
            .unwrap()
            .files
            .get(path)
            .map(|f| f.data.clone())
    }

    pub(crate) fn has_dir(&self, path: &str) -> bool {
        self.state.lock().unwrap().dirs.contains(path)
    }

    pub(crate) fn trash(&self) -> Vec<String> {
        self.state.lock().unwrap().trash.clone()
    }

    pub(crate) fn set_info(&self, info: DiskInfo) {
        self.state.lock().unwrap().info = info;
    }

    pub(crate) fn disk_info_calls(&self) -> usize {
        self.state.lock().unwrap().disk_info_calls
    }

    pub(crate) fn uploads(&self) -> Vec<(String, UploadOptions)> {
        self.state.lock().unwrap().uploads.clone()
    }

    pub(crate) fn fail_disk_info(&self, fail: bool) {
        self.state.lock().unwrap().fail_disk_info = fail;
    }

    pub(crate) fn fail_sidecar_uploads(&self, fail: bool) {
        self.state.lock().unwrap().fail_sidecar_uploads = fail;
    }

    pub(crate) fn fail_removals(&self, fail: bool) {
        self.state.lock().unwrap().fail_removals = fail;
    }

    fn file_resource(path: &str, file: &StoredFile) -> Resource {
        Resource {
            name: file_name(path).to_string(),
            path: format!("disk:{path}"),
            kind: ResourceKind::File,
            size: Some(file.data.len() as u64),
            created: Some(file.modified),
            modified: Some(file.modified),
        }
    }

    fn dir_resource(path: &str) -> Resource {
        Resource {
            name: file_name(path).to_string(),
            path: format!("disk:{path}"),
            kind: ResourceKind::Dir,
            size: None,
            created: None,
            modified: None,
        }
    }
}

#[async_trait]
impl DiskApi for MemoryDisk {
    async fn disk_info(&self) -> Result<DiskInfo, DiskError> {
        let mut state = self.state.lock().unwrap();
        state.disk_info_calls += 1;
        if state.fail_disk_info {
            return Err(DiskError::Connection("disk info unavailable".into()));
        }
        Ok(state.info)
    }

    async fn get_meta(&self, path: &str) -> Result<Resource, DiskError> {
        let state = self.state.lock().unwrap();
        if let Some(file) = state.files.get(path) {
            return Ok(Self::file_resource(path, file));
        }
        if state.dirs.contains(path) {
            return Ok(Self::dir_resource(path));
        }
        Err(DiskError::NotFound(path.to_string()))
    }

    async fn list_dir(&self, path: &str) -> Result<Vec<Resource>, DiskError> {
        let state = self.state.lock().unwrap();
        if !state.dirs.contains(path) {
            return Err(DiskError::NotFound(path.to_string()));
        }

        let mut items: Vec<Resource> = state
            .dirs
            .iter()
            .filter(|d| d.as_str() != "/" && parent(d) == path)
            .map(|d| Self::dir_resource(d))
            .collect();
        items.extend(
            state
                .files
                .iter()
                .filter(|(p, _)| parent(p) == path)
                .map(|(p, f)| Self::file_resource(p, f)),
        );
        Ok(items)
    }

    async fn mkdir(&self, path: &str) -> Result<(), DiskError> {
        let mut state = self.state.lock().unwrap();
        if state.dirs.contains(path) {
            return Err(DiskError::AlreadyExists(path.to_string()));
        }
        if !state.dirs.contains(parent(path)) {
            return Err(DiskError::NotFound(parent(path).to_string()));
        }
        state.dirs.insert(path.to_string());
        Ok(())
    }

    async fn remove(&self, path: &str, _permanently: bool) -> Result<(), DiskError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_removals {
            return Err(DiskError::Api {
                status: 500,
                message: "removal failed".into(),
            });
        }
        if state.files.remove(path).is_some() {
            state.trash.push(path.to_string());
            return Ok(());
        }
        if state.dirs.remove(path) {
            let prefix = format!("{path}/");
            state.files.retain(|p, _| !p.starts_with(&prefix));
            state.dirs.retain(|d| !d.starts_with(&prefix));
            state.trash.push(path.to_string());
            return Ok(());
        }
        Err(DiskError::NotFound(path.to_string()))
    }

    async fn upload(
        &self,
        path: &str,
        mut body: ByteStream,
        options: UploadOptions,
    ) -> Result<(), DiskError> {
        {
            let mut state = self.state.lock().unwrap();
            state.uploads.push((path.to_string(), options));
            if state.fail_sidecar_uploads && path.ends_with(".metadata.json") {
                return Err(DiskError::Api {
                    status: 500,
                    message: "upload failed".into(),
                });
            }
            if !state.dirs.contains(parent(path)) {
                return Err(DiskError::NotFound(parent(path).to_string()));
            }
            if !options.overwrite && state.files.contains_key(path) {
                return Err(DiskError::AlreadyExists(path.to_string()));
            }
        }

        let mut buffer = BytesMut::new();
        while let Some(chunk) = body.next().await {
            buffer.extend_from_slice(&chunk?);
        }

        let mut state = self.state.lock().unwrap();
        state.clock = state.clock + ChronoDuration::seconds(1);
        let modified = state.clock;
        state.files.insert(
            path.to_string(),
            StoredFile {
                data: buffer.freeze(),
                modified,
            },
        );
        Ok(())
    }

    async fn download(&self, path: &str) -> Result<ByteStream, DiskError> {
        let data = self
            .state
            .lock()
            .unwrap()
            .files
            .get(path)
            .map(|f| f.data.clone())
            .ok_or_else(|| DiskError::NotFound(path.to_string()))?;

        // Small pieces, like a network body
        let pieces: Vec<Result<Bytes, DiskError>> = data
            .chunks(1000)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        Ok(Box::pin(stream::iter(pieces)))
    }
}
