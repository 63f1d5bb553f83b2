//! Short-lived cache of the disk capacity.
//!
//! A fresh value is served for [`DEFAULT_TTL`]. Refreshes are serialized so
//! concurrent callers share one remote call, and a failed refresh leaves the
//! previous value in place.

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use tokio::time::{Duration, Instant};

use crate::disk::DiskInfo;

pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CachedDiskInfo {
    pub info: DiskInfo,
    pub fetched_at: Instant,
}

impl CachedDiskInfo {
    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }
}

pub struct DiskInfoCache {
    ttl: Duration,
    entry: Mutex<Option<CachedDiskInfo>>,
    refresh: tokio::sync::Mutex<()>,
}

impl Default for DiskInfoCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl DiskInfoCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: Mutex::new(None),
            refresh: tokio::sync::Mutex::new(()),
        }
    }

    /// Last fetched value, fresh or not.
    pub fn snapshot(&self) -> Option<CachedDiskInfo> {
        *self.entry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fresh(&self) -> Option<DiskInfo> {
        self.snapshot()
            .filter(|cached| cached.age() < self.ttl)
            .map(|cached| cached.info)
    }

    /// Return the cached value unless it is stale or `force` is set;
    /// otherwise call `fetch` and store its result.
    pub async fn get<F, Fut, E>(&self, force: bool, fetch: F) -> Result<DiskInfo, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<DiskInfo, E>>,
    {
        if !force {
            if let Some(info) = self.fresh() {
                return Ok(info);
            }
        }

        let _guard = self.refresh.lock().await;

        // Another caller may have refreshed while we waited
        if !force {
            if let Some(info) = self.fresh() {
                return Ok(info);
            }
        }

        let info = fetch().await?;
        *self.entry.lock().unwrap_or_else(PoisonError::into_inner) = Some(CachedDiskInfo {
            info,
            fetched_at: Instant::now(),
        });
        Ok(info)
    }
}
