//! Read-only diagnostics report.
//!
//! Built from the configuration and the cached disk capacity only; it never
//! contacts the disk.

use serde::Serialize;
use serde_json::Value;

use crate::backup::cache::CachedDiskInfo;
use crate::backup::YandexDiskAgent;
use crate::config::Config;
use crate::transfer::progress::to_gb;

/// Keys whose values are hidden, at any depth
const TO_REDACT: &[&str] = &["token", "access_token", "refresh_token"];
const REDACTED: &str = "**REDACTED**";

#[derive(Debug, Serialize)]
pub struct Diagnostics {
    pub config: Value,
    pub backup_folder: String,
    pub unique_id: String,
    pub storage_info: Option<StorageInfo>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct StorageInfo {
    pub total_space_gb: f64,
    pub used_space_gb: f64,
    pub free_space_gb: f64,
    pub used_percentage: f64,
    pub age_seconds: u64,
}

impl From<CachedDiskInfo> for StorageInfo {
    fn from(cached: CachedDiskInfo) -> Self {
        let info = cached.info;
        let used_percentage = if info.total_space > 0 {
            (info.used_space as f64 / info.total_space as f64 * 1000.0).round() / 10.0
        } else {
            0.0
        };

        Self {
            total_space_gb: to_gb(info.total_space),
            used_space_gb: to_gb(info.used_space),
            free_space_gb: to_gb(info.free_space()),
            used_percentage,
            age_seconds: cached.age().as_secs(),
        }
    }
}

pub fn collect(config: &Config, agent: &YandexDiskAgent) -> Diagnostics {
    let mut config_value = serde_json::to_value(config).unwrap_or(Value::Null);
    redact(&mut config_value);

    Diagnostics {
        config: config_value,
        backup_folder: agent.config().backup_folder.clone(),
        unique_id: agent.config().unique_id(),
        storage_info: agent.cached_disk_info().map(StorageInfo::from),
    }
}

pub fn redact(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, v) in map.iter_mut() {
                if TO_REDACT.contains(&key.as_str()) {
                    *v = Value::String(REDACTED.to_string());
                } else {
                    redact(v);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact),
        _ => {}
    }
}
