//! The backup record exchanged with the host and stored in metadata files.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::sidecar::is_sidecar_name;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddonInfo {
    pub name: String,
    pub slug: String,
    pub version: String,
}

/// Description of one backup.
///
/// `backup_id` is always the archive's file name on the disk. Fields the
/// host adds in newer versions are kept in `other` and written back
/// unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupRecord {
    #[serde(default)]
    pub backup_id: String,

    pub name: String,

    /// ISO-8601 creation timestamp
    pub date: String,

    /// Archive length in bytes
    #[serde(default)]
    pub size: u64,

    #[serde(default)]
    pub addons: Vec<AddonInfo>,

    #[serde(default)]
    pub database_included: bool,

    #[serde(default)]
    pub extra_metadata: Map<String, Value>,

    #[serde(default)]
    pub folders: Vec<String>,

    #[serde(default = "default_true")]
    pub homeassistant_included: bool,

    #[serde(default)]
    pub homeassistant_version: Option<String>,

    #[serde(default)]
    pub protected: bool,

    #[serde(flatten)]
    pub other: Map<String, Value>,
}

fn default_true() -> bool {
    true
}

impl BackupRecord {
    /// Record for an archive that has no metadata file.
    pub fn reconstructed(filename: &str, size: u64, date: DateTime<Utc>) -> Self {
        Self {
            backup_id: filename.to_string(),
            name: filename.to_string(),
            date: date.to_rfc3339(),
            size,
            addons: Vec::new(),
            database_included: false,
            extra_metadata: Map::new(),
            folders: Vec::new(),
            homeassistant_included: true,
            homeassistant_version: None,
            protected: false,
            other: Map::new(),
        }
    }

    /// Descriptive archive name built from the backup name and date,
    /// e.g. `Automatic_backup_2025.1.0_2025-01-10_05.17_22123456.tar`.
    pub fn suggested_filename(&self) -> String {
        let raw = match parse_date(&self.date) {
            Some(date) => format!("{} {}.tar", self.name, date.format("%Y-%m-%d %H.%M %S%6f")),
            None => format!("{}.tar", self.name),
        };

        raw.replace(['/', '\\'], "_")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_")
    }
}

fn parse_date(date: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(date) {
        return Some(parsed);
    }
    // Naive timestamps are taken as UTC
    NaiveDateTime::parse_from_str(date, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc().fixed_offset())
}

/// Whether a remote file name looks like a backup archive: a `.tar` or
/// `.tar.gz` file, or a bare hexadecimal backup id of 8 to 64 characters.
pub fn is_backup_file(name: &str) -> bool {
    if is_sidecar_name(name) {
        return false;
    }
    if name.ends_with(".tar") || name.ends_with(".tar.gz") {
        return true;
    }
    (8..=64).contains(&name.len())
        && name
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
