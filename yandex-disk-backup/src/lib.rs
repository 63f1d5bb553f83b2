//! Yandex Disk Backup Library
//!
//! Stores Home Assistant backup archives on Yandex Disk, keeping each
//! archive's metadata in a JSON file next to it.

pub mod api;
pub mod backup;
pub mod config;
pub mod daemon;
pub mod diagnostics;
pub mod disk;
pub mod transfer;
pub mod utils;

// Re-export commonly used types
pub use backup::{BackupAgent, BackupRecord, YandexDiskAgent};
pub use config::Config;
pub use utils::errors::{AgentError, ErrorKind, Result};
