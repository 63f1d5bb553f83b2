//! Building the record of an archive from its metadata file or, failing
//! that, from the archive's own attributes.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;

use super::record::BackupRecord;
use crate::disk::Resource;

/// Where a reconciled record came from.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciled {
    /// Read from the metadata file
    Sidecar(BackupRecord),
    /// Rebuilt from the archive attributes; no usable metadata file
    Reconstructed(BackupRecord),
}

impl Reconciled {
    pub fn record(&self) -> &BackupRecord {
        match self {
            Reconciled::Sidecar(record) | Reconciled::Reconstructed(record) => record,
        }
    }

    pub fn into_record(self) -> BackupRecord {
        match self {
            Reconciled::Sidecar(record) | Reconciled::Reconstructed(record) => record,
        }
    }

    pub fn is_reconstructed(&self) -> bool {
        matches!(self, Reconciled::Reconstructed(_))
    }
}

/// Produce the record for the archive `filename` described by `file`.
///
/// The returned `backup_id` is always `filename`, whatever the metadata file
/// says, and the size is the remote size whenever the disk reports one.
pub fn reconcile(filename: &str, file: &Resource, sidecar: Option<BackupRecord>) -> Reconciled {
    match sidecar {
        Some(mut record) => {
            record.backup_id = filename.to_string();
            if let Some(size) = file.size {
                record.size = size;
            }
            Reconciled::Sidecar(record)
        }
        None => {
            let date = file
                .modified
                .or(file.created)
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
            Reconciled::Reconstructed(BackupRecord::reconstructed(
                filename,
                file.size.unwrap_or(0),
                date,
            ))
        }
    }
}

/// Listing order: newest modification time first, unknown times last,
/// ties by file name.
pub fn newest_first(
    a: (Option<DateTime<Utc>>, &str),
    b: (Option<DateTime<Utc>>, &str),
) -> Ordering {
    b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::ResourceKind;
    use chrono::TimeZone;

    fn archive(name: &str, size: u64) -> Resource {
        Resource {
            name: name.to_string(),
            path: format!("disk:/B/{name}"),
            kind: ResourceKind::File,
            size: Some(size),
            created: None,
            modified: Some(Utc.with_ymd_and_hms(2025, 2, 1, 8, 30, 0).unwrap()),
        }
    }

    #[test]
    fn test_sidecar_backup_id_is_overwritten() {
        let mut stale = BackupRecord::reconstructed("ignored", 1, DateTime::<Utc>::UNIX_EPOCH);
        stale.backup_id = "d0a8e6f3".into();
        stale.name = "Automatic backup 1.0".into();

        let reconciled = reconcile("X.tar", &archive("X.tar", 1000), Some(stale));
        assert!(!reconciled.is_reconstructed());

        let record = reconciled.into_record();
        assert_eq!(record.backup_id, "X.tar");
        assert_eq!(record.name, "Automatic backup 1.0");
        assert_eq!(record.size, 1000);
    }

    #[test]
    fn test_missing_sidecar_reconstructs_from_attributes() {
        let reconciled = reconcile("old.tar.gz", &archive("old.tar.gz", 512), None);
        assert!(reconciled.is_reconstructed());

        let record = reconciled.record();
        assert_eq!(record.backup_id, "old.tar.gz");
        assert_eq!(record.name, "old.tar.gz");
        assert_eq!(record.size, 512);
        assert_eq!(record.date, "2025-02-01T08:30:00+00:00");
        assert!(record.extra_metadata.is_empty());
    }

    #[test]
    fn test_reconstruction_uses_created_without_modified() {
        let mut file = archive("a.tar", 1);
        file.modified = None;
        file.created = Some(Utc.with_ymd_and_hms(2024, 12, 31, 0, 0, 0).unwrap());

        let record = reconcile("a.tar", &file, None).into_record();
        assert_eq!(record.date, "2024-12-31T00:00:00+00:00");
    }

    #[test]
    fn test_newest_first() {
        let t1 = Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        let t2 = Some(Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap());

        let mut items = vec![(t1, "a.tar"), (None, "z.tar"), (t2, "b.tar"), (t1, "0.tar")];
        items.sort_by(|a, b| newest_first(*a, *b));

        let names: Vec<&str> = items.iter().map(|i| i.1).collect();
        assert_eq!(names, vec!["b.tar", "0.tar", "a.tar", "z.tar"]);
    }
}
