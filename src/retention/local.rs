use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use log::{debug, error, info, warn};

use crate::bucket::DateBucket;
use crate::core::GenericResult;

use super::PruneReport;

/// Deletes local buckets dated before the cutoff. Everything which is not a dated bucket stays
/// untouched. A failed deletion is logged and the remaining buckets are still processed.
pub fn prune(backup_root: &Path, cutoff: NaiveDate) -> GenericResult<PruneReport> {
    info!("Deleting backups older than {} from {:?}...", cutoff, backup_root);

    let mut entries = Vec::new();
    for entry in fs::read_dir(backup_root).map_err(|e| format!(
        "Unable to read {:?}: {}", backup_root, e))? {
        let entry = entry.map_err(|e| format!("Unable to read {:?}: {}", backup_root, e))?;
        entries.push(entry);
    }
    entries.sort_by_key(|entry| entry.file_name());

    let mut report = PruneReport::default();

    for entry in entries {
        let path = entry.path();

        // Symlinks are never followed here
        match entry.file_type() {
            Ok(file_type) if file_type.is_dir() => {},
            Ok(_) => continue,
            Err(err) => {
                error!("Unable to get file type of {:?}: {}.", path, err);
                report.failed += 1;
                continue;
            },
        }

        let bucket = match entry.file_name().to_str().and_then(DateBucket::parse) {
            Some(bucket) => bucket,
            None => {
                warn!("Skipping {:?}: it's not a dated backup.", path);
                report.skipped += 1;
                continue;
            },
        };

        if !bucket.is_expired(cutoff) {
            debug!("Keeping {:?}.", path);
            report.kept += 1;
            continue;
        }

        match fs::remove_dir_all(&path) {
            Ok(()) => {
                info!("Deleted {:?} backup.", path);
                report.deleted += 1;
            },
            Err(err) => {
                error!("Failed to delete {:?} backup: {}.", path, err);
                report.failed += 1;
            },
        }
    }

    info!("Old backups cleanup in {:?} has finished: {}.", backup_root, report);
    Ok(report)
}
