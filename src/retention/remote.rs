use chrono::NaiveDate;
use log::{debug, info, warn};

use crate::bucket::DateBucket;
use crate::core::GenericResult;
use crate::remote::{RemotePath, RemoteTree, delete_tree};

use super::PruneReport;

/// Deletes remote buckets dated before the cutoff.
///
/// Inability to enter or list the root fails the whole pass. Failures inside a bucket are logged
/// by the deletion itself and the next bucket is processed regardless.
pub fn prune(tree: &mut dyn RemoteTree, root: &RemotePath, cutoff: NaiveDate) -> GenericResult<PruneReport> {
    info!("Deleting backups older than {} from {} on {}...", cutoff, root, tree.name());

    tree.change_directory(root).map_err(|e| format!(
        "Unable to access {} on {}: {}", root, tree.name(), e))?;

    let mut names = tree.list_directory().map_err(|e| format!(
        "Unable to list {} on {}: {}", root, tree.name(), e))?;
    names.sort();

    let mut report = PruneReport::default();

    for name in names {
        let name = name.rsplit('/').next().unwrap_or_default();
        if name.is_empty() || name.starts_with('.') {
            continue;
        }

        let bucket = match DateBucket::parse(name) {
            Some(bucket) => bucket,
            None => {
                warn!("Skipping {:?} in {} on {}: it's not a dated backup.", name, root, tree.name());
                report.skipped += 1;
                continue;
            },
        };

        if !bucket.is_expired(cutoff) {
            debug!("Keeping {} backup on {}.", bucket, tree.name());
            report.kept += 1;
            continue;
        }

        let path = root.join(&bucket.name);
        info!("Deleting {} backup from {}...", path, tree.name());

        if delete_tree(tree, &path)? {
            report.deleted += 1;
        } else {
            report.failed += 1;
        }
    }

    info!("Old backups cleanup in {} on {} has finished: {}.", root, tree.name(), report);
    Ok(report)
}
