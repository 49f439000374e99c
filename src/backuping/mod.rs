use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{Local, NaiveDate};
use easy_logging::GlobalContext;
use log::{error, info};

use crate::bucket::{self, DateBucket};
use crate::config::{Config, UploadConfig};
use crate::core::GenericResult;
use crate::metrics;
use crate::mirror;
use crate::remote::{self, RemotePath, RemoteTree};
use crate::remote::ftp::Ftp;
use crate::retention::{self, PruneReport};
use crate::util::sys::acquire_lock;

pub type Connector = dyn Fn(&UploadConfig) -> GenericResult<Box<dyn RemoteTree>>;

pub fn backup(config: &Config) -> GenericResult<bool> {
    let ok = Runner::new(config, Local::now().date_naive(), &connect).backup()?;
    Ok(finish(config, ok))
}

pub fn prune(config: &Config) -> GenericResult<bool> {
    let ok = Runner::new(config, Local::now().date_naive(), &connect).prune()?;
    Ok(finish(config, ok))
}

fn connect(config: &UploadConfig) -> GenericResult<Box<dyn RemoteTree>> {
    Ok(Box::new(Ftp::connect(config)?))
}

fn finish(config: &Config, mut ok: bool) -> bool {
    if let Some(path) = config.prometheus_metrics.as_ref() {
        metrics::LAST_RUN_SUCCESS.set(ok.into());
        metrics::LAST_RUN_TIME.set(Local::now().timestamp());

        if let Err(err) = metrics::save(path) {
            error!("Failed to save Prometheus metrics to {:?}: {}.", path, err);
            ok = false;
        }
    }

    ok
}

/// Runs the passes in order. Failure of a pass never stops the following ones, but old backups are
/// deleted only when a fresh one has been successfully created at the same location.
pub struct Runner<'a> {
    config: &'a Config,
    today: NaiveDate,
    connect: &'a Connector,
}

impl<'a> Runner<'a> {
    pub fn new(config: &'a Config, today: NaiveDate, connect: &'a Connector) -> Runner<'a> {
        Runner {config, today, connect}
    }

    pub fn backup(&self) -> GenericResult<bool> {
        let backup_root = Path::new(&self.config.backup_root);
        fs::create_dir_all(backup_root).map_err(|e| format!(
            "Unable to create {:?}: {}", backup_root, e))?;
        let _lock = acquire_lock(backup_root)?;

        let bucket = DateBucket::new(self.today);
        let mut ok = true;

        let mirrored = self.mirror(&bucket);
        ok &= mirrored;

        let uploaded = match self.config.upload.as_ref() {
            Some(upload_config) if mirrored => match self.upload(upload_config, &bucket) {
                Some(complete) => {
                    ok &= complete;
                    true
                },
                None => {
                    ok = false;
                    false
                },
            },
            Some(upload_config) => {
                error!("Skipping upload of {} backup to {} because of the errors above.",
                       bucket, upload_config.host);
                false
            },
            None => false,
        };

        if mirrored {
            ok &= self.prune_local();
        } else {
            error!("Do not delete old local backups due to errors above.");
        }

        if let Some(upload_config) = self.config.upload.as_ref() {
            if uploaded {
                ok &= self.prune_remote(upload_config);
            } else {
                error!("Do not delete old backups on {} due to errors above.", upload_config.host);
            }
        }

        Ok(ok)
    }

    pub fn prune(&self) -> GenericResult<bool> {
        let backup_root = Path::new(&self.config.backup_root);
        let mut ok = true;

        // There is nothing to lock without the backup root, but the remote cleanup is still possible
        let _lock = if backup_root.is_dir() {
            let lock = acquire_lock(backup_root)?;
            ok &= self.prune_local();
            Some(lock)
        } else {
            error!("Unable to delete old local backups: {:?} doesn't exist.", backup_root);
            ok = false;
            None
        };

        if let Some(upload_config) = self.config.upload.as_ref() {
            ok &= self.prune_remote(upload_config);
        }

        Ok(ok)
    }

    fn bucket_path(&self, bucket: &DateBucket) -> PathBuf {
        Path::new(&self.config.backup_root).join(&bucket.name)
    }

    fn cutoff(&self) -> NaiveDate {
        bucket::cutoff(self.today, self.config.retention_days)
    }

    fn mirror(&self, bucket: &DateBucket) -> bool {
        let _context = GlobalContext::new("mirror");

        match mirror::mirror(Path::new(&self.config.source), &self.bucket_path(bucket)) {
            Ok(report) => {
                metrics::MIRRORED_FILES.set(report.files as i64);
                true
            },
            Err(err) => {
                error!("Backup failed: {}.", err);
                false
            },
        }
    }

    // Returns whether all files have been uploaded or None if the pass has failed.
    fn upload(&self, config: &UploadConfig, bucket: &DateBucket) -> Option<bool> {
        let _context = GlobalContext::new("upload");
        let deadline = config.timeout.map(|timeout| Instant::now() + timeout);

        let result = RemotePath::new(&config.path).and_then(|root| {
            let mut tree = (self.connect)(config)?;
            remote::upload(tree.as_mut(), &self.bucket_path(bucket), &root.join(&bucket.name), deadline)
        });

        match result {
            Ok(report) => {
                metrics::UPLOADED_FILES.set(report.uploaded as i64);
                metrics::UPLOAD_FAILURES.set((report.failed + report.skipped) as i64);

                if !report.is_complete() {
                    error!("Upload to {} has completed with errors: {}.", config.host, report);
                }

                Some(report.is_complete())
            },
            Err(err) => {
                error!("Upload to {} failed: {}.", config.host, err);
                None
            },
        }
    }

    fn prune_local(&self) -> bool {
        let _context = GlobalContext::new("local prune");
        let result = retention::prune_local(Path::new(&self.config.backup_root), self.cutoff());
        self.handle_prune_result("local", result)
    }

    fn prune_remote(&self, config: &UploadConfig) -> bool {
        let _context = GlobalContext::new("remote prune");

        let result = RemotePath::new(&config.path).and_then(|root| {
            let mut tree = (self.connect)(config)?;
            retention::prune_remote(tree.as_mut(), &root, self.cutoff())
        });

        self.handle_prune_result("remote", result)
    }

    fn handle_prune_result(&self, location: &str, result: GenericResult<PruneReport>) -> bool {
        match result {
            Ok(report) => {
                metrics::PRUNED_BUCKETS.with_label_values(&[location]).set(report.deleted as i64);

                if report.failed != 0 {
                    error!("Failed to delete {} of expired backups.", report.failed);
                    return false;
                }

                info!("Old backups cleanup has completed.");
                true
            },
            Err(err) => {
                error!("Old backups cleanup failed: {}.", err);
                false
            },
        }
    }
}
