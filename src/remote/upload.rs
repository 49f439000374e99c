use std::fmt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Instant;

use humansize::{BINARY, format_size};
use log::{debug, error, info, warn};

use crate::core::{EmptyResult, GenericResult};

use super::{RemoteError, RemotePath, RemoteTree, ensure_directory};

#[derive(Debug, Default, PartialEq)]
pub struct UploadReport {
    pub directories: usize,
    pub uploaded: usize,
    pub bytes: u64,
    pub failed: usize,
    pub skipped: usize,
}

impl UploadReport {
    pub fn is_complete(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }
}

impl fmt::Display for UploadReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} files ({}) uploaded, {} failed, {} skipped",
               self.uploaded, format_size(self.bytes, BINARY), self.failed, self.skipped)
    }
}

/// Replays the local tree onto the remote directory.
///
/// A failure to store a file is logged and counted, and the walk goes on. The pass fails only if the
/// remote directory itself can't be created, the local root can't be read or the session breaks.
/// Once the deadline is passed no new transfers are started: the remaining files are counted as
/// skipped.
pub fn upload(
    tree: &mut dyn RemoteTree, local_root: &Path, remote_root: &RemotePath, deadline: Option<Instant>,
) -> GenericResult<UploadReport> {
    info!("Uploading {:?} to {} on {}...", local_root, remote_root, tree.name());

    let mut uploader = Uploader {
        tree, local_root, remote_root, deadline,
        report: UploadReport::default(),
    };
    uploader.run()?;

    let report = uploader.report;
    info!("Upload to {} has finished: {}.", remote_root, report);

    Ok(report)
}

struct Uploader<'a> {
    tree: &'a mut dyn RemoteTree,
    local_root: &'a Path,
    remote_root: &'a RemotePath,
    deadline: Option<Instant>,
    report: UploadReport,
}

impl Uploader<'_> {
    fn run(&mut self) -> EmptyResult {
        if !ensure_directory(self.tree, self.remote_root)? {
            return Err!("Unable to create {} on {}", self.remote_root, self.tree.name());
        }

        let entries = read_directory(self.local_root).map_err(|e| format!(
            "Unable to read {:?}: {}", self.local_root, e))?;

        self.upload_entries(entries)
    }

    fn upload_directory(&mut self, path: &Path) -> EmptyResult {
        let remote_path = self.remote_path(path)?;

        if ensure_directory(self.tree, &remote_path)? {
            self.report.directories += 1;
        } else {
            self.report.failed += 1;
        }

        match read_directory(path) {
            Ok(entries) => self.upload_entries(entries),
            Err(err) => {
                error!("Unable to read {:?}: {}.", path, err);
                self.report.failed += 1;
                Ok(())
            },
        }
    }

    fn upload_entries(&mut self, entries: Vec<(PathBuf, fs::Metadata)>) -> EmptyResult {
        let (directories, files): (Vec<_>, Vec<_>) = entries.into_iter()
            .partition(|(_, metadata)| metadata.is_dir());

        for (path, metadata) in files {
            if metadata.is_file() {
                self.upload_file(&path)?;
            } else {
                warn!("Skipping {:?}: unsupported file type.", path);
            }
        }

        for (path, _) in directories {
            self.upload_directory(&path)?;
        }

        Ok(())
    }

    fn upload_file(&mut self, path: &Path) -> EmptyResult {
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            debug!("Skipping {:?}: upload deadline has been reached.", path);
            self.report.skipped += 1;
            return Ok(());
        }

        let remote_path = self.remote_path(path)?;

        let mut file = match File::open(path) {
            Ok(file) => file,
            Err(err) => {
                error!("Failed to upload {:?} to {}: {}.", path, remote_path, err);
                self.report.failed += 1;
                return Ok(());
            },
        };

        match self.tree.store_file(&remote_path, &mut file) {
            Ok(size) => {
                info!("Uploaded {:?} to {} ({}).", path, remote_path, format_size(size, BINARY));
                self.report.uploaded += 1;
                self.report.bytes += size;
            },
            Err(RemoteError::Denied(err)) => {
                error!("Failed to upload {:?} to {}: {}.", path, remote_path, err);
                self.report.failed += 1;
            },
            Err(err) => {
                error!("Upload of {:?} to {} has been interrupted, the remote file may be incomplete.",
                       path, remote_path);
                self.report.failed += 1;
                return Err(err.into());
            },
        }

        Ok(())
    }

    fn remote_path(&self, path: &Path) -> GenericResult<RemotePath> {
        let relative = path.strip_prefix(self.local_root).map_err(|_| format!(
            "{:?} is outside of {:?}", path, self.local_root))?;
        self.remote_root.join_relative(relative)
    }
}

fn read_directory(path: &Path) -> GenericResult<Vec<(PathBuf, fs::Metadata)>> {
    let mut entries = Vec::new();

    for entry in fs::read_dir(path)? {
        let path = entry?.path();
        let metadata = fs::metadata(&path).map_err(|e| format!(
            "Unable to get metadata of {:?}: {}", path, e))?;
        entries.push((path, metadata));
    }

    entries.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(entries)
}
