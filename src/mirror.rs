use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use filetime::FileTime;
use humansize::{BINARY, format_size};
use log::{info, warn};
use rayon::prelude::*;

use crate::core::{EmptyResult, GenericResult};

#[derive(Debug, Default, PartialEq)]
pub struct MirrorReport {
    pub directories: usize,
    pub files: usize,
    pub bytes: u64,
}

impl fmt::Display for MirrorReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} directories, {} files ({})",
               self.directories, self.files, format_size(self.bytes, BINARY))
    }
}

/// Copies the source tree into the destination, overwriting existing files.
///
/// Directories are created during a sequential walk, so each one exists before anything is put into
/// it, and then the files are copied in parallel. Any error aborts the mirror: the destination is
/// either a complete copy or the call fails.
pub fn mirror(source_root: &Path, dest_root: &Path) -> GenericResult<MirrorReport> {
    info!("Mirroring {:?} to {:?}...", source_root, dest_root);

    if dest_root.starts_with(source_root) {
        return Err!("Unable to mirror {:?} into itself ({:?})", source_root, dest_root);
    }

    fs::create_dir_all(dest_root).map_err(|e| format!(
        "Unable to create {:?}: {}", dest_root, e))?;

    let mut report = MirrorReport::default();
    let mut files = Vec::new();
    plan_directory(source_root, dest_root, &mut report, &mut files)?;

    let sizes = files.par_iter().map(|(source, dest)| {
        copy_file(source, dest).map_err(|e| format!(
            "Failed to copy {:?} to {:?}: {}", source, dest, e))
    }).collect::<Result<Vec<u64>, String>>()?;

    report.files = sizes.len();
    report.bytes = sizes.iter().sum();

    info!("Mirroring of {:?} to {:?} has finished: {}.", source_root, dest_root, report);
    Ok(report)
}

fn plan_directory(
    source: &Path, dest: &Path, report: &mut MirrorReport, files: &mut Vec<(PathBuf, PathBuf)>,
) -> EmptyResult {
    let mut entries = Vec::new();

    for entry in fs::read_dir(source).map_err(|e| format!("Unable to read {:?}: {}", source, e))? {
        let entry = entry.map_err(|e| format!("Unable to read {:?}: {}", source, e))?;
        entries.push(entry.file_name());
    }
    entries.sort();

    for name in entries {
        let source_path = source.join(&name);
        let dest_path = dest.join(&name);

        let metadata = fs::symlink_metadata(&source_path).map_err(|e| format!(
            "Unable to get metadata of {:?}: {}", source_path, e))?;
        let file_type = metadata.file_type();

        if file_type.is_dir() {
            create_directory(&dest_path)?;
            report.directories += 1;
            plan_directory(&source_path, &dest_path, report, files)?;
        } else if file_type.is_file() {
            files.push((source_path, dest_path));
        } else if file_type.is_symlink() {
            // Symlinked files are copied by value. Symlinked directories are skipped to not end up
            // in a loop.
            let target = fs::metadata(&source_path).map_err(|e| format!(
                "Unable to resolve {:?} symlink: {}", source_path, e))?;

            if target.is_file() {
                files.push((source_path, dest_path));
            } else {
                warn!("Skipping {:?}: it's a symlink to a directory.", source_path);
            }
        } else {
            warn!("Skipping {:?}: unsupported file type.", source_path);
        }
    }

    Ok(())
}

fn create_directory(path: &Path) -> EmptyResult {
    match fs::create_dir(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(err) => Err!("Unable to create {:?}: {}", path, err),
    }
}

fn copy_file(source: &Path, dest: &Path) -> GenericResult<u64> {
    // The previous copy may have inherited read-only permissions from its source
    if let Ok(metadata) = fs::symlink_metadata(dest) {
        let mut permissions = metadata.permissions();
        if metadata.is_file() && permissions.readonly() {
            permissions.set_mode(permissions.mode() | 0o200);
            fs::set_permissions(dest, permissions)?;
        }
    }

    let size = fs::copy(source, dest)?;

    let metadata = fs::metadata(source)?;
    filetime::set_file_times(
        dest,
        FileTime::from_last_access_time(&metadata),
        FileTime::from_last_modification_time(&metadata),
    )?;

    info!("Copied {:?} to {:?} ({}).", source, dest, format_size(size, BINARY));
    Ok(size)
}
