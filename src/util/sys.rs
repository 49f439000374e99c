use std::fs::File;
use std::os::unix::io::AsRawFd;
use std::path::Path;

use nix::errno::Errno;
use nix::fcntl::{self, FlockArg};

use crate::core::GenericResult;

/// Locks the file or directory until the returned handle is dropped.
#[allow(deprecated)]
pub fn acquire_lock<P: AsRef<Path>>(path: P) -> GenericResult<File> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| format!(
        "Unable to open {:?}: {}", path, e))?;

    fcntl::flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock).map_err(|err| {
        if err == Errno::EAGAIN {
            format!("Unable to acquire an exclusive lock on {:?}: it's already locked by another process", path)
        } else {
            format!("Unable to flock() {:?}: {}", path, err)
        }
    })?;

    Ok(file)
}
