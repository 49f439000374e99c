use log::{debug, error, info, warn};

use super::{RemoteError, RemotePath, RemoteResult, RemoteTree};

/// Removes the directory with all its contents.
///
/// The protocol has no recursive removal and listings don't report entry types, so every entry is
/// first deleted as a file and a denial is taken as a sign of a directory. Files go first, then
/// subdirectories, then the directory itself.
///
/// Denied operations are logged and the rest of the tree is still processed: `Ok(false)` means that
/// something has been left behind. Only connection errors are returned.
pub fn delete_tree(tree: &mut dyn RemoteTree, path: &RemotePath) -> RemoteResult<bool> {
    let parent = match path.parent() {
        Some(parent) => parent,
        None => {
            error!("Refusing to delete the root directory on {}.", tree.name());
            return Ok(false);
        },
    };

    debug!("Deleting {} on {}...", path, tree.name());

    if let Err(err) = tree.change_directory(path) {
        return handle_error(tree, err, format_args!("Unable to change directory to {}", path));
    }

    // Some servers refuse to list empty directories, so removal is attempted anyway
    let names = match tree.list_directory() {
        Ok(names) => names,
        Err(RemoteError::Denied(err)) => {
            warn!("Unable to list {} on {}: {}.", path, tree.name(), err);
            Vec::new()
        },
        Err(err) => return Err(err),
    };

    let mut ok = true;
    let mut directories = Vec::new();

    for name in names {
        let name = match entry_name(&name) {
            Some(name) => name,
            None => continue,
        };

        let entry_path = path.join(name);

        match tree.delete_file(&entry_path) {
            Ok(()) => debug!("Deleted {} file on {}.", entry_path, tree.name()),
            Err(RemoteError::Denied(_)) => directories.push(entry_path),
            Err(err) => return Err(err),
        }
    }

    for directory in directories {
        ok &= delete_tree(tree, &directory)?;
    }

    if let Err(err) = tree.change_directory(&parent) {
        ok &= handle_error(tree, err, format_args!("Unable to change directory to {}", parent))?;
    }

    match tree.remove_directory(path) {
        Ok(()) => info!("Deleted {} directory on {}.", path, tree.name()),
        Err(err) => ok &= handle_error(tree, err, format_args!("Unable to delete {}", path))?,
    }

    Ok(ok)
}

// Listings may return paths instead of names. Hidden entries are never touched.
fn entry_name(name: &str) -> Option<&str> {
    let name = name.rsplit('/').next()?;
    if name.is_empty() || name.starts_with('.') {
        return None;
    }
    Some(name)
}

fn handle_error(tree: &dyn RemoteTree, err: RemoteError, message: std::fmt::Arguments) -> RemoteResult<bool> {
    match err {
        RemoteError::Denied(err) => {
            error!("{} on {}: {}.", message, tree.name(), err);
            Ok(false)
        },
        err => Err(err),
    }
}
