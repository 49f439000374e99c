use log::{debug, info, warn};

use super::{RemoteError, RemotePath, RemoteResult, RemoteTree};

/// Creates every missing component of the path, leaving it as the current working directory.
///
/// Denied operations are logged and the next component is still attempted, so the result only tells
/// whether the whole path has been reached. Connection errors are returned.
pub fn ensure_directory(tree: &mut dyn RemoteTree, path: &RemotePath) -> RemoteResult<bool> {
    debug!("Ensuring {} directory exists on {}...", path, tree.name());

    let prefixes = path.prefixes();
    if prefixes.is_empty() {
        return enter(tree, path);
    }

    let mut reached = false;

    for prefix in prefixes {
        reached = match tree.change_directory(&prefix) {
            Ok(()) => true,
            Err(RemoteError::Denied(_)) => match create(tree, &prefix) {
                Ok(()) => {
                    info!("Created {} directory on {}.", prefix, tree.name());
                    true
                },
                Err(RemoteError::Denied(err)) => {
                    warn!("Unable to create {} directory on {}: {}.", prefix, tree.name(), err);
                    false
                },
                Err(err) => return Err(err),
            },
            Err(err) => return Err(err),
        };
    }

    Ok(reached)
}

fn create(tree: &mut dyn RemoteTree, path: &RemotePath) -> RemoteResult<()> {
    tree.create_directory(path)?;
    tree.change_directory(path)
}

fn enter(tree: &mut dyn RemoteTree, path: &RemotePath) -> RemoteResult<bool> {
    match tree.change_directory(path) {
        Ok(()) => Ok(true),
        Err(RemoteError::Denied(err)) => {
            warn!("Unable to change directory to {} on {}: {}.", path, tree.name(), err);
            Ok(false)
        },
        Err(err) => Err(err),
    }
}
