mod delete;
mod directory;
pub mod ftp;
mod path;
mod upload;

#[cfg(test)] pub mod testing;

use std::error::Error;
use std::fmt;
use std::io::Read;

pub use self::delete::delete_tree;
pub use self::directory::ensure_directory;
pub use self::path::RemotePath;
pub use self::upload::upload;

pub type RemoteResult<T> = Result<T, RemoteError>;

/// A hierarchical file store reachable over a file-transfer session.
///
/// Listing reports names only: whether an entry is a file or a directory is learned by trying an
/// operation on it.
pub trait RemoteTree {
    fn name(&self) -> &str;

    fn change_directory(&mut self, path: &RemotePath) -> RemoteResult<()>;
    fn create_directory(&mut self, path: &RemotePath) -> RemoteResult<()>;

    /// Lists names of the entries in the current working directory.
    fn list_directory(&mut self) -> RemoteResult<Vec<String>>;

    fn store_file(&mut self, path: &RemotePath, data: &mut dyn Read) -> RemoteResult<u64>;
    fn delete_file(&mut self, path: &RemotePath) -> RemoteResult<()>;
    fn remove_directory(&mut self, path: &RemotePath) -> RemoteResult<()>;
}

#[derive(Debug)]
pub enum RemoteError {
    /// The server refused a single operation. The session stays usable.
    Denied(String),
    /// The session is broken and every following operation will fail too.
    Connection(String),
}

impl Error for RemoteError {
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RemoteError::Denied(message) => write!(f, "operation denied: {}", message),
            RemoteError::Connection(message) => write!(f, "connection error: {}", message),
        }
    }
}
