use std::fmt;
use std::path::{Component, Path};

use crate::core::GenericResult;

/// An absolute slash-separated path on the remote side.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RemotePath {
    path: String,
}

impl RemotePath {
    pub fn root() -> RemotePath {
        RemotePath {path: "/".to_owned()}
    }

    pub fn new(path: &str) -> GenericResult<RemotePath> {
        if !path.starts_with('/') {
            return Err!("Remote paths must be absolute: {:?}", path);
        }

        let mut normalized = RemotePath::root();

        for segment in path.split('/').filter(|segment| !segment.is_empty()) {
            if segment == "." || segment == ".." {
                return Err!("Invalid remote path: {:?}", path);
            }
            normalized = normalized.join(segment);
        }

        Ok(normalized)
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }

    pub fn is_root(&self) -> bool {
        self.path == "/"
    }

    /// Appends a single path segment.
    pub fn join(&self, name: &str) -> RemotePath {
        debug_assert!(!name.is_empty() && !name.contains('/'));

        let mut path = self.path.clone();
        if !self.is_root() {
            path.push('/');
        }
        path.push_str(name);

        RemotePath {path}
    }

    /// Maps a relative local path onto this directory, converting local separators to the remote
    /// ones.
    pub fn join_relative(&self, relative: &Path) -> GenericResult<RemotePath> {
        let mut path = self.clone();

        for component in relative.components() {
            match component {
                Component::Normal(name) => {
                    let name = name.to_str().ok_or_else(|| format!(
                        "{:?} can't be represented as a remote path", relative))?;
                    path = path.join(name);
                },
                Component::CurDir => {},
                _ => return Err!("{:?} is not a relative path", relative),
            }
        }

        Ok(path)
    }

    pub fn parent(&self) -> Option<RemotePath> {
        if self.is_root() {
            return None;
        }

        let index = self.path.rfind('/')?;
        Some(if index == 0 {
            RemotePath::root()
        } else {
            RemotePath {path: self.path[..index].to_owned()}
        })
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('/').filter(|segment| !segment.is_empty())
    }

    /// All ancestors of the path excluding the root, from the topmost one down to the path itself.
    pub fn prefixes(&self) -> Vec<RemotePath> {
        let mut current = RemotePath::root();
        self.segments().map(|segment| {
            current = current.join(segment);
            current.clone()
        }).collect()
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.path)
    }
}
