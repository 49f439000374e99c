use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::io::Read;
use std::rc::Rc;

use super::{RemoteError, RemotePath, RemoteResult, RemoteTree};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ChangeDirectory,
    CreateDirectory,
    List,
    Store,
    DeleteFile,
    RemoveDirectory,
}

#[derive(Default)]
struct State {
    directories: BTreeSet<String>,
    files: BTreeMap<String, Vec<u8>>,
    denied: HashSet<(Operation, String)>,
    disconnected: bool,
    journal: Vec<(Operation, String)>,
}

/// An FTP-like tree kept in memory. Clones share the same state, so a test can hand a clone to the
/// code under test and inspect the result afterwards.
#[derive(Clone)]
pub struct MemoryTree {
    state: Rc<RefCell<State>>,
    current: RemotePath,
}

impl MemoryTree {
    pub fn new() -> MemoryTree {
        let mut state = State::default();
        state.directories.insert(s!("/"));

        MemoryTree {
            state: Rc::new(RefCell::new(state)),
            current: RemotePath::root(),
        }
    }

    pub fn with_directory(self, path: &str) -> MemoryTree {
        {
            let mut state = self.state.borrow_mut();
            for prefix in RemotePath::new(path).unwrap().prefixes() {
                state.directories.insert(prefix.as_str().to_owned());
            }
        }
        self
    }

    pub fn with_file(self, path: &str, data: &[u8]) -> MemoryTree {
        let path = RemotePath::new(path).unwrap();
        let tree = self.with_directory(path.parent().unwrap().as_str());
        tree.state.borrow_mut().files.insert(path.as_str().to_owned(), data.to_vec());
        tree
    }

    pub fn deny(&self, operation: Operation, path: &str) {
        self.state.borrow_mut().denied.insert((operation, path.to_owned()));
    }

    pub fn disconnect(&self) {
        self.state.borrow_mut().disconnected = true;
    }

    pub fn is_directory(&self, path: &str) -> bool {
        self.state.borrow().directories.contains(path)
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state.borrow().files.get(path).cloned()
    }

    pub fn paths(&self) -> BTreeSet<String> {
        let state = self.state.borrow();
        state.directories.iter().chain(state.files.keys()).cloned().collect()
    }

    /// Successfully performed operations in their order.
    pub fn journal(&self) -> Vec<(Operation, String)> {
        self.state.borrow().journal.clone()
    }

    pub fn journal_of(&self, operation: Operation) -> Vec<String> {
        self.journal().into_iter()
            .filter(|(other, _)| *other == operation)
            .map(|(_, path)| path)
            .collect()
    }

    fn check(&self, operation: Operation, path: &RemotePath) -> RemoteResult<()> {
        let state = self.state.borrow();

        if state.disconnected {
            return Err(RemoteError::Connection(s!("Connection reset by peer")));
        }

        if state.denied.contains(&(operation, path.as_str().to_owned())) {
            return Err(RemoteError::Denied(format!("{}: Permission denied", path)));
        }

        Ok(())
    }

    fn record(&self, operation: Operation, path: &RemotePath) {
        self.state.borrow_mut().journal.push((operation, path.as_str().to_owned()));
    }

    fn has_children(state: &State, path: &RemotePath) -> bool {
        let prefix = if path.is_root() {
            s!("/")
        } else {
            format!("{}/", path)
        };

        state.directories.iter().chain(state.files.keys())
            .any(|other| other != path.as_str() && other.starts_with(&prefix))
    }
}

impl RemoteTree for MemoryTree {
    fn name(&self) -> &str {
        "memory"
    }

    fn change_directory(&mut self, path: &RemotePath) -> RemoteResult<()> {
        self.check(Operation::ChangeDirectory, path)?;

        if !self.state.borrow().directories.contains(path.as_str()) {
            return Err(RemoteError::Denied(format!("{}: No such file or directory", path)));
        }

        self.current = path.clone();
        self.record(Operation::ChangeDirectory, path);
        Ok(())
    }

    fn create_directory(&mut self, path: &RemotePath) -> RemoteResult<()> {
        self.check(Operation::CreateDirectory, path)?;

        {
            let mut state = self.state.borrow_mut();
            let parent = path.parent().ok_or_else(|| RemoteError::Denied(s!("/: File exists")))?;

            if state.directories.contains(path.as_str()) || state.files.contains_key(path.as_str()) {
                return Err(RemoteError::Denied(format!("{}: File exists", path)));
            } else if !state.directories.contains(parent.as_str()) {
                return Err(RemoteError::Denied(format!("{}: No such file or directory", path)));
            }

            state.directories.insert(path.as_str().to_owned());
        }

        self.record(Operation::CreateDirectory, path);
        Ok(())
    }

    fn list_directory(&mut self) -> RemoteResult<Vec<String>> {
        let current = self.current.clone();
        self.check(Operation::List, &current)?;

        let names = {
            let state = self.state.borrow();
            state.directories.iter().chain(state.files.keys())
                .filter_map(|path| RemotePath::new(path).ok())
                .filter(|path| path.parent().as_ref() == Some(&current))
                .filter_map(|path| path.segments().last().map(ToOwned::to_owned))
                .collect()
        };

        self.record(Operation::List, &current);
        Ok(names)
    }

    fn store_file(&mut self, path: &RemotePath, data: &mut dyn Read) -> RemoteResult<u64> {
        self.check(Operation::Store, path)?;

        let mut contents = Vec::new();
        data.read_to_end(&mut contents).map_err(|e| RemoteError::Connection(e.to_string()))?;

        {
            let mut state = self.state.borrow_mut();
            let parent = path.parent().ok_or_else(|| RemoteError::Denied(s!("/: Is a directory")))?;

            if state.directories.contains(path.as_str()) {
                return Err(RemoteError::Denied(format!("{}: Is a directory", path)));
            } else if !state.directories.contains(parent.as_str()) {
                return Err(RemoteError::Denied(format!("{}: No such file or directory", path)));
            }

            state.files.insert(path.as_str().to_owned(), contents.clone());
        }

        self.record(Operation::Store, path);
        Ok(contents.len() as u64)
    }

    fn delete_file(&mut self, path: &RemotePath) -> RemoteResult<()> {
        self.check(Operation::DeleteFile, path)?;

        if self.state.borrow_mut().files.remove(path.as_str()).is_none() {
            return Err(RemoteError::Denied(format!("{}: Not a regular file", path)));
        }

        self.record(Operation::DeleteFile, path);
        Ok(())
    }

    fn remove_directory(&mut self, path: &RemotePath) -> RemoteResult<()> {
        self.check(Operation::RemoveDirectory, path)?;

        {
            let mut state = self.state.borrow_mut();

            if !state.directories.contains(path.as_str()) {
                return Err(RemoteError::Denied(format!("{}: No such file or directory", path)));
            } else if MemoryTree::has_children(&state, path) {
                return Err(RemoteError::Denied(format!("{}: Directory not empty", path)));
            }

            state.directories.remove(path.as_str());
        }

        self.record(Operation::RemoveDirectory, path);
        Ok(())
    }
}
