mod local;
mod remote;

use std::fmt;

pub use self::local::prune as prune_local;
pub use self::remote::prune as prune_remote;

#[derive(Debug, Default, PartialEq)]
pub struct PruneReport {
    pub kept: usize,
    pub deleted: usize,
    pub failed: usize,
    /// Entries which aren't dated buckets.
    pub skipped: usize,
}

impl fmt::Display for PruneReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} buckets kept, {} deleted, {} failed to delete, {} unrelated entries skipped",
               self.kept, self.deleted, self.failed, self.skipped)
    }
}
