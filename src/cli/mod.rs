mod parser;

pub use parser::{Parser, GlobalOptions};

pub enum Action {
    Backup,
    Prune,
}
