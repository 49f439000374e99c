#[macro_use] mod core;

mod backuping;
mod bucket;
mod cli;
mod config;
mod metrics;
mod mirror;
mod remote;
mod retention;
mod util;

#[cfg(test)] mod tests;

use std::process;

use log::error;

use crate::cli::{Action, GlobalOptions, Parser};
use crate::config::Config;
use crate::core::GenericResult;

fn main() {
    let mut parser = Parser::new();

    let global = parser.parse_global().unwrap_or_else(|e| {
        eprintln!("{}.", e);
        process::exit(1);
    });

    if let Err(e) = easy_logging::init(env!("CARGO_CRATE_NAME"), global.log_level) {
        eprintln!("Failed to initialize the logging: {}.", e);
        process::exit(1);
    }

    let exit_code = match run(parser, global) {
        Ok(ok) => if ok {
            0
        } else {
            1
        },
        Err(err) => {
            error!("{}.", err);
            1
        },
    };

    process::exit(exit_code);
}

fn run(parser: Parser, global: GlobalOptions) -> GenericResult<bool> {
    let action = parser.parse()?;

    let config_path = &global.config_path;
    let config = Config::load(config_path).map_err(|e| format!(
        "Error while reading {:?} configuration file: {}", config_path, e))?;

    match action {
        Action::Backup => backuping::backup(&config),
        Action::Prune => backuping::prune(&config),
    }
}
