use clap::{Arg, ArgAction, ArgMatches, Command};
use const_format::formatcp;
use indoc::indoc;

use crate::core::GenericResult;

use super::Action;

const DEFAULT_CONFIG_PATH: &str = "~/.dsb.yaml";

pub struct Parser {
    matches: Option<ArgMatches>,
}

pub struct GlobalOptions {
    pub log_level: log::Level,
    pub config_path: String,
}

impl Parser {
    pub fn new() -> Parser {
        Parser {matches: None}
    }

    pub fn parse_global(&mut self) -> GenericResult<GlobalOptions> {
        let matches = new_command("dsb", "Dated Simple Backup")
            .version(env!("CARGO_PKG_VERSION"))

            .subcommand_required(true)
            .arg_required_else_help(true)
            .disable_help_subcommand(true)
            .dont_collapse_args_in_usage(true)
            .help_expected(true)

            .arg(Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .global(true)
                .help(formatcp!("Configuration file path [default: {}]", DEFAULT_CONFIG_PATH)))

            .arg(Arg::new("cron")
                .long("cron")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Show only warning and error messages (intended to be used from cron)"))

            .arg(Arg::new("verbose")
                .short('v').long("verbose")
                .action(ArgAction::Count)
                .conflicts_with("cron")
                .global(true)
                .help("Set verbosity level"))

            .subcommand(new_command(
                "backup", "Back up the source tree into today's bucket, upload it and delete expired buckets"))

            .subcommand(new_command(
                "prune", "Delete expired buckets locally and on the remote server"))

            .get_matches();

        let log_level = match matches.get_count("verbose") {
            0 => if matches.get_flag("cron") {
                log::Level::Warn
            } else {
                log::Level::Info
            },
            1 => log::Level::Debug,
            2 => log::Level::Trace,
            _ => return Err!("Invalid verbosity level"),
        };

        let config_path = matches.get_one::<String>("config").cloned().unwrap_or_else(||
            shellexpand::tilde(DEFAULT_CONFIG_PATH).to_string());

        self.matches.replace(matches);

        Ok(GlobalOptions {log_level, config_path})
    }

    pub fn parse(self) -> GenericResult<Action> {
        let matches = self.matches.ok_or("Command line arguments haven't been parsed yet")?;

        Ok(match matches.subcommand_name() {
            Some("backup") => Action::Backup,
            Some("prune") => Action::Prune,
            _ => unreachable!(),
        })
    }
}

fn new_command(name: &'static str, about: &'static str) -> Command {
    Command::new(name)
        // Default template contains `{bin} {version}` for some reason
        .help_template(indoc!("
            {before-help}{about}

            {usage-heading}
                {usage}

            {all-args}{after-help}\
        "))
        .about(about)
}
