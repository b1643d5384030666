//! # Command Line Interface
//!
//! The subcommands are in the `commands` module.

mod cli;

use log::error;
use a2dimg::commands;
use a2dimg::commands::CommandError;

fn main() -> Result<(),Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let matches = cli::build_cli().get_matches();

    let result = match matches.subcommand() {
        Some(("mkdsk",cmd)) => commands::mkdsk::mkdsk(cmd),
        Some(("stat",cmd)) => commands::stat::stat(cmd),
        Some(("get",cmd)) => commands::get::get(cmd),
        Some(("put",cmd)) => commands::put::put(cmd),
        Some(("partitions",cmd)) => commands::partitions::partitions(cmd),
        _ => {
            error!("No subcommand was found, try `a2dimg --help`");
            Err(Box::new(CommandError::InvalidCommand) as a2dimg::DYNERR)
        }
    };
    if let Err(e) = &result {
        error!("{}",e);
    }
    result
}
