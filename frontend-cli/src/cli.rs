//! Command line definition. Cleaners contribute their own sub-commands.

use backend::CleanerRegistry;
use clap::{Arg, ArgAction, ArgMatches, Command};
use tracing::Level;

pub fn command(registry: &CleanerRegistry) -> Command {
    let command = Command::new("cleanslate")
        .version(env!("CARGO_PKG_VERSION"))
        .about(
            "Records a user's processes at some point in time, and/or, kills any \
             processes which have been started since its prior run.",
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .conflicts_with("verbose")
                .global(true)
                .help("Only log warnings and errors"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Log every targeted process and signal"),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .visible_alias("dryrun")
                .action(ArgAction::SetTrue)
                .global(true)
                .help(
                    "Work out what would be killed without sending any signal; \
                     the baseline file is still written",
                ),
        )
        .arg(
            Arg::new("list-cleaners")
                .long("list-cleaners")
                .action(ArgAction::SetTrue)
                .exclusive(true)
                .help("Print the cleaners available on this platform"),
        );
    registry.augment(command)
}

pub fn log_level(matches: &ArgMatches) -> Level {
    if matches.get_flag("quiet") {
        Level::WARN
    } else if matches.get_flag("verbose") {
        Level::DEBUG
    } else {
        Level::INFO
    }
}
