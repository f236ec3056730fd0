use backend::{format_pids, CleanError, CleanerRegistry, Outcome};
use std::process::ExitCode;
use tracing::{error, info};

mod cli;
mod logging;

/// A cleaner returned an error.
const EXIT_FAILURE: u8 = 1;
/// Some processes outlived both SIGTERM and SIGKILL.
const EXIT_SURVIVORS: u8 = 3;

fn main() -> ExitCode {
    // The registry is complete before any argument is parsed.
    let registry = CleanerRegistry::with_builtin();
    let matches = cli::command(&registry).get_matches();
    logging::init(cli::log_level(&matches));

    if matches.get_flag("list-cleaners") {
        for name in registry.names() {
            println!("{}", name);
        }
        return ExitCode::SUCCESS;
    }

    if registry.is_empty() {
        error!("No cleaner supports this platform");
        return ExitCode::from(EXIT_FAILURE);
    }

    let dry_run = matches.get_flag("dry-run");
    if dry_run {
        info!("Running in dry-run mode.");
    }

    let Some((name, sub_matches)) = matches.subcommand() else {
        error!("No cleaner selected; use --list-cleaners to see what is available");
        return ExitCode::from(EXIT_FAILURE);
    };

    match registry
        .build(name, sub_matches)
        .and_then(|cleaner| cleaner.enforce(dry_run))
    {
        Ok(outcome) => {
            report(name, &outcome);
            ExitCode::SUCCESS
        }
        Err(err @ CleanError::Survivors(_)) => {
            error!("{}", err);
            ExitCode::from(EXIT_SURVIVORS)
        }
        Err(err) => {
            error!("{}", err);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn report(name: &str, outcome: &Outcome) {
    match outcome {
        Outcome::BaselineCreated(path) => {
            println!("({}): recorded baseline at {}", name, path.display());
        }
        Outcome::Cleaned { killed, .. } if killed.is_empty() => {}
        Outcome::Cleaned {
            killed,
            dry_run: true,
        } => println!("({}): would kill processes {}", name, format_pids(killed)),
        Outcome::Cleaned { killed, .. } => {
            println!("({}): killed processes {}", name, format_pids(killed))
        }
    }
}
