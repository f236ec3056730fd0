//! Cleaners and the process cleaner run.
//!
//! A [`PlatformCleaner`] describes one kind of cleanup: whether it applies to
//! this platform, which command line arguments it takes, and how to build a
//! [`Cleaner`] from them. The process cleaner restores a user's processes to
//! a saved baseline.

use crate::process_kill::{NixSignaller, Signaller, Terminator, DEFAULT_GRACE};
use crate::process_list::{current_user, ProcessLister, PsLister};
use crate::reconcile::reconcile;
use crate::snapshot::{BaselineFile, BaselineStore, DEFAULT_BASELINE_PATH};
use crate::types::{format_pids, CleanError, KillSet, Pid};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What a successful run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// No baseline existed; the current processes were saved as the baseline.
    BaselineCreated(PathBuf),
    /// The baseline was enforced. `killed` holds every pid that was targeted,
    /// which in a dry run is what would have been signalled.
    Cleaned { killed: KillSet, dry_run: bool },
}

/// A configured cleanup action.
pub trait Cleaner {
    /// Perform the cleanup. A dry run must leave every process alone.
    fn enforce(&self, dry_run: bool) -> Result<Outcome, CleanError>;
}

/// A kind of cleaner that can be offered on the command line.
pub trait PlatformCleaner {
    /// Sub-command name.
    fn name(&self) -> &'static str;

    fn about(&self) -> &'static str;

    /// Whether this cleaner can run on the current platform.
    fn check_platform(&self) -> bool;

    /// Add this cleaner's own arguments to its sub-command.
    fn register_arguments(&self, command: Command) -> Command;

    fn build(&self, matches: &ArgMatches) -> Result<Box<dyn Cleaner>, CleanError>;
}

/// Kills any of a user's processes started since the baseline was saved.
pub struct ProcessCleaner<L, S> {
    user: String,
    store: Box<dyn BaselineStore>,
    snapshot: bool,
    self_pid: Pid,
    lister: L,
    terminator: Terminator<S>,
}

impl<L: ProcessLister> ProcessCleaner<L, NixSignaller> {
    pub fn new(user: impl Into<String>, baseline: impl Into<PathBuf>, lister: L) -> Self {
        Self::with_terminator(user, baseline, lister, Terminator::default())
    }
}

impl<L: ProcessLister, S: Signaller> ProcessCleaner<L, S> {
    pub fn with_terminator(
        user: impl Into<String>,
        baseline: impl Into<PathBuf>,
        lister: L,
        terminator: Terminator<S>,
    ) -> Self {
        Self {
            user: user.into(),
            store: Box::new(BaselineFile::new(baseline)),
            snapshot: false,
            self_pid: nix::unistd::getpid().as_raw(),
            lister,
            terminator,
        }
    }

    /// Overwrite the baseline with the current processes before reconciling
    /// against the previous one.
    pub fn snapshot(mut self, snapshot: bool) -> Self {
        self.snapshot = snapshot;
        self
    }

    /// Keep the baseline somewhere other than the file given at construction.
    pub fn store(mut self, store: impl BaselineStore + 'static) -> Self {
        self.store = Box::new(store);
        self
    }

    /// Pid that is never killed. Defaults to this process.
    pub fn self_pid(mut self, pid: Pid) -> Self {
        self.self_pid = pid;
        self
    }

    pub fn terminator(&self) -> &Terminator<S> {
        &self.terminator
    }
}

impl<L: ProcessLister, S: Signaller> Cleaner for ProcessCleaner<L, S> {
    fn enforce(&self, dry_run: bool) -> Result<Outcome, CleanError> {
        let current = self.lister.list(&self.user)?;
        debug!("Observed {} processes for {}", current.len(), self.user);

        let baseline = match self.store.load()? {
            Some(baseline) if !baseline.is_empty() => baseline,
            _ => {
                // Without a baseline there is nothing to enforce, so a failed
                // write ends the run.
                let path = self.store.save(&current)?;
                info!("No saved process list found, created one at {}", path.display());
                return Ok(Outcome::BaselineCreated(path));
            }
        };

        if self.snapshot {
            match self.store.save(&current) {
                Ok(path) => info!("Saved a new process list snapshot at {}", path.display()),
                Err(e) => warn!("{}; reconciling against the previous baseline", e),
            }
        }

        let killed = reconcile(&current, &baseline, self.self_pid);
        if killed.is_empty() {
            info!("No unexpected processes for {}", self.user);
            return Ok(Outcome::Cleaned { killed, dry_run });
        }
        info!(
            "{} {} unexpected process(es): {}",
            if dry_run { "Would kill" } else { "Killing" },
            killed.len(),
            format_pids(&killed)
        );

        let failed = self.terminator.terminate_with_escalation(&killed, dry_run);
        if !failed.is_empty() {
            warn!("Failed to kill: {}", format_pids(&failed));
            return Err(CleanError::Survivors(failed));
        }
        Ok(Outcome::Cleaned { killed, dry_run })
    }
}

/// The process cleaner for Linux and macOS.
#[derive(Debug, Clone, Copy, Default)]
pub struct PosixProcessCleaner;

impl PosixProcessCleaner {
    pub const NAME: &'static str = "process_cleaner";

    #[cfg(target_os = "linux")]
    const DEFAULT_OBSERVER: &'static str = "procfs";
    #[cfg(not(target_os = "linux"))]
    const DEFAULT_OBSERVER: &'static str = "ps";

    fn lister(observer: &str) -> Box<dyn ProcessLister> {
        match observer {
            #[cfg(target_os = "linux")]
            "procfs" => Box::new(crate::process_list::ProcfsLister),
            _ => Box::new(PsLister::default()),
        }
    }
}

impl PlatformCleaner for PosixProcessCleaner {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn about(&self) -> &'static str {
        "Records a user's processes at some point in time, and/or, kills any \
         processes which have been started since its prior run."
    }

    fn check_platform(&self) -> bool {
        cfg!(any(target_os = "linux", target_os = "macos"))
    }

    fn register_arguments(&self, command: Command) -> Command {
        let observers: &[&str] = if cfg!(target_os = "linux") {
            &["procfs", "ps"]
        } else {
            &["ps"]
        };

        command
            .arg(
                Arg::new("user")
                    .short('U')
                    .long("user")
                    .env("CLEANSLATE_USER")
                    .help("Clean processes owned by this user [default: the invoking user]"),
            )
            .arg(
                Arg::new("filename")
                    .short('f')
                    .long("filename")
                    .env("CLEANSLATE_FILENAME")
                    .default_value(DEFAULT_BASELINE_PATH)
                    .value_parser(value_parser!(PathBuf))
                    .help("Location of saved process lists"),
            )
            .arg(
                Arg::new("snapshot")
                    .long("snapshot")
                    .action(ArgAction::SetTrue)
                    .help("Create a new process list snapshot"),
            )
            .arg(
                Arg::new("grace")
                    .long("grace")
                    .value_name("MILLIS")
                    .value_parser(value_parser!(u64))
                    .help(
                        "Time a signalled process gets to exit before it is checked again \
                         [default: 100]",
                    ),
            )
            .arg(
                Arg::new("observer")
                    .long("observer")
                    .default_value(Self::DEFAULT_OBSERVER)
                    .value_parser(observers.to_vec())
                    .help("How the process table is read"),
            )
    }

    fn build(&self, matches: &ArgMatches) -> Result<Box<dyn Cleaner>, CleanError> {
        let user = match matches.get_one::<String>("user") {
            Some(user) => user.clone(),
            None => current_user()?,
        };
        let baseline = matches
            .get_one::<PathBuf>("filename")
            .cloned()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BASELINE_PATH));
        let grace = matches
            .get_one::<u64>("grace")
            .map_or(DEFAULT_GRACE, |ms| Duration::from_millis(*ms));
        let observer = matches
            .get_one::<String>("observer")
            .map_or(Self::DEFAULT_OBSERVER, String::as_str);

        debug!(
            "Process cleaner for {} using {} observer, baseline {}",
            user,
            observer,
            baseline.display()
        );
        let cleaner = ProcessCleaner::with_terminator(
            user,
            baseline,
            Self::lister(observer),
            Terminator::new(NixSignaller, grace),
        )
        .snapshot(matches.get_flag("snapshot"));
        Ok(Box::new(cleaner))
    }
}
