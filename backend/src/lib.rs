//! Resets a user's processes to a previously recorded state.
//!
//! Records the processes a user owns at some point in time, and on later runs
//! kills any process started since, tolerating restarts of the recorded
//! commands. Uses `nix` for signals and user lookup, and `procfs` or `ps` to
//! read the process table.

mod cleaner;
mod process_kill;
mod process_list;
mod reconcile;
mod registry;
mod snapshot;
mod types;

pub use cleaner::{Cleaner, Outcome, PlatformCleaner, PosixProcessCleaner, ProcessCleaner};
pub use process_kill::{pid_exists, NixSignaller, Signaller, Terminator, DEFAULT_GRACE};
#[cfg(target_os = "linux")]
pub use process_list::ProcfsLister;
pub use process_list::{
    current_user, parse_listing, parse_ps_line, resolve_uid, ProcessLister, PsLister,
};
pub use reconcile::reconcile;
pub use registry::CleanerRegistry;
pub use snapshot::{
    load as load_baseline, save as save_baseline, BaselineFile, BaselineStore,
    DEFAULT_BASELINE_PATH,
};
pub use types::{
    format_pids, normalize_command, CleanError, FailSet, KillSet, Pid, ProcessRecord, ProcessSet,
};
