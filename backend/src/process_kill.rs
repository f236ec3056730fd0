//! Process killing functionality.

use crate::types::{CleanError, FailSet, KillSet, Pid};
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use std::{thread, time};
use tracing::{debug, warn};

/// How long a signalled process gets to exit before it is checked again.
pub const DEFAULT_GRACE: time::Duration = time::Duration::from_millis(100);

/// Delivers signals to pids. `None` is the existence check (signal 0).
pub trait Signaller {
    fn send(&self, pid: Pid, signal: Option<Signal>) -> nix::Result<()>;
}

/// Sends real signals with `kill(2)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NixSignaller;

impl Signaller for NixSignaller {
    fn send(&self, pid: Pid, signal: Option<Signal>) -> nix::Result<()> {
        signal::kill(nix::unistd::Pid::from_raw(pid), signal)
    }
}

/// Check whether `pid` exists by sending it signal 0.
///
/// Only ESRCH means the process is gone. Any other failure, including
/// EPERM, is returned as an error rather than guessed at.
pub fn pid_exists<S: Signaller + ?Sized>(signaller: &S, pid: Pid) -> Result<bool, CleanError> {
    match signaller.send(pid, None) {
        Ok(()) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        Err(e) => Err(CleanError::Liveness(pid, e)),
    }
}

/// Sends signals to a kill set and reports what survived.
#[derive(Debug, Clone)]
pub struct Terminator<S> {
    signaller: S,
    grace: time::Duration,
}

impl Default for Terminator<NixSignaller> {
    fn default() -> Self {
        Self::new(NixSignaller, DEFAULT_GRACE)
    }
}

impl<S: Signaller> Terminator<S> {
    pub fn new(signaller: S, grace: time::Duration) -> Self {
        Self { signaller, grace }
    }

    pub fn signaller(&self) -> &S {
        &self.signaller
    }

    /// Send `signal` to every pid in `kill_set`, wait out the grace period
    /// and check it again. Returns the pids that could not be signalled or
    /// are still alive. A dry run sends nothing and reports no failures.
    pub fn terminate(&self, kill_set: &KillSet, signal: Signal, dry_run: bool) -> FailSet {
        let mut fail_set = FailSet::new();
        for &pid in kill_set {
            debug!("Killing process {} with SIGNAL {}", pid, signal as i32);
            if dry_run {
                continue;
            }
            if let Err(reason) = self.kill_one(pid, signal) {
                debug!("(failed to kill {} via sig {}) {}", pid, signal as i32, reason);
                fail_set.insert(pid);
            }
        }
        fail_set
    }

    fn kill_one(&self, pid: Pid, signal: Signal) -> Result<(), String> {
        match self.signaller.send(pid, Some(signal)) {
            Ok(()) => {}
            // A pid that vanished before delivery still counts as a failure;
            // it was targeted and its exit was not observed here.
            Err(Errno::ESRCH) => {
                return Err("exited before the signal was delivered".to_string())
            }
            Err(e) => return Err(e.to_string()),
        }

        // Give the process a moment to die before checking.
        thread::sleep(self.grace);

        match pid_exists(&self.signaller, pid) {
            Ok(false) => Ok(()),
            Ok(true) => Err("still running".to_string()),
            Err(e) => Err(e.to_string()),
        }
    }

    /// SIGTERM the kill set, then SIGKILL whatever survived that.
    ///
    /// Returns the pids that outlived both passes. Only pids from `kill_set`
    /// are ever reported.
    pub fn terminate_with_escalation(&self, kill_set: &KillSet, dry_run: bool) -> FailSet {
        let mut fail_set = self.terminate(kill_set, Signal::SIGTERM, dry_run);
        if !fail_set.is_empty() {
            warn!(
                "{} process(es) survived SIGTERM, escalating to SIGKILL",
                fail_set.len()
            );
            fail_set = self.terminate(&fail_set, Signal::SIGKILL, dry_run);
        }
        fail_set.retain(|pid| kill_set.contains(pid));
        fail_set
    }
}
