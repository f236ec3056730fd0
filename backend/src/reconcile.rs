//! Baseline reconciliation.

use crate::types::{KillSet, Pid, ProcessSet};
use std::collections::HashMap;
use tracing::debug;

/// Select the processes in `current` that the `baseline` does not account for.
///
/// A process present in both with the same pid and command is expected. A
/// process whose command matches a baseline record that is no longer running
/// counts as that record restarted under a new pid; each such baseline record
/// excuses at most one restart, so the number of live processes per command
/// never grows past the baseline. `self_pid` is never selected.
///
/// Unmatched processes are visited in ascending pid order, so when restarts
/// outnumber their baseline records the highest pids are selected.
pub fn reconcile(current: &ProcessSet, baseline: &ProcessSet, self_pid: Pid) -> KillSet {
    let mut restartable: HashMap<&str, usize> = HashMap::new();
    for (_, command) in baseline.difference(current) {
        *restartable.entry(command).or_default() += 1;
    }

    let mut kill_set = KillSet::new();
    for (pid, command) in current.difference(baseline) {
        if let Some(remaining) = restartable.get_mut(command).filter(|n| **n > 0) {
            *remaining -= 1;
            debug!("pid:{} cmd:'{}' is a restart of a baseline process", pid, command);
        } else if pid != self_pid {
            debug!("Adding pid:{} cmd:'{}' to kill set.", pid, command);
            kill_set.insert(pid);
        }
    }
    kill_set
}
