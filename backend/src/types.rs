//! Data types and error definitions for process reconciliation.

use std::collections::btree_map::{self, BTreeMap};
use std::collections::BTreeSet;
use std::path::PathBuf;
use thiserror::Error;

/// Platform process identifier, as used by `nix::unistd::Pid`.
pub type Pid = i32;

/// Pids selected for termination by a single run.
pub type KillSet = BTreeSet<Pid>;

/// Pids that are still alive after a termination pass.
pub type FailSet = BTreeSet<Pid>;

/// A single observed process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessRecord {
    pub pid: Pid,
    pub command: String,
}

impl ProcessRecord {
    pub fn new(pid: Pid, command: impl Into<String>) -> Self {
        Self {
            pid,
            command: command.into(),
        }
    }
}

/// Render a command line the way it is stored in a baseline.
///
/// Control characters (newlines, tabs) become `?`, as `ps` prints them, and
/// surrounding whitespace is dropped. An empty result becomes `?`.
pub fn normalize_command(command: &str) -> String {
    let rendered: String = command
        .chars()
        .map(|c| if c.is_control() { '?' } else { c })
        .collect();
    let trimmed = rendered.trim();
    if trimmed.is_empty() {
        "?".to_string()
    } else {
        trimmed.to_string()
    }
}

/// A set of process records, unique by pid.
///
/// Keyed by pid so two records can never share one. Two sets are equal when
/// they hold the same `(pid, command)` pairs. Commands are stored through
/// [`normalize_command`], so every set fits the one-line-per-record baseline
/// format unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessSet {
    records: BTreeMap<Pid, String>,
}

impl ProcessSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record. Returns the record already holding this pid, leaving
    /// the set untouched, if there is one.
    pub fn insert(&mut self, record: ProcessRecord) -> Result<(), ProcessRecord> {
        match self.records.entry(record.pid) {
            btree_map::Entry::Occupied(existing) => {
                Err(ProcessRecord::new(*existing.key(), existing.get().clone()))
            }
            btree_map::Entry::Vacant(slot) => {
                slot.insert(normalize_command(&record.command));
                Ok(())
            }
        }
    }

    pub fn command(&self, pid: Pid) -> Option<&str> {
        self.records.get(&pid).map(String::as_str)
    }

    /// True when the exact `(pid, command)` pair is present. `command` is
    /// compared as stored, i.e. after normalization.
    pub fn contains(&self, pid: Pid, command: &str) -> bool {
        self.command(pid) == Some(command)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in ascending pid order.
    pub fn iter(&self) -> impl Iterator<Item = (Pid, &str)> + '_ {
        self.records.iter().map(|(pid, cmd)| (*pid, cmd.as_str()))
    }

    /// Records of `self` whose `(pid, command)` pair does not appear in `other`.
    pub fn difference<'a>(
        &'a self,
        other: &'a ProcessSet,
    ) -> impl Iterator<Item = (Pid, &'a str)> + 'a {
        self.iter().filter(move |(pid, cmd)| !other.contains(*pid, cmd))
    }

    pub fn pids(&self) -> BTreeSet<Pid> {
        self.records.keys().copied().collect()
    }
}

impl FromIterator<ProcessRecord> for ProcessSet {
    /// Later records win on a pid collision. Use [`ProcessSet::insert`] where
    /// a collision has to be reported.
    fn from_iter<I: IntoIterator<Item = ProcessRecord>>(iter: I) -> Self {
        Self {
            records: iter
                .into_iter()
                .map(|r| (r.pid, normalize_command(&r.command)))
                .collect(),
        }
    }
}

/// Errors that can occur while observing, reconciling or terminating processes.
#[derive(Error, Debug)]
pub enum CleanError {
    #[error("Failed to list processes: {0}")]
    Observation(String),
    #[error("Unknown user {0}")]
    UnknownUser(String),
    #[error("Failed to read baseline {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Corrupt baseline {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },
    #[error("Failed to write baseline {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to check PID {0}: {1}")]
    Liveness(Pid, nix::errno::Errno),
    #[error("Failed to kill: {}", format_pids(.0))]
    Survivors(FailSet),
    #[error("No cleaner named {0} is registered")]
    UnknownCleaner(String),
    #[error("Procfs error: {0}")]
    ProcfsError(String),
}

#[cfg(target_os = "linux")]
impl From<procfs::ProcError> for CleanError {
    fn from(err: procfs::ProcError) -> Self {
        CleanError::ProcfsError(err.to_string())
    }
}

/// Renders pids as a comma separated list, e.g. `12, 40`.
pub fn format_pids(pids: &BTreeSet<Pid>) -> String {
    pids.iter()
        .map(Pid::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn insert_rejects_duplicate_pid() {
        let mut set = ProcessSet::new();
        set.insert(ProcessRecord::new(1, "foo")).unwrap();
        let existing = set.insert(ProcessRecord::new(1, "bar")).unwrap_err();
        assert_eq!(existing, ProcessRecord::new(1, "foo"));
        assert_eq!(set.command(1), Some("foo"));
    }

    #[test]
    fn difference_compares_whole_pairs() {
        let a: ProcessSet = [
            ProcessRecord::new(1, "foo"),
            ProcessRecord::new(2, "bar"),
            ProcessRecord::new(3, "baz"),
        ]
        .into_iter()
        .collect();
        let b: ProcessSet = [ProcessRecord::new(1, "foo"), ProcessRecord::new(2, "qux")]
            .into_iter()
            .collect();

        let diff: Vec<_> = a.difference(&b).collect();
        assert_eq!(diff, vec![(2, "bar"), (3, "baz")]);
    }

    #[test]
    fn commands_are_normalized() {
        assert_eq!(normalize_command("sleep 30"), "sleep 30");
        assert_eq!(normalize_command("  x  "), "x");
        assert_eq!(normalize_command("sh -c line one\nline two\t"), "sh -c line one?line two?");
        assert_eq!(normalize_command("\r\n"), "??");
        assert_eq!(normalize_command("   "), "?");
    }

    #[test]
    fn set_stores_normalized_commands() {
        let mut set = ProcessSet::new();
        set.insert(ProcessRecord::new(1, "foo ")).unwrap();
        let collected: ProcessSet = [ProcessRecord::new(2, "a\nb")].into_iter().collect();
        assert_eq!(set.command(1), Some("foo"));
        assert_eq!(collected.command(2), Some("a?b"));
    }

    #[test]
    fn survivors_error_lists_pids() {
        let err = CleanError::Survivors([7, 12].into_iter().collect());
        assert_eq!(err.to_string(), "Failed to kill: 7, 12");
    }
}
