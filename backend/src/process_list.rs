//! Process listing for a single user.

use crate::types::{CleanError, Pid, ProcessRecord, ProcessSet};
use nix::unistd::{Uid, User};
use std::process::Command;
use tracing::debug;

/// Source of `(pid, command)` pairs for the processes a user owns.
pub trait ProcessLister {
    fn list(&self, user: &str) -> Result<ProcessSet, CleanError>;
}

impl<L: ProcessLister + ?Sized> ProcessLister for Box<L> {
    fn list(&self, user: &str) -> Result<ProcessSet, CleanError> {
        (**self).list(user)
    }
}

/// Parse one `<pid> <command>` line.
///
/// The pid must be a literal non-negative integer and the command is
/// everything after the first run of whitespace. Anything else, such as a
/// `ps` header, yields `None`.
pub fn parse_ps_line(line: &str) -> Option<ProcessRecord> {
    let line = line.trim();
    let split = line.find(char::is_whitespace)?;
    let (pid, command) = line.split_at(split);
    if !pid.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let pid: Pid = pid.parse().ok()?;
    let command = command.trim_start();
    if command.is_empty() {
        return None;
    }
    Some(ProcessRecord::new(pid, command))
}

/// Resolve a login name, or a numeric uid, to a uid.
pub fn resolve_uid(user: &str) -> Result<Uid, CleanError> {
    match User::from_name(user) {
        Ok(Some(entry)) => return Ok(entry.uid),
        Ok(None) => {}
        Err(e) => return Err(CleanError::Observation(format!("user lookup failed: {}", e))),
    }
    user.parse::<u32>()
        .map(Uid::from_raw)
        .map_err(|_| CleanError::UnknownUser(user.to_string()))
}

/// Login name of the invoking user, looked up from the real uid.
pub fn current_user() -> Result<String, CleanError> {
    let uid = Uid::current();
    match User::from_uid(uid) {
        Ok(Some(entry)) => Ok(entry.name),
        Ok(None) => Ok(uid.to_string()),
        Err(e) => Err(CleanError::Observation(format!("user lookup failed: {}", e))),
    }
}

/// Lists processes by running `ps -o pid,args -U <user>`.
#[derive(Debug, Clone)]
pub struct PsLister {
    program: String,
}

impl Default for PsLister {
    fn default() -> Self {
        Self {
            program: "ps".to_string(),
        }
    }
}

impl PsLister {
    /// Use a different `ps` binary.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl ProcessLister for PsLister {
    fn list(&self, user: &str) -> Result<ProcessSet, CleanError> {
        let output = Command::new(&self.program)
            .args(["-o", "pid,args", "-U", user])
            .output()
            .map_err(|e| CleanError::Observation(format!("failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(CleanError::Observation(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_listing(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Parse a whole `ps` listing, skipping lines that are not records.
pub fn parse_listing(listing: &str) -> Result<ProcessSet, CleanError> {
    let mut set = ProcessSet::new();
    for line in listing.lines() {
        let Some(record) = parse_ps_line(line) else {
            debug!("Skipping process listing line {:?}", line);
            continue;
        };
        if let Err(existing) = set.insert(record) {
            return Err(CleanError::Observation(format!(
                "PID {} listed more than once",
                existing.pid
            )));
        }
    }
    Ok(set)
}

/// Lists processes by walking `/proc`.
#[cfg(target_os = "linux")]
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcfsLister;

#[cfg(target_os = "linux")]
impl ProcessLister for ProcfsLister {
    fn list(&self, user: &str) -> Result<ProcessSet, CleanError> {
        let uid = resolve_uid(user)?.as_raw();
        let all_procs = procfs::process::all_processes()?;

        let mut set = ProcessSet::new();
        // Processes may exit mid-walk, so per-process errors are skipped.
        for proc in all_procs.flatten() {
            let Ok(status) = proc.status() else { continue };
            if status.ruid != uid {
                continue;
            }
            // Arguments may hold newlines or padding; the set normalizes
            // them so the command survives a baseline round trip.
            let command = match proc.cmdline() {
                Ok(argv) if argv.iter().any(|arg| !arg.trim().is_empty()) => argv.join(" "),
                _ => format!("[{}]", status.name),
            };
            if let Err(existing) = set.insert(ProcessRecord::new(proc.pid, command)) {
                return Err(CleanError::Observation(format!(
                    "PID {} listed more than once",
                    existing.pid
                )));
            }
        }
        Ok(set)
    }
}
