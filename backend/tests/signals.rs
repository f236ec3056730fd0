//! Real signal delivery against child processes.

use cleanslate_backend::{pid_exists, KillSet, NixSignaller, Pid, Terminator};
use nix::sys::signal::Signal;
use std::io::{BufRead, BufReader};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

/// Spawn `command` and reap it on a background thread, so a killed child does
/// not linger as a zombie.
fn spawn_reaped(command: &mut Command) -> Pid {
    let mut child = command.stdout(Stdio::piped()).spawn().unwrap();
    let pid = child.id() as Pid;
    let stdout = child.stdout.take().unwrap();
    thread::spawn(move || child.wait());

    // Every test command prints one line once it is ready for signals.
    let mut ready = String::new();
    BufReader::new(stdout).read_line(&mut ready).unwrap();
    pid
}

fn sleeper() -> Pid {
    spawn_reaped(Command::new("sh").args(["-c", "echo ready; exec sleep 30"]))
}

fn ignores_sigterm() -> Pid {
    spawn_reaped(Command::new("sh").args(["-c", "trap '' TERM; echo ready; exec sleep 30"]))
}

fn terminator() -> Terminator<NixSignaller> {
    Terminator::new(NixSignaller, Duration::from_millis(500))
}

#[test]
fn own_pid_exists() {
    let me = std::process::id() as Pid;
    assert!(pid_exists(&NixSignaller, me).unwrap());
}

#[test]
fn reaped_pid_does_not_exist() {
    let mut child = Command::new("true").spawn().unwrap();
    let pid = child.id() as Pid;
    child.wait().unwrap();
    assert!(!pid_exists(&NixSignaller, pid).unwrap());
}

#[test]
fn sigterm_kills_sleeper() {
    let pid = sleeper();
    let kill_set: KillSet = [pid].into_iter().collect();

    assert!(terminator().terminate(&kill_set, Signal::SIGTERM, false).is_empty());
    assert!(!pid_exists(&NixSignaller, pid).unwrap());
}

#[test]
fn dry_run_leaves_process_alive() {
    let pid = sleeper();
    let kill_set: KillSet = [pid].into_iter().collect();

    assert!(terminator().terminate_with_escalation(&kill_set, true).is_empty());
    assert!(pid_exists(&NixSignaller, pid).unwrap());

    terminator().terminate(&kill_set, Signal::SIGKILL, false);
}

#[test]
fn sigterm_resistant_process_needs_escalation() {
    let pid = ignores_sigterm();
    let kill_set: KillSet = [pid].into_iter().collect();

    assert_eq!(
        terminator().terminate(&kill_set, Signal::SIGTERM, false),
        kill_set
    );
    assert!(terminator().terminate_with_escalation(&kill_set, false).is_empty());
    assert!(!pid_exists(&NixSignaller, pid).unwrap());
}

#[test]
fn vanished_pid_fails_delivery() {
    let mut child = Command::new("true").spawn().unwrap();
    let pid = child.id() as Pid;
    child.wait().unwrap();
    let kill_set: KillSet = [pid].into_iter().collect();

    assert_eq!(
        terminator().terminate(&kill_set, Signal::SIGTERM, false),
        kill_set
    );
}
