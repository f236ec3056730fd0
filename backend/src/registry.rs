//! Registry of the cleaners available on this platform.

use crate::cleaner::{Cleaner, PlatformCleaner, PosixProcessCleaner};
use crate::types::CleanError;
use clap::{ArgMatches, Command};
use std::collections::BTreeMap;
use tracing::debug;

/// Cleaners keyed by sub-command name.
///
/// Filled once at startup, before the command line is parsed, and only read
/// from afterwards.
#[derive(Default)]
pub struct CleanerRegistry {
    cleaners: BTreeMap<&'static str, Box<dyn PlatformCleaner>>,
}

impl CleanerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in cleaner that supports this platform.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(PosixProcessCleaner));
        registry
    }

    /// Add `cleaner` if it supports this platform. Returns whether it was added.
    pub fn register(&mut self, cleaner: Box<dyn PlatformCleaner>) -> bool {
        if !cleaner.check_platform() {
            debug!("Cleaner {} does not support this platform", cleaner.name());
            return false;
        }
        self.cleaners.insert(cleaner.name(), cleaner);
        true
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.cleaners.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.cleaners.is_empty()
    }

    /// Add one sub-command per registered cleaner to `command`.
    pub fn augment(&self, command: Command) -> Command {
        self.cleaners.values().fold(command, |command, cleaner| {
            command.subcommand(
                cleaner.register_arguments(Command::new(cleaner.name()).about(cleaner.about())),
            )
        })
    }

    /// Build the cleaner named `name` from its sub-command's matches.
    pub fn build(&self, name: &str, matches: &ArgMatches) -> Result<Box<dyn Cleaner>, CleanError> {
        self.cleaners
            .get(name)
            .ok_or_else(|| CleanError::UnknownCleaner(name.to_string()))?
            .build(matches)
    }
}
