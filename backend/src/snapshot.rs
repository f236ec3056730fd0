//! Baseline snapshot persistence.
//!
//! One record per line, `<pid> <command>`, in ascending pid order. Reading
//! uses the same tolerant line parser as the `ps` observer.

use crate::process_list::parse_ps_line;
use crate::types::{CleanError, ProcessSet};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where the baseline lives unless told otherwise.
pub const DEFAULT_BASELINE_PATH: &str = "/var/tmp/cleanslate";

/// Where a baseline is kept between runs.
pub trait BaselineStore {
    /// The saved baseline, or `None` if there is none yet.
    fn load(&self) -> Result<Option<ProcessSet>, CleanError>;

    /// Replace the saved baseline with `set`, returning where it went.
    fn save(&self, set: &ProcessSet) -> Result<PathBuf, CleanError>;
}

/// A baseline kept in a text file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaselineFile {
    path: PathBuf,
}

impl BaselineFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BaselineStore for BaselineFile {
    fn load(&self) -> Result<Option<ProcessSet>, CleanError> {
        load(&self.path)
    }

    fn save(&self, set: &ProcessSet) -> Result<PathBuf, CleanError> {
        save(set, &self.path)
    }
}

/// Write `set` to `path`, replacing any previous content.
pub fn save(set: &ProcessSet, path: &Path) -> Result<PathBuf, CleanError> {
    let write_error = |source| CleanError::Write {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(write_error)?;
    let mut writer = BufWriter::new(file);
    for (pid, command) in set.iter() {
        writeln!(writer, "{} {}", pid, command).map_err(write_error)?;
    }
    writer.flush().map_err(write_error)?;
    Ok(path.to_path_buf())
}

/// Read the baseline at `path`. A missing file is `Ok(None)`.
pub fn load(path: &Path) -> Result<Option<ProcessSet>, CleanError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(CleanError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let corrupt = |reason: String| CleanError::Parse {
        path: path.to_path_buf(),
        reason,
    };

    let mut set = ProcessSet::new();
    for (number, line) in content.lines().enumerate() {
        let Some(record) = parse_ps_line(line) else {
            if !line.trim().is_empty() {
                debug!("Skipping malformed baseline line {}: {:?}", number + 1, line);
            }
            continue;
        };
        if let Err(existing) = set.insert(record) {
            return Err(corrupt(format!(
                "PID {} appears more than once (line {})",
                existing.pid,
                number + 1
            )));
        }
    }

    if set.is_empty() && !content.trim().is_empty() {
        return Err(corrupt("no valid records".to_string()));
    }
    Ok(Some(set))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProcessRecord;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn missing_file_is_absent() {
        let dir = tempdir().unwrap();
        assert_eq!(load(&dir.path().join("nope")).unwrap(), None);
    }

    #[test]
    fn writes_one_line_per_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("baseline");
        let set: ProcessSet = [
            ProcessRecord::new(30, "sleep 30"),
            ProcessRecord::new(4, "/bin/bash -l"),
        ]
        .into_iter()
        .collect();

        assert_eq!(save(&set, &path).unwrap(), path);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "4 /bin/bash -l\n30 sleep 30\n"
        );
        assert_eq!(load(&path).unwrap(), Some(set));
    }

    #[test]
    fn padded_and_multiline_commands_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("baseline");
        let set: ProcessSet = [
            ProcessRecord::new(1, "foo "),
            ProcessRecord::new(2, "sh -c echo\n9 fake record"),
            ProcessRecord::new(3, "\targs\r"),
        ]
        .into_iter()
        .collect();

        save(&set, &path).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "1 foo\n2 sh -c echo?9 fake record\n3 ?args?\n"
        );
        assert_eq!(load(&path).unwrap(), Some(set));
    }

    #[test]
    fn save_overwrites() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("baseline");
        save(&[ProcessRecord::new(1, "a"), ProcessRecord::new(2, "b")].into_iter().collect(), &path)
            .unwrap();
        let second: ProcessSet = [ProcessRecord::new(3, "c")].into_iter().collect();
        save(&second, &path).unwrap();
        assert_eq!(load(&path).unwrap(), Some(second));
    }

    #[test]
    fn skips_malformed_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("baseline");
        std::fs::write(&path, "garbage\n12 vim notes.txt\n\n-4 nope\n13\n").unwrap();

        let expected: ProcessSet = [ProcessRecord::new(12, "vim notes.txt")].into_iter().collect();
        assert_eq!(load(&path).unwrap(), Some(expected));
    }

    #[test]
    fn empty_file_is_empty_set() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("baseline");
        std::fs::write(&path, "\n  \n").unwrap();
        assert_eq!(load(&path).unwrap(), Some(ProcessSet::new()));
    }

    #[test]
    fn duplicate_pid_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("baseline");
        std::fs::write(&path, "1 a\n1 b\n").unwrap();
        assert!(matches!(load(&path), Err(CleanError::Parse { .. })));
    }

    #[test]
    fn no_valid_records_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("baseline");
        std::fs::write(&path, "1,2,3,4").unwrap();
        assert!(matches!(load(&path), Err(CleanError::Parse { .. })));
    }

    #[test]
    fn invalid_utf8_is_read_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("baseline");
        std::fs::write(&path, [b'1', b' ', 0xff, 0xfe, b'\n']).unwrap();
        assert!(matches!(load(&path), Err(CleanError::Read { .. })));
    }

    #[test]
    fn unwritable_path_is_write_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("baseline");
        assert!(matches!(
            save(&ProcessSet::new(), &path),
            Err(CleanError::Write { .. })
        ));
    }
}
