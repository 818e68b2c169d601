//! Persisted device state
//!
//! A single scalar (the lamp state) kept as text in a small file. There is
//! no locking and no atomic replace: the last write wins.

use std::fmt::Display;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

/// Value written when the state file does not exist yet
pub const DEFAULT_STATE: &str = "0";

/// Default state file name
pub const DEFAULT_STATE_FILE: &str = "state.db";

/// Errors reading or writing persisted state
#[derive(Error, Debug)]
pub enum StateError {
    /// The file could not be read or written
    #[error("State file I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("State file {path} holds an unreadable value: {value:?}")]
    /// The file holds something other than a flag
    Corrupt {
        /// State file
        path: PathBuf,
        /// Raw file content
        value: String,
    },
}

/// How [`save_state`] treats existing content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Replace the file content
    #[default]
    Overwrite,
    /// Add to the end of the file
    Append,
}

/// Write the string form of `value` to `path`
pub fn save_state(path: impl AsRef<Path>, value: impl Display, mode: WriteMode) -> io::Result<()> {
    let path = path.as_ref();
    let mut file = match mode {
        WriteMode::Overwrite => OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?,
        WriteMode::Append => OpenOptions::new().append(true).create(true).open(path)?,
    };
    write!(file, "{}", value)?;
    debug!(path = %path.display(), ?mode, "state saved");
    Ok(())
}

/// Read the stored string; a missing file is created holding `"0"`
pub fn load_state(path: impl AsRef<Path>) -> io::Result<String> {
    let path = path.as_ref();
    match fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            save_state(path, DEFAULT_STATE, WriteMode::Overwrite)?;
            Ok(DEFAULT_STATE.to_string())
        }
        Err(e) => Err(e),
    }
}

/// Lamp on/off state backed by a state file
#[derive(Debug, Clone)]
pub struct LampState {
    path: PathBuf,
    is_on: bool,
}

impl LampState {
    /// Load from `path`. An empty file means "on"; `1`/`0` and
    /// `True`/`False` are accepted.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StateError> {
        let path = path.into();
        let raw = load_state(&path)?;
        let is_on = parse_flag(&raw).ok_or_else(|| StateError::Corrupt {
            path: path.clone(),
            value: raw.clone(),
        })?;
        Ok(Self { path, is_on })
    }

    /// Current state as last loaded or saved
    pub fn is_on(&self) -> bool {
        self.is_on
    }

    /// Backing state file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist, then set. A failed write leaves the state unchanged.
    pub fn set(&mut self, on: bool) -> Result<(), StateError> {
        save_state(&self.path, u8::from(on), WriteMode::Overwrite)?;
        self.is_on = on;
        Ok(())
    }

    /// Flip and persist; returns the new state
    pub fn toggle(&mut self) -> Result<bool, StateError> {
        self.set(!self.is_on)?;
        info!(lamp_on = self.is_on, "lamp toggled");
        Ok(self.is_on)
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    let value = raw.trim();
    if value.is_empty() {
        return Some(true);
    }
    if value.eq_ignore_ascii_case("true") {
        return Some(true);
    }
    if value.eq_ignore_ascii_case("false") {
        return Some(false);
    }
    value.parse::<i64>().ok().map(|n| n != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag(""), Some(true));
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag("0\n"), Some(false));
        assert_eq!(parse_flag("True"), Some(true));
        assert_eq!(parse_flag("false"), Some(false));
        assert_eq!(parse_flag("lamp"), None);
    }

    #[test]
    fn test_missing_file_is_created_with_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.db");

        assert_eq!(load_state(&path).unwrap(), "0");
        assert_eq!(fs::read_to_string(&path).unwrap(), "0");
    }

    #[test]
    fn test_overwrite_and_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.db");

        save_state(&path, 1, WriteMode::Overwrite).unwrap();
        save_state(&path, 0, WriteMode::Append).unwrap();
        assert_eq!(load_state(&path).unwrap(), "10");

        save_state(&path, 7, WriteMode::Overwrite).unwrap();
        assert_eq!(load_state(&path).unwrap(), "7");
    }

    #[test]
    fn test_failed_write_keeps_lamp_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.db");
        let mut lamp = LampState::load(&path).unwrap();
        assert!(!lamp.is_on());

        // A directory in place of the file makes every write fail
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();

        assert!(matches!(lamp.set(true), Err(StateError::Io(_))));
        assert!(!lamp.is_on());
        assert!(lamp.toggle().is_err());
        assert!(!lamp.is_on());
    }
}
