//! JSON-file ledger.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Serializer;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use super::{DownloadLedger, LedgerError, LedgerKey};

/// Ledger stored as a pretty-printed JSON array of strings.
///
/// Every append re-reads the file, merges it with the snapshot and rewrites
/// the whole list through a temp file in the same directory followed by a
/// rename, so a crash leaves either the old or the new list on disk and a
/// record written by another handle is never dropped.
pub struct JsonLedger {
    path: PathBuf,
    state: Mutex<Snapshot>,
}

#[derive(Default)]
struct Snapshot {
    entries: Vec<String>,
    /// Keys whose write failed. Kept across reloads until a write succeeds.
    unsaved: Vec<String>,
}

/// `records` followed by the keys of `extra` it does not already hold.
fn merge(mut records: Vec<String>, extra: &[String]) -> Vec<String> {
    for key in extra {
        if !records.contains(key) {
            records.push(key.clone());
        }
    }
    records
}

impl JsonLedger {
    /// Create a ledger bound to `path` without reading it.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: Mutex::new(Snapshot::default()),
        }
    }

    /// Create a ledger and load it, failing open on read errors.
    pub fn open(path: impl Into<PathBuf>) -> (Self, Option<LedgerError>) {
        let ledger = Self::new(path);
        let error = ledger.load().err();
        (ledger, error)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, e: impl std::fmt::Display) -> LedgerError {
        LedgerError::Io {
            path: self.path.display().to_string(),
            message: e.to_string(),
        }
    }

    fn read_file(&self) -> Result<Vec<String>, LedgerError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "Ledger file does not exist yet, starting empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(self.io_error(e)),
        };

        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }

        let records: Vec<String> =
            serde_json::from_str(&contents).map_err(|e| LedgerError::Corrupt {
                path: self.path.display().to_string(),
                message: e.to_string(),
            })?;

        // Hand-edited files may carry duplicates; keep the first occurrence.
        let mut unique: Vec<String> = Vec::with_capacity(records.len());
        for record in records {
            if !unique.contains(&record) {
                unique.push(record);
            }
        }
        Ok(unique)
    }

    fn write_file(&self, entries: &[String]) -> Result<(), LedgerError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| self.io_error(e))?;

        let mut temp = NamedTempFile::new_in(&dir).map_err(|e| self.io_error(e))?;
        let formatter = PrettyFormatter::with_indent(b"    ");
        let mut serializer = Serializer::with_formatter(&mut temp, formatter);
        entries
            .serialize(&mut serializer)
            .map_err(|e| self.io_error(e))?;
        temp.write_all(b"\n").map_err(|e| self.io_error(e))?;
        temp.as_file().sync_all().map_err(|e| self.io_error(e))?;
        temp.persist(&self.path).map_err(|e| self.io_error(e.error))?;

        debug!(path = %self.path.display(), entries = entries.len(), "Ledger saved");
        Ok(())
    }
}

impl DownloadLedger for JsonLedger {
    fn load(&self) -> Result<Vec<String>, LedgerError> {
        let result = self.read_file();
        let mut state = self.state.lock().unwrap();
        match result {
            Ok(records) => {
                let merged = merge(records, &state.unsaved);
                state.entries = merged;
                debug!(path = %self.path.display(), entries = state.entries.len(), "Ledger loaded");
                Ok(state.entries.clone())
            }
            Err(e) => {
                state.entries = state.unsaved.clone();
                Err(e)
            }
        }
    }

    fn contains(&self, key: &LedgerKey) -> bool {
        self.state
            .lock()
            .unwrap()
            .entries
            .iter()
            .any(|entry| entry == key.as_str())
    }

    fn append(&self, key: &LedgerKey) -> Result<bool, LedgerError> {
        let mut state = self.state.lock().unwrap();
        if state.entries.iter().any(|entry| entry == key.as_str()) {
            return Ok(false);
        }

        let mut entries = match self.read_file() {
            Ok(records) => merge(records, &state.entries),
            Err(e) => {
                warn!(error = %e, "Could not re-read ledger before writing, using snapshot");
                state.entries.clone()
            }
        };
        if entries.iter().any(|entry| entry == key.as_str()) {
            state.entries = entries;
            return Ok(false);
        }
        entries.push(key.as_str().to_string());
        state.entries = entries;

        match self.write_file(&state.entries) {
            Ok(()) => {
                state.unsaved.clear();
                Ok(true)
            }
            Err(e) => {
                state.unsaved.push(key.as_str().to_string());
                Err(e)
            }
        }
    }

    fn entries(&self) -> Vec<String> {
        self.state.lock().unwrap().entries.clone()
    }
}
