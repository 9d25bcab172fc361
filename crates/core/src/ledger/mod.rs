//! Download ledger - the persisted record of what has been fetched.
//!
//! Keys are plain strings so the backing file stays readable and editable by
//! hand; pruning it is an operator action.

mod json;

pub use json::JsonLedger;

use std::fmt;

use thiserror::Error;

/// Resolved title used by the pre-search existence check, before the real
/// matched title is known.
pub const PLACEHOLDER_TITLE: &str = "未知标题";

/// Errors from the ledger backing store.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ledger I/O error at {path}: {message}")]
    Io { path: String, message: String },

    #[error("Ledger file {path} is corrupt: {message}")]
    Corrupt { path: String, message: String },
}

/// One ledger record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LedgerKey(String);

impl LedgerKey {
    /// `{series}_{resolution}_{resolved_title}`
    pub fn new(series_title: &str, resolution: &str, resolved_title: &str) -> Self {
        Self(format!("{}_{}_{}", series_title, resolution, resolved_title))
    }

    /// Key checked before searching a rung.
    ///
    /// Only ever equal to a key built with the same placeholder, never to one
    /// recorded after a real download.
    pub fn placeholder(series_title: &str, resolution: &str) -> Self {
        Self::new(series_title, resolution, PLACEHOLDER_TITLE)
    }

    /// Movies are recorded once per title and year.
    pub fn movie(title: &str, year: &str) -> Self {
        Self(format!("{}_{}", title, year))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LedgerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for LedgerKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Idempotent record of handled downloads.
pub trait DownloadLedger: Send + Sync {
    /// Re-read the backing store and replace the in-memory snapshot.
    ///
    /// A missing store is an empty ledger. On a read or parse error the
    /// snapshot is cleared and the error returned, so callers can log it and
    /// carry on as if nothing had been recorded. Keys whose write failed
    /// earlier in the run stay in the snapshot either way.
    fn load(&self) -> Result<Vec<String>, LedgerError>;

    /// Whether `key` is in the current snapshot.
    fn contains(&self, key: &LedgerKey) -> bool;

    /// Record `key` and persist the whole ledger immediately, keeping any
    /// records another writer added to the store since the last load.
    ///
    /// Returns `Ok(false)` when the key was already present. On a write
    /// error the key stays in the snapshot for the rest of the run.
    fn append(&self, key: &LedgerKey) -> Result<bool, LedgerError>;

    /// Snapshot in insertion order.
    fn entries(&self) -> Vec<String>;
}
