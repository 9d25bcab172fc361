//! Wanted-list source.
//!
//! The media library database tracks which movies and episodes are missing;
//! a run only ever reads it.

mod sqlite;

pub use sqlite::{parse_missing_episodes, SqliteLibrary};

use thiserror::Error;

use crate::selection::{MediaMode, WantedItem};

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Library database not found: {0}")]
    NotFound(String),

    #[error("Library database error: {0}")]
    Database(String),
}

/// Read-only provider of wanted items.
pub trait LibrarySource: Send + Sync {
    /// Wanted items for one mode, in library order.
    fn wanted(&self, mode: MediaMode) -> Result<Vec<WantedItem>, LibraryError>;
}
