//! SQLite-backed library source.
//!
//! Reads `MISS_MOVIES(title, year)` and `MISS_TVS(title, missing_episodes)`.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{types::ValueRef, Connection, OpenFlags};
use tracing::{debug, warn};

use super::{LibraryError, LibrarySource};
use crate::selection::{MediaMode, WantedItem};

/// Library database opened read-only.
pub struct SqliteLibrary {
    conn: Mutex<Connection>,
}

impl SqliteLibrary {
    /// Open an existing library database.
    pub fn open(path: &Path) -> Result<Self, LibraryError> {
        if !path.exists() {
            return Err(LibraryError::NotFound(path.display().to_string()));
        }
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| LibraryError::Database(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Wrap an existing connection (useful for testing).
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn wanted_movies(conn: &Connection) -> Result<Vec<WantedItem>, LibraryError> {
        let mut stmt = conn
            .prepare("SELECT title, year FROM MISS_MOVIES")
            .map_err(|e| LibraryError::Database(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| {
                let title: String = row.get(0)?;
                // Year is stored as INTEGER by some library versions and TEXT by others.
                let year = match row.get_ref(1)? {
                    ValueRef::Integer(i) => i.to_string(),
                    ValueRef::Text(t) => String::from_utf8_lossy(t).trim().to_string(),
                    ValueRef::Real(r) => (r as i64).to_string(),
                    _ => String::new(),
                };
                Ok((title, year))
            })
            .map_err(|e| LibraryError::Database(e.to_string()))?;

        let mut items = Vec::new();
        for row in rows {
            let (title, year) = row.map_err(|e| LibraryError::Database(e.to_string()))?;
            items.push(WantedItem::movie(title, year));
        }

        debug!(count = items.len(), "Read wanted movies");
        Ok(items)
    }

    fn wanted_tv(conn: &Connection) -> Result<Vec<WantedItem>, LibraryError> {
        let mut stmt = conn
            .prepare("SELECT title, missing_episodes FROM MISS_TVS")
            .map_err(|e| LibraryError::Database(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| {
                let title: String = row.get(0)?;
                let missing: Option<String> = row.get(1)?;
                Ok((title, missing))
            })
            .map_err(|e| LibraryError::Database(e.to_string()))?;

        let mut items = Vec::new();
        for row in rows {
            let (title, missing) = row.map_err(|e| LibraryError::Database(e.to_string()))?;
            let episodes = parse_missing_episodes(missing.as_deref().unwrap_or_default());
            let first_missing = episodes.iter().copied().min();
            items.push(WantedItem::tv(title, first_missing));
        }

        debug!(count = items.len(), "Read wanted TV series");
        Ok(items)
    }
}

impl LibrarySource for SqliteLibrary {
    fn wanted(&self, mode: MediaMode) -> Result<Vec<WantedItem>, LibraryError> {
        let conn = self.conn.lock().unwrap();
        match mode {
            MediaMode::Movie => Self::wanted_movies(&conn),
            MediaMode::Tv => Self::wanted_tv(&conn),
        }
    }
}

/// Parse a comma-separated episode list such as `"5, 6,12"`.
///
/// Tokens that are not numbers are skipped with a warning.
pub fn parse_missing_episodes(list: &str) -> Vec<u32> {
    list.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .filter_map(|token| match token.parse::<u32>() {
            Ok(n) => Some(n),
            Err(_) => {
                warn!(token, "Ignoring malformed missing-episode entry");
                None
            }
        })
        .collect()
}
