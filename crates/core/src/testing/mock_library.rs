//! Mock library source for testing.

use std::sync::RwLock;

use crate::library::{LibraryError, LibrarySource};
use crate::selection::{MediaMode, WantedItem};

/// Mock implementation of the LibrarySource trait.
///
/// The trait is synchronous, so state sits behind a std `RwLock`.
#[derive(Debug, Default)]
pub struct MockLibrary {
    movies: RwLock<Vec<WantedItem>>,
    tv: RwLock<Vec<WantedItem>>,
    /// When set, `wanted` fails with a database error.
    error: RwLock<Option<String>>,
}

impl MockLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a library holding `items`, sorted into movie and TV lists.
    pub fn with_items(items: Vec<WantedItem>) -> Self {
        let library = Self::new();
        for item in items {
            library.add(item);
        }
        library
    }

    pub fn add(&self, item: WantedItem) {
        match item.mode() {
            MediaMode::Movie => self.movies.write().unwrap().push(item),
            MediaMode::Tv => self.tv.write().unwrap().push(item),
        }
    }

    /// Make every following read fail.
    pub fn set_error(&self, message: &str) {
        *self.error.write().unwrap() = Some(message.to_string());
    }
}

impl LibrarySource for MockLibrary {
    fn wanted(&self, mode: MediaMode) -> Result<Vec<WantedItem>, LibraryError> {
        if let Some(message) = self.error.read().unwrap().clone() {
            return Err(LibraryError::Database(message));
        }
        let items = match mode {
            MediaMode::Movie => self.movies.read().unwrap().clone(),
            MediaMode::Tv => self.tv.read().unwrap().clone(),
        };
        Ok(items)
    }
}
