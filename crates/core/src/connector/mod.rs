//! Site connector abstraction.
//!
//! This module provides a `SiteConnector` trait for talking to the indexing
//! site (login, search, detail page, torrent attachment) and a forum
//! implementation that drives it over plain HTTP with a cookie session.

mod forum;
mod parser;

pub use forum::{ForumConnector, ForumConnectorConfig};
pub use parser::{
    filename_from_disposition, find_torrent_anchor, is_detail_page, is_logged_in,
    parse_login_form, parse_search_form, parse_search_results, FormMethod, FormSpec,
};

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::selection::RawResult;

/// Errors that can occur while talking to the site.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timeout")]
    Timeout,

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Login failed: {0}")]
    LoginFailed(String),

    #[error("Expected element not found: {0}")]
    ElementNotFound(String),

    #[error("No detail page is open")]
    NoDetailPage,

    #[error("Failed to store download: {0}")]
    Io(String),
}

impl From<reqwest::Error> for ConnectorError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ConnectorError::Timeout
        } else if e.is_connect() {
            ConnectorError::ConnectionFailed(e.to_string())
        } else {
            ConnectorError::Request(e.to_string())
        }
    }
}

/// Site account.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Trait for site backends.
///
/// A connector owns one authenticated session. The detail page opened by
/// `open_detail` is the one `find_torrent_link` inspects.
#[async_trait]
pub trait SiteConnector: Send + Sync {
    /// Connector name for logging.
    fn name(&self) -> &str;

    /// Authenticate the session.
    async fn login(&self, credentials: &Credentials) -> Result<(), ConnectorError>;

    /// Run one search and return every result entry in page order.
    async fn search(&self, query: &str) -> Result<Vec<RawResult>, ConnectorError>;

    /// Navigate to a result's detail page.
    async fn open_detail(&self, link: &str) -> Result<(), ConnectorError>;

    /// Torrent attachment link on the open detail page, if there is one.
    async fn find_torrent_link(&self) -> Result<Option<String>, ConnectorError>;

    /// Fetch the torrent file; returns once it is on disk.
    async fn trigger_download(&self, url: &str) -> Result<PathBuf, ConnectorError>;

    /// Release the session. Called on every exit path of a run.
    async fn close(&self) {}
}
