//! Mock site connector for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::connector::{ConnectorError, Credentials, SiteConnector};
use crate::selection::RawResult;

/// Connector operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    Login,
    Search,
    OpenDetail,
    FindTorrentLink,
    Download,
}

/// Mock implementation of the SiteConnector trait.
///
/// Provides controllable behavior for testing:
/// - Return configurable search results, globally or per query
/// - Track searches, opened detail pages and downloads
/// - Inject one-shot failures per operation
/// - Simulate slow searches
///
/// Every detail page has a torrent link (`{link}/attachment.torrent`) unless
/// the link was marked with `remove_torrent_link`.
///
/// # Example
///
/// ```rust,ignore
/// use mediagrab_core::testing::MockConnector;
///
/// let connector = MockConnector::new();
/// connector.set_results(vec![RawResult::new("Foo [第5集] 1080p", "https://site/t/1")]).await;
///
/// // ... run the engine ...
///
/// assert_eq!(connector.search_count().await, 1);
/// assert_eq!(connector.downloads().await.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MockConnector {
    /// Results for queries without a specific entry.
    results: Arc<RwLock<Vec<RawResult>>>,
    /// Results keyed by exact query.
    query_results: Arc<RwLock<HashMap<String, Vec<RawResult>>>>,
    /// Detail links whose page has no torrent attachment.
    without_torrent: Arc<RwLock<HashSet<String>>>,
    /// One-shot failures.
    next_errors: Arc<RwLock<HashMap<MockOperation, ConnectorError>>>,
    /// Delay applied to every search.
    search_delay: Arc<RwLock<Option<Duration>>>,
    /// Recorded search queries.
    searches: Arc<RwLock<Vec<String>>>,
    /// Recorded detail links.
    opened: Arc<RwLock<Vec<String>>>,
    /// Recorded torrent URLs.
    downloads: Arc<RwLock<Vec<String>>>,
    /// Detail page currently open.
    current_detail: Arc<RwLock<Option<String>>>,
    logins: Arc<RwLock<u32>>,
    closes: Arc<RwLock<u32>>,
}

impl MockConnector {
    /// Create a new mock connector with no results.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the results returned for any query without a specific entry.
    pub async fn set_results(&self, results: Vec<RawResult>) {
        *self.results.write().await = results;
    }

    /// Set the results returned for one exact query.
    pub async fn set_query_results(&self, query: &str, results: Vec<RawResult>) {
        self.query_results
            .write()
            .await
            .insert(query.to_string(), results);
    }

    /// Make the detail page at `link` come up without a torrent link.
    pub async fn remove_torrent_link(&self, link: &str) {
        self.without_torrent.write().await.insert(link.to_string());
    }

    /// Configure the next call of `operation` to fail with `error`.
    pub async fn set_next_error(&self, operation: MockOperation, error: ConnectorError) {
        self.next_errors.write().await.insert(operation, error);
    }

    /// Delay every search by `delay`.
    pub async fn set_search_delay(&self, delay: Duration) {
        *self.search_delay.write().await = Some(delay);
    }

    /// Get recorded search queries.
    pub async fn searches(&self) -> Vec<String> {
        self.searches.read().await.clone()
    }

    /// Get the number of searches performed.
    pub async fn search_count(&self) -> usize {
        self.searches.read().await.len()
    }

    /// Get recorded detail links.
    pub async fn opened_details(&self) -> Vec<String> {
        self.opened.read().await.clone()
    }

    /// Get recorded torrent URLs.
    pub async fn downloads(&self) -> Vec<String> {
        self.downloads.read().await.clone()
    }

    pub async fn login_count(&self) -> u32 {
        *self.logins.read().await
    }

    pub async fn close_count(&self) -> u32 {
        *self.closes.read().await
    }

    async fn take_error(&self, operation: MockOperation) -> Option<ConnectorError> {
        self.next_errors.write().await.remove(&operation)
    }
}

#[async_trait]
impl SiteConnector for MockConnector {
    fn name(&self) -> &str {
        "mock"
    }

    async fn login(&self, _credentials: &Credentials) -> Result<(), ConnectorError> {
        if let Some(err) = self.take_error(MockOperation::Login).await {
            return Err(err);
        }
        *self.logins.write().await += 1;
        Ok(())
    }

    async fn search(&self, query: &str) -> Result<Vec<RawResult>, ConnectorError> {
        self.searches.write().await.push(query.to_string());

        let delay = *self.search_delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = self.take_error(MockOperation::Search).await {
            return Err(err);
        }

        if let Some(results) = self.query_results.read().await.get(query) {
            return Ok(results.clone());
        }
        Ok(self.results.read().await.clone())
    }

    async fn open_detail(&self, link: &str) -> Result<(), ConnectorError> {
        if let Some(err) = self.take_error(MockOperation::OpenDetail).await {
            *self.current_detail.write().await = None;
            return Err(err);
        }
        self.opened.write().await.push(link.to_string());
        *self.current_detail.write().await = Some(link.to_string());
        Ok(())
    }

    async fn find_torrent_link(&self) -> Result<Option<String>, ConnectorError> {
        if let Some(err) = self.take_error(MockOperation::FindTorrentLink).await {
            return Err(err);
        }
        let current = self.current_detail.read().await.clone();
        let link = current.ok_or(ConnectorError::NoDetailPage)?;
        if self.without_torrent.read().await.contains(&link) {
            return Ok(None);
        }
        Ok(Some(format!("{}/attachment.torrent", link)))
    }

    async fn trigger_download(&self, url: &str) -> Result<PathBuf, ConnectorError> {
        if let Some(err) = self.take_error(MockOperation::Download).await {
            return Err(err);
        }
        let mut downloads = self.downloads.write().await;
        downloads.push(url.to_string());
        Ok(PathBuf::from(format!("/mock/downloads/{}.torrent", downloads.len())))
    }

    async fn close(&self) {
        *self.current_detail.write().await = None;
        *self.closes.write().await += 1;
    }
}
