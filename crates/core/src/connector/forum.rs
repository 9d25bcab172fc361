//! Forum (Discuz-style) site connector.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{header, Client, Response, Url};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::parser::{
    filename_from_disposition, find_torrent_anchor, is_detail_page, is_logged_in,
    parse_login_form, parse_search_form, parse_search_results, FormMethod, FormSpec,
};
use super::{ConnectorError, Credentials, SiteConnector};
use crate::config::SiteConfig;
use crate::metrics::{observe_site_request, SEARCH_RESULTS};
use crate::selection::{MediaMode, RawResult};

const MAX_NAME_ATTEMPTS: u32 = 1000;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Connection settings for one forum section (movie or TV).
#[derive(Debug, Clone)]
pub struct ForumConnectorConfig {
    pub login_url: String,
    pub search_url: String,
    pub timeout_secs: u32,
    /// Where downloaded torrent files are written.
    pub download_dir: PathBuf,
    pub user_agent: Option<String>,
}

impl ForumConnectorConfig {
    /// Settings for the `mode` section of the site.
    pub fn for_mode(site: &SiteConfig, mode: MediaMode) -> Self {
        let (login_url, search_url) = match mode {
            MediaMode::Movie => (&site.movie_login_url, &site.movie_search_url),
            MediaMode::Tv => (&site.tv_login_url, &site.tv_search_url),
        };
        Self {
            login_url: login_url.clone(),
            search_url: search_url.clone(),
            timeout_secs: site.timeout_secs,
            download_dir: site.download_dir.clone(),
            user_agent: site.user_agent.clone(),
        }
    }
}

/// A fetched page.
#[derive(Debug, Clone)]
struct Page {
    url: Url,
    html: String,
}

/// HTTP forum connector.
///
/// The cookie jar of the underlying client is the session; the detail page
/// most recently opened is kept for `find_torrent_link`.
pub struct ForumConnector {
    client: Client,
    config: ForumConnectorConfig,
    detail_page: RwLock<Option<Page>>,
}

impl ForumConnector {
    /// Create a new forum connector.
    pub fn new(config: ForumConnectorConfig) -> Result<Self, ConnectorError> {
        let user_agent = config
            .user_agent
            .clone()
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .cookie_store(true)
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            client,
            config,
            detail_page: RwLock::new(None),
        })
    }

    fn parse_url(value: &str) -> Result<Url, ConnectorError> {
        Url::parse(value).map_err(|e| ConnectorError::Request(format!("invalid URL {}: {}", value, e)))
    }

    fn check_status(response: Response) -> Result<Response, ConnectorError> {
        let status = response.status();
        if !status.is_success() {
            return Err(ConnectorError::HttpStatus {
                status: status.as_u16(),
                url: response.url().to_string(),
            });
        }
        Ok(response)
    }

    /// GET a page and return it with its final (post-redirect) URL.
    async fn fetch_page(&self, url: &str, operation: &str) -> Result<Page, ConnectorError> {
        let start = Instant::now();
        let result: Result<Page, ConnectorError> = async {
            let response = self.client.get(Self::parse_url(url)?).send().await?;
            let response = Self::check_status(response)?;
            let url = response.url().clone();
            let html = response.text().await?;
            Ok(Page { url, html })
        }
        .await;
        observe_site_request(operation, start.elapsed(), result.is_ok());
        result
    }

    async fn submit_form(&self, form: &FormSpec, operation: &str) -> Result<Page, ConnectorError> {
        let start = Instant::now();
        let result: Result<Page, ConnectorError> = async {
            let request = match form.method {
                FormMethod::Get => self.client.get(form.action.clone()).query(&form.fields),
                FormMethod::Post => self.client.post(form.action.clone()).form(&form.fields),
            };
            let response = Self::check_status(request.send().await?)?;
            let url = response.url().clone();
            let html = response.text().await?;
            Ok(Page { url, html })
        }
        .await;
        observe_site_request(operation, start.elapsed(), result.is_ok());
        result
    }

    /// File name for a downloaded torrent.
    fn download_file_name(response: &Response) -> String {
        let from_header = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_disposition);

        let from_path = || {
            response
                .url()
                .path_segments()
                .and_then(|segments| segments.last())
                .filter(|segment| segment.ends_with(".torrent"))
                .map(|segment| {
                    urlencoding::decode(segment)
                        .map(|s| s.into_owned())
                        .unwrap_or_else(|_| segment.to_string())
                })
        };

        let name = from_header
            .or_else(from_path)
            .unwrap_or_else(|| format!("download-{}.torrent", Utc::now().format("%Y%m%d%H%M%S")));

        sanitize_file_name(&name)
    }

    async fn write_download(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, ConnectorError> {
        let dir: &Path = &self.config.download_dir;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| ConnectorError::Io(format!("{}: {}", dir.display(), e)))?;

        // Existing files are never overwritten; the name gets a " (n)" suffix.
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let path = dir.join(numbered_file_name(name, attempt));
            let mut file = match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(ConnectorError::Io(format!("{}: {}", path.display(), e)));
                }
            };
            file.write_all(bytes)
                .await
                .map_err(|e| ConnectorError::Io(format!("{}: {}", path.display(), e)))?;
            file.flush()
                .await
                .map_err(|e| ConnectorError::Io(format!("{}: {}", path.display(), e)))?;
            if attempt > 0 {
                debug!(original = name, path = %path.display(), "Name taken, saved under a numbered name");
            }
            return Ok(path);
        }

        Err(ConnectorError::Io(format!(
            "{}: no free file name for {}",
            dir.display(),
            name
        )))
    }
}

/// `name` for the first attempt, then `stem (n).ext`.
fn numbered_file_name(name: &str, attempt: u32) -> String {
    if attempt == 0 {
        return name.to_string();
    }
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{} ({}).{}", stem, attempt, ext),
        _ => format!("{} ({})", name, attempt),
    }
}

#[async_trait]
impl SiteConnector for ForumConnector {
    fn name(&self) -> &str {
        "forum"
    }

    async fn login(&self, credentials: &Credentials) -> Result<(), ConnectorError> {
        let page = self.fetch_page(&self.config.login_url, "login_page").await?;

        // Already authenticated through an existing cookie.
        if is_logged_in(&page.html) {
            info!("Session already authenticated");
            return Ok(());
        }

        let mut form = parse_login_form(&page.html, &page.url)?;
        form.set("username", &credentials.username);
        form.set("password", &credentials.password);
        debug!(action = %form.action, "Submitting login form");

        let result = self.submit_form(&form, "login").await?;
        if is_logged_in(&result.html) {
            info!(username = %credentials.username, "Login succeeded");
            Ok(())
        } else {
            Err(ConnectorError::LoginFailed(
                "login response did not show an authenticated session".to_string(),
            ))
        }
    }

    async fn search(&self, query: &str) -> Result<Vec<RawResult>, ConnectorError> {
        let page = self.fetch_page(&self.config.search_url, "search_page").await?;
        let (mut form, field) = parse_search_form(&page.html, &page.url)?;
        form.set(&field, query);

        debug!(query, action = %form.action, "Submitting search");
        let results_page = self.submit_form(&form, "search").await?;
        let results = parse_search_results(&results_page.html, &results_page.url);

        SEARCH_RESULTS.observe(results.len() as f64);
        info!(query, count = results.len(), "Search returned results");
        Ok(results)
    }

    async fn open_detail(&self, link: &str) -> Result<(), ConnectorError> {
        let page = self.fetch_page(link, "detail_page").await?;
        if !is_detail_page(&page.html) {
            *self.detail_page.write().await = None;
            return Err(ConnectorError::ElementNotFound(format!(
                "detail page content at {}",
                link
            )));
        }

        debug!(url = %page.url, "Opened detail page");
        *self.detail_page.write().await = Some(page);
        Ok(())
    }

    async fn find_torrent_link(&self) -> Result<Option<String>, ConnectorError> {
        let page = self.detail_page.read().await;
        let page = page.as_ref().ok_or(ConnectorError::NoDetailPage)?;
        Ok(find_torrent_anchor(&page.html, &page.url))
    }

    async fn trigger_download(&self, url: &str) -> Result<PathBuf, ConnectorError> {
        let start = Instant::now();
        let result: Result<PathBuf, ConnectorError> = async {
            let response = self.client.get(Self::parse_url(url)?).send().await?;
            let response = Self::check_status(response)?;
            let name = Self::download_file_name(&response);
            let bytes = response.bytes().await?;
            if bytes.is_empty() {
                return Err(ConnectorError::Io(format!("empty download from {}", url)));
            }
            self.write_download(&name, &bytes).await
        }
        .await;
        observe_site_request("download", start.elapsed(), result.is_ok());

        let path = result?;
        info!(path = %path.display(), "Torrent file saved");
        Ok(path)
    }

    async fn close(&self) {
        if self.detail_page.write().await.take().is_some() {
            debug!("Dropped open detail page");
        }
        info!("Site session closed");
    }
}

/// Replace path separators and control characters.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        warn!(original = name, "Download file name unusable, using fallback");
        format!("download-{}.torrent", Utc::now().format("%Y%m%d%H%M%S"))
    } else {
        cleaned
    }
}
