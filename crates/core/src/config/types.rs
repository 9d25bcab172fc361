use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::selection::MediaMode;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub site: SiteConfig,
    #[serde(default)]
    pub resources: ResourcesConfig,
    #[serde(default)]
    pub notification: NotificationConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub run: RunConfig,
}

/// Forum site credentials and entry points
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SiteConfig {
    #[serde(default)]
    pub login_username: String,
    #[serde(default)]
    pub login_password: String,
    #[serde(default)]
    pub movie_login_url: String,
    #[serde(default)]
    pub tv_login_url: String,
    #[serde(default)]
    pub movie_search_url: String,
    #[serde(default)]
    pub tv_search_url: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_site_timeout")]
    pub timeout_secs: u32,
    /// Directory torrent files are written to
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

fn default_site_timeout() -> u32 {
    30
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("/Torrent")
}

/// Resolution and filtering preferences
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ResourcesConfig {
    #[serde(default)]
    pub preferred_resolution: String,
    #[serde(default)]
    pub fallback_resolution: String,
    /// Comma-separated list, e.g. "特效,dolby vision"
    #[serde(default)]
    pub exclude_keywords: String,
}

impl ResourcesConfig {
    /// Exclusion keywords, trimmed and lower-cased, blanks dropped.
    pub fn exclude_keyword_list(&self) -> Vec<String> {
        self.exclude_keywords
            .split(',')
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect()
    }
}

/// Push notification configuration (Bark-compatible endpoint)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub notification_api_key: String,
    #[serde(default = "default_notification_endpoint")]
    pub endpoint: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            notification_api_key: String::new(),
            endpoint: default_notification_endpoint(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_notification_endpoint() -> String {
    "https://api.day.app".to_string()
}

/// Media library database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub db_path: PathBuf,
}

/// Download ledger locations
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LedgerConfig {
    #[serde(default = "default_movie_records")]
    pub movie_records_path: PathBuf,
    #[serde(default = "default_tv_records")]
    pub tv_records_path: PathBuf,
}

impl LedgerConfig {
    /// Records file for `mode`.
    pub fn records_path(&self, mode: MediaMode) -> &Path {
        match mode {
            MediaMode::Movie => &self.movie_records_path,
            MediaMode::Tv => &self.tv_records_path,
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            movie_records_path: default_movie_records(),
            tv_records_path: default_tv_records(),
        }
    }
}

fn default_movie_records() -> PathBuf {
    PathBuf::from("movie_download_records.json")
}

fn default_tv_records() -> PathBuf {
    PathBuf::from("tvshow_download_records.json")
}

/// Run supervision
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunConfig {
    /// Upper bound for one wanted item, continuation hop included
    #[serde(default = "default_item_timeout")]
    pub item_timeout_secs: u64,
    /// Upper bound for a whole run
    #[serde(default = "default_run_timeout")]
    pub run_timeout_secs: u64,
    /// Prometheus text file written at the end of a run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_path: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            item_timeout_secs: default_item_timeout(),
            run_timeout_secs: default_run_timeout(),
            metrics_path: None,
        }
    }
}

fn default_item_timeout() -> u64 {
    300
}

fn default_run_timeout() -> u64 {
    3600
}

/// Sanitized config for display (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub site: SanitizedSiteConfig,
    pub resources: ResourcesConfig,
    pub notification: SanitizedNotificationConfig,
    pub database: DatabaseConfig,
    pub ledger: LedgerConfig,
    pub run: RunConfig,
}

/// Site config with the password hidden
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedSiteConfig {
    pub login_username: String,
    pub login_password_configured: bool,
    pub movie_login_url: String,
    pub tv_login_url: String,
    pub movie_search_url: String,
    pub tv_search_url: String,
    pub timeout_secs: u32,
    pub download_dir: PathBuf,
}

/// Notification config with the API key hidden
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedNotificationConfig {
    pub enabled: bool,
    pub api_key_configured: bool,
    pub endpoint: String,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            site: SanitizedSiteConfig {
                login_username: config.site.login_username.clone(),
                login_password_configured: !config.site.login_password.is_empty(),
                movie_login_url: config.site.movie_login_url.clone(),
                tv_login_url: config.site.tv_login_url.clone(),
                movie_search_url: config.site.movie_search_url.clone(),
                tv_search_url: config.site.tv_search_url.clone(),
                timeout_secs: config.site.timeout_secs,
                download_dir: config.site.download_dir.clone(),
            },
            resources: config.resources.clone(),
            notification: SanitizedNotificationConfig {
                enabled: config.notification.enabled,
                api_key_configured: !config.notification.notification_api_key.is_empty(),
                endpoint: config.notification.endpoint.clone(),
            },
            database: config.database.clone(),
            ledger: config.ledger.clone(),
            run: config.run.clone(),
        }
    }
}
