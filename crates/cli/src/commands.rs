//! Subcommand implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{info, warn};

use mediagrab_core::{
    load_config, metrics, run_session, validate_config, validate_for_mode, BarkNotifier, Config,
    ConnectorError, Credentials, DownloadLedger, EngineConfig, ForumConnector,
    ForumConnectorConfig, JsonLedger, LibrarySource, MediaMode, NoopNotifier, Notifier, RawResult,
    RunLimits, SanitizedConfig, SelectionEngine, SiteConnector, SqliteLibrary,
};

/// Load and validate the configuration.
pub fn load(path: &Path) -> Result<Config> {
    info!("Loading configuration from {:?}", path);
    let config =
        load_config(path).with_context(|| format!("Failed to load config from {:?}", path))?;
    validate_config(&config).context("Configuration validation failed")?;
    Ok(config)
}

fn credentials(config: &Config) -> Credentials {
    Credentials {
        username: config.site.login_username.clone(),
        password: config.site.login_password.clone(),
    }
}

fn notifier(config: &Config) -> Result<Arc<dyn Notifier>> {
    if !config.notification.enabled {
        info!("Notifications disabled");
        return Ok(Arc::new(NoopNotifier));
    }
    let notifier =
        BarkNotifier::new(&config.notification).context("Failed to create notifier")?;
    Ok(Arc::new(notifier))
}

/// Build an engine for `mode` around a fresh site session.
fn engine(
    config: &Config,
    mode: MediaMode,
    ledger: Arc<dyn DownloadLedger>,
    notifier: Arc<dyn Notifier>,
) -> Result<SelectionEngine> {
    validate_for_mode(config, mode)
        .with_context(|| format!("Configuration incomplete for {} mode", mode))?;
    let connector: Arc<dyn SiteConnector> = Arc::new(
        ForumConnector::new(ForumConnectorConfig::for_mode(&config.site, mode))
            .context("Failed to create site connector")?,
    );
    Ok(SelectionEngine::new(
        EngineConfig::from_config(config, mode),
        connector,
        ledger,
        notifier,
    ))
}

/// Process every wanted item of `mode`.
pub async fn grab(config: &Config, mode: MediaMode) -> Result<()> {
    let library = SqliteLibrary::open(&config.database.db_path)
        .with_context(|| format!("Failed to open library at {:?}", config.database.db_path))?;
    let items = library
        .wanted(mode)
        .context("Failed to read wanted items")?;
    info!(%mode, count = items.len(), "Wanted items loaded");
    if items.is_empty() {
        info!("Nothing to do");
        return Ok(());
    }

    let records_path = config.ledger.records_path(mode);
    let (ledger, load_error) = JsonLedger::open(records_path);
    if let Some(e) = load_error {
        warn!(error = %e, "Could not read download records, starting empty");
        metrics::LEDGER_ERRORS.with_label_values(&["load"]).inc();
    }
    info!(path = %records_path.display(), records = ledger.entries().len(), "Download records loaded");

    let engine = engine(config, mode, Arc::new(ledger), notifier(config)?)?;
    let limits = RunLimits::from_secs(config.run.item_timeout_secs, config.run.run_timeout_secs);
    let credentials = credentials(config);

    let result = tokio::select! {
        result = run_session(&engine, &credentials, &items, limits) => Some(result),
        _ = shutdown_signal() => None,
    };

    let outcome = match result {
        Some(Ok(summary)) => {
            let summary_json = serde_json::to_string(&summary).unwrap_or_default();
            info!(summary = %summary_json, "Run summary");
            Ok(())
        }
        Some(Err(e)) => Err(e).context("Run aborted"),
        None => {
            warn!("Interrupted, closing site session");
            engine.connector().close().await;
            Ok(())
        }
    };

    write_metrics(config);
    outcome
}

/// List search results that carry a configured resolution.
pub async fn search(
    config: &Config,
    mode: MediaMode,
    keyword: &str,
    year: Option<&str>,
) -> Result<()> {
    let ledger = Arc::new(JsonLedger::new(config.ledger.records_path(mode)));
    let engine = engine(config, mode, ledger, Arc::new(NoopNotifier))?;

    let result: Result<Vec<RawResult>, ConnectorError> = async {
        engine.connector().login(&credentials(config)).await?;
        engine.browse(keyword, year).await
    }
    .await;
    engine.connector().close().await;

    let results = result.context("Search failed")?;
    if results.is_empty() {
        println!("No results in the configured resolutions");
    }
    for raw in results {
        println!("{}\t{}", raw.display_text, raw.link);
    }
    Ok(())
}

/// Download the torrent behind one detail link.
pub async fn fetch(config: &Config, mode: MediaMode, link: &str) -> Result<()> {
    let ledger = Arc::new(JsonLedger::new(config.ledger.records_path(mode)));
    let engine = engine(config, mode, ledger, Arc::new(NoopNotifier))?;

    let result: Result<Option<PathBuf>, ConnectorError> = async {
        engine.connector().login(&credentials(config)).await?;
        engine.fetch(link).await
    }
    .await;
    engine.connector().close().await;

    match result.context("Fetch failed")? {
        Some(path) => println!("{}", path.display()),
        None => println!("No torrent link on {}", link),
    }
    Ok(())
}

/// Print the configuration with secrets hidden.
pub fn show_config(config: &Config) -> Result<()> {
    let sanitized = SanitizedConfig::from(config);
    let rendered =
        serde_json::to_string_pretty(&sanitized).context("Failed to render configuration")?;
    println!("{}", rendered);
    Ok(())
}

fn write_metrics(config: &Config) {
    let Some(path) = &config.run.metrics_path else {
        return;
    };
    match metrics::write_textfile(path) {
        Ok(()) => info!(path = %path.display(), "Metrics written"),
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to write metrics"),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const CONFIG: &str = r#"
[site]
login_username = "user"
login_password = "secret"
tv_login_url = "https://forum.example/member.php?mod=logging&action=login"
tv_search_url = "https://forum.example/search.php?mod=forum"

[resources]
preferred_resolution = "1080p"
fallback_resolution = "720p"
exclude_keywords = "特效"

[notification]
enabled = false

[database]
db_path = "/config/library.db"
"#;

    #[test]
    fn test_load_valid_config() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(CONFIG.as_bytes()).unwrap();

        let config = load(file.path()).unwrap();
        assert_eq!(config.site.login_username, "user");
        assert!(validate_for_mode(&config, MediaMode::Tv).is_ok());
        assert!(validate_for_mode(&config, MediaMode::Movie).is_err());
    }

    #[test]
    fn test_load_missing_file_fails() {
        let result = load(Path::new("/nonexistent/mediagrab.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_disabled_notifications_use_noop() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(CONFIG.as_bytes()).unwrap();
        let config = load(file.path()).unwrap();

        let notifier = notifier(&config).unwrap();
        assert_eq!(notifier.name(), "noop");
    }

    #[test]
    fn test_movie_engine_requires_movie_urls() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(CONFIG.as_bytes()).unwrap();
        let config = load(file.path()).unwrap();
        let ledger = Arc::new(JsonLedger::new("/tmp/unused.json"));

        assert!(engine(&config, MediaMode::Movie, ledger.clone(), Arc::new(NoopNotifier)).is_err());
        assert!(engine(&config, MediaMode::Tv, ledger, Arc::new(NoopNotifier)).is_ok());
    }
}
