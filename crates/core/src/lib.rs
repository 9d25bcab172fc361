pub mod config;
pub mod connector;
pub mod engine;
pub mod ledger;
pub mod library;
pub mod metrics;
pub mod notifier;
pub mod selection;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, validate_for_mode, Config, ConfigError,
    SanitizedConfig,
};
pub use connector::{ConnectorError, Credentials, ForumConnector, ForumConnectorConfig, SiteConnector};
pub use engine::{
    run_session, ContinuationOutcome, EngineConfig, ItemOutcome, RunLimits, RunSummary,
    SelectionEngine, SessionError,
};
pub use ledger::{DownloadLedger, JsonLedger, LedgerError, LedgerKey};
pub use library::{LibraryError, LibrarySource, SqliteLibrary};
pub use notifier::{BarkNotifier, NoopNotifier, Notifier, NotifyError};
pub use selection::{MediaMode, RawResult, WantedItem};
