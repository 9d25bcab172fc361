//! Testing utilities and mock collaborators.
//!
//! This module provides mock implementations of the external capability
//! traits (site, notifier, library) so the engine can be driven end to end
//! without a forum, a push service or a media database.
//!
//! # Example
//!
//! ```rust,ignore
//! use mediagrab_core::testing::{fixtures, MockConnector, MockNotifier};
//!
//! let connector = MockConnector::new();
//! connector.set_results(vec![fixtures::result("Foo [第5-6集] 1080p", 1)]).await;
//!
//! let notifier = MockNotifier::new();
//! // Build a SelectionEngine around them...
//! ```

mod mock_connector;
mod mock_library;
mod mock_notifier;

pub use mock_connector::{MockConnector, MockOperation};
pub use mock_library::MockLibrary;
pub use mock_notifier::{MockNotifier, RecordedNotification};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::Path;
    use std::sync::Arc;

    use crate::engine::{EngineConfig, SelectionEngine};
    use crate::ledger::JsonLedger;
    use crate::selection::{MediaMode, RawResult};

    use super::{MockConnector, MockNotifier};

    /// A search result with a link derived from `id`.
    pub fn result(text: &str, id: u32) -> RawResult {
        RawResult::new(text, format!("https://forum.example/thread-{}-1-1.html", id))
    }

    /// Link that `result(_, id)` produces.
    pub fn link(id: u32) -> String {
        format!("https://forum.example/thread-{}-1-1.html", id)
    }

    /// Engine settings: 1080p preferred, 720p fallback, "特效" excluded.
    pub fn engine_config(mode: MediaMode) -> EngineConfig {
        EngineConfig {
            mode,
            preferred_resolution: "1080p".to_string(),
            fallback_resolution: "720p".to_string(),
            exclude_keywords: vec!["特效".to_string()],
        }
    }

    /// Everything a test needs around one engine.
    pub struct Harness {
        pub engine: SelectionEngine,
        pub connector: Arc<MockConnector>,
        pub notifier: Arc<MockNotifier>,
        pub ledger: Arc<JsonLedger>,
    }

    /// Build an engine over mocks with the JSON ledger at `ledger_path`
    /// loaded from disk.
    pub fn harness(config: EngineConfig, ledger_path: &Path) -> Harness {
        let connector = Arc::new(MockConnector::new());
        let notifier = Arc::new(MockNotifier::new());
        let (ledger, _) = JsonLedger::open(ledger_path);
        let ledger = Arc::new(ledger);
        let engine = SelectionEngine::new(
            config,
            connector.clone(),
            ledger.clone(),
            notifier.clone(),
        );
        Harness {
            engine,
            connector,
            notifier,
            ledger,
        }
    }
}
