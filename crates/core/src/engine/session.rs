//! Run supervision: one site session around a list of wanted items.

use std::time::Duration;

use thiserror::Error;
use tokio::time::{timeout, Instant};
use tracing::{error, info, warn};

use super::runner::SelectionEngine;
use super::types::{ItemOutcome, RunSummary};
use crate::connector::{ConnectorError, Credentials};
use crate::selection::WantedItem;

/// Time limits for one run.
#[derive(Debug, Clone, Copy)]
pub struct RunLimits {
    /// Budget for one item, continuation hop included.
    pub item_timeout: Duration,
    /// Budget for the whole run, login included.
    pub run_timeout: Duration,
}

impl RunLimits {
    pub fn from_secs(item_timeout_secs: u64, run_timeout_secs: u64) -> Self {
        Self {
            item_timeout: Duration::from_secs(item_timeout_secs),
            run_timeout: Duration::from_secs(run_timeout_secs),
        }
    }
}

/// Errors that end a run before any item is processed.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Login failed: {0}")]
    Login(#[from] ConnectorError),

    #[error("Login timed out after {0:?}")]
    LoginTimeout(Duration),
}

/// Log in, process every item in order, then close the session.
///
/// Items run strictly one after another. An item that overruns its budget is
/// cancelled and counted as timed out; once the run deadline passes the
/// remaining items are not started. The connector is closed on every path.
pub async fn run_session(
    engine: &SelectionEngine,
    credentials: &Credentials,
    items: &[WantedItem],
    limits: RunLimits,
) -> Result<RunSummary, SessionError> {
    let result = supervise(engine, credentials, items, limits).await;
    engine.connector().close().await;
    result
}

async fn supervise(
    engine: &SelectionEngine,
    credentials: &Credentials,
    items: &[WantedItem],
    limits: RunLimits,
) -> Result<RunSummary, SessionError> {
    let deadline = Instant::now() + limits.run_timeout;
    let mode = engine.mode();
    let connector = engine.connector();

    info!(connector = connector.name(), %mode, items = items.len(), "Starting run");

    match timeout(limits.run_timeout, connector.login(credentials)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            error!(error = %e, "Login failed");
            return Err(SessionError::Login(e));
        }
        Err(_) => return Err(SessionError::LoginTimeout(limits.run_timeout)),
    }

    let mut summary = RunSummary::new(mode);
    for (index, item) in items.iter().enumerate() {
        let now = Instant::now();
        if now >= deadline {
            summary.not_started = items.len() - index;
            warn!(remaining = summary.not_started, "Run deadline reached, stopping");
            break;
        }

        let budget = limits.item_timeout.min(deadline - now);
        let outcome = match timeout(budget, engine.process_item(item)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(series = %item.series_title, ?budget, "Item timed out");
                ItemOutcome::TimedOut
            }
        };
        info!(series = %item.series_title, outcome = outcome.label(), "Item finished");
        summary.record(&outcome);
    }

    summary.finish();
    info!(
        %mode,
        items = summary.items,
        downloads = summary.total_downloads(),
        exhausted = summary.exhausted,
        failed = summary.failed,
        timed_out = summary.timed_out,
        "Run finished"
    );
    Ok(summary)
}
