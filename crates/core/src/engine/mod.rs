//! Selection & continuation engine.
//!
//! `SelectionEngine` resolves one wanted item at a time: it walks the
//! resolution ladder, classifies search results, picks a winner (full set
//! before single episodes), downloads it, records it in the ledger and, for
//! TV, makes one follow-up search for the next episode.
//!
//! `run_session` wraps a whole run: login, per-item timeouts, an overall
//! deadline, and session teardown on every exit path.

mod runner;
mod session;
mod types;

pub use runner::SelectionEngine;
pub use session::{run_session, RunLimits, SessionError};
pub use types::*;
