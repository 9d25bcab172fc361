//! Engine configuration and outcome types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Config;
use crate::selection::MediaMode;

/// Per-mode engine settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub mode: MediaMode,
    pub preferred_resolution: String,
    pub fallback_resolution: String,
    pub exclude_keywords: Vec<String>,
}

impl EngineConfig {
    pub fn from_config(config: &Config, mode: MediaMode) -> Self {
        Self {
            mode,
            preferred_resolution: config.resources.preferred_resolution.clone(),
            fallback_resolution: config.resources.fallback_resolution.clone(),
            exclude_keywords: config.resources.exclude_keyword_list(),
        }
    }
}

/// Result of the single follow-up search after a TV download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ContinuationOutcome {
    Downloaded { episode: u32, key: String, recorded: bool },
    AlreadyRecorded { episode: u32, key: String },
    NoMatch { episode: u32 },
    NoTorrentLink { episode: u32 },
    Failed { episode: u32, error: String },
}

impl ContinuationOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ContinuationOutcome::Downloaded { .. } => "downloaded",
            ContinuationOutcome::AlreadyRecorded { .. } => "already_recorded",
            ContinuationOutcome::NoMatch { .. } => "no_match",
            ContinuationOutcome::NoTorrentLink { .. } => "no_torrent",
            ContinuationOutcome::Failed { .. } => "failed",
        }
    }
}

/// Terminal state of one wanted item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ItemOutcome {
    /// A torrent was fetched. `recorded` is false when the ledger write
    /// failed after the download.
    Downloaded {
        key: String,
        resolution: String,
        recorded: bool,
        /// `None` for movies and for titles without an episode number.
        continuation: Option<ContinuationOutcome>,
    },
    /// The selected result is already in the ledger.
    AlreadyRecorded { key: String },
    /// The pre-search ledger check matched; nothing was searched.
    Skipped { key: String },
    /// A result was selected but its detail page had no torrent link.
    NoTorrentLink { resolution: String, title: String },
    /// Every ladder rung came up empty.
    Exhausted,
    /// A site error aborted the item.
    Failed { error: String },
    /// The item ran past its time budget.
    TimedOut,
}

impl ItemOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ItemOutcome::Downloaded { .. } => "downloaded",
            ItemOutcome::AlreadyRecorded { .. } => "already_recorded",
            ItemOutcome::Skipped { .. } => "skipped",
            ItemOutcome::NoTorrentLink { .. } => "no_torrent",
            ItemOutcome::Exhausted => "exhausted",
            ItemOutcome::Failed { .. } => "failed",
            ItemOutcome::TimedOut => "timed_out",
        }
    }
}

/// Tally of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub mode: MediaMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub items: usize,
    pub downloaded: usize,
    pub continuation_downloads: usize,
    pub already_recorded: usize,
    pub skipped: usize,
    pub no_torrent: usize,
    pub exhausted: usize,
    pub failed: usize,
    pub timed_out: usize,
    /// Items never started because the run deadline passed.
    pub not_started: usize,
    /// Ledger keys written during the run, in order.
    pub recorded_keys: Vec<String>,
}

impl RunSummary {
    pub fn new(mode: MediaMode) -> Self {
        Self {
            mode,
            started_at: Utc::now(),
            finished_at: None,
            items: 0,
            downloaded: 0,
            continuation_downloads: 0,
            already_recorded: 0,
            skipped: 0,
            no_torrent: 0,
            exhausted: 0,
            failed: 0,
            timed_out: 0,
            not_started: 0,
            recorded_keys: Vec::new(),
        }
    }

    pub fn record(&mut self, outcome: &ItemOutcome) {
        self.items += 1;
        match outcome {
            ItemOutcome::Downloaded {
                key,
                recorded,
                continuation,
                ..
            } => {
                self.downloaded += 1;
                if *recorded {
                    self.recorded_keys.push(key.clone());
                }
                if let Some(ContinuationOutcome::Downloaded { key, recorded, .. }) = continuation {
                    self.continuation_downloads += 1;
                    if *recorded {
                        self.recorded_keys.push(key.clone());
                    }
                }
            }
            ItemOutcome::AlreadyRecorded { .. } => self.already_recorded += 1,
            ItemOutcome::Skipped { .. } => self.skipped += 1,
            ItemOutcome::NoTorrentLink { .. } => self.no_torrent += 1,
            ItemOutcome::Exhausted => self.exhausted += 1,
            ItemOutcome::Failed { .. } => self.failed += 1,
            ItemOutcome::TimedOut => self.timed_out += 1,
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Total torrents fetched, continuation hops included.
    pub fn total_downloads(&self) -> usize {
        self.downloaded + self.continuation_downloads
    }
}
