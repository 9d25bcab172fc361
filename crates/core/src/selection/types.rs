//! Types shared by the selection components and the engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which half of the library a run works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaMode {
    Movie,
    Tv,
}

impl fmt::Display for MediaMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaMode::Movie => write!(f, "movie"),
            MediaMode::Tv => write!(f, "tv"),
        }
    }
}

/// Kind of a wanted item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MediaKind {
    /// A movie, matched by its release year.
    Movie { year: String },
    /// A TV series with missing episodes.
    TvEpisode,
}

/// One title the library wants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WantedItem {
    pub series_title: String,
    /// Lowest missing episode; `None` for movies or when unknown.
    pub first_missing_episode: Option<u32>,
    pub kind: MediaKind,
}

impl WantedItem {
    /// Create a wanted movie.
    pub fn movie(title: impl Into<String>, year: impl Into<String>) -> Self {
        Self {
            series_title: title.into(),
            first_missing_episode: None,
            kind: MediaKind::Movie { year: year.into() },
        }
    }

    /// Create a wanted TV series.
    pub fn tv(title: impl Into<String>, first_missing_episode: Option<u32>) -> Self {
        Self {
            series_title: title.into(),
            first_missing_episode,
            kind: MediaKind::TvEpisode,
        }
    }

    pub fn mode(&self) -> MediaMode {
        match self.kind {
            MediaKind::Movie { .. } => MediaMode::Movie,
            MediaKind::TvEpisode => MediaMode::Tv,
        }
    }

    /// Release year for movies.
    pub fn year(&self) -> Option<&str> {
        match &self.kind {
            MediaKind::Movie { year } => Some(year),
            MediaKind::TvEpisode => None,
        }
    }

    /// Episode the search starts at. Series without missing-episode data
    /// start at the first episode.
    pub fn start_episode(&self) -> u32 {
        self.first_missing_episode.unwrap_or(1)
    }
}

/// One entry from a search result page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawResult {
    /// Anchor text as shown on the page.
    pub display_text: String,
    /// Absolute link to the detail page.
    pub link: String,
}

impl RawResult {
    pub fn new(display_text: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            display_text: display_text.into(),
            link: link.into(),
        }
    }
}

/// Inclusive episode range parsed from a result title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeRange {
    pub start: u32,
    pub end: u32,
}

impl EpisodeRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Episode right after this range.
    pub fn next_episode(&self) -> u32 {
        self.end + 1
    }
}

/// A search result after classification.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub raw: RawResult,
    /// Lower-cased display text; this is what ledger keys are built from.
    pub normalized_text: String,
    /// Resolution rung the candidate was evaluated against.
    pub resolution_matched: String,
    pub verdict: super::Verdict,
    /// Episode range extracted from the text, if any.
    pub episode_range: Option<EpisodeRange>,
}

impl Candidate {
    pub fn is_full_set(&self) -> bool {
        matches!(self.verdict, super::Verdict::FullSet)
    }

    pub fn excluded(&self) -> bool {
        matches!(self.verdict, super::Verdict::Excluded)
    }

    pub fn is_episode_match(&self) -> bool {
        matches!(self.verdict, super::Verdict::EpisodeMatch(_))
    }

    pub fn is_movie_match(&self) -> bool {
        matches!(self.verdict, super::Verdict::MovieMatch)
    }
}
