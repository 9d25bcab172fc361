//! Result selection primitives.
//!
//! Everything here is pure: the ladder orders resolutions, the filter
//! classifies one search result, and the episode helpers parse and format
//! episode numbers. The engine composes them into the per-item policy.

mod episode;
mod filter;
mod ladder;
mod types;

pub use episode::{extract_episode_range, format_episode};
pub use filter::{CandidateFilter, EpisodeMarker, Verdict, FULL_SET_MARKER};
pub use ladder::ResolutionLadder;
pub use types::*;
