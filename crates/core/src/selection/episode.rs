//! Episode number extraction and formatting.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use tracing::debug;

use super::EpisodeRange;

/// Optional `第`, 1-2 digits, optional `-NN`, optional `集`.
///
/// The pattern is unanchored: the first hit anywhere in the text wins, even
/// when it is part of another token such as `1080p`.
static EPISODE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:第)?(\d{1,2})(?:-(\d{1,2}))?(?:集)?").unwrap());

/// Extract the first episode number or range from free-form result text.
pub fn extract_episode_range(text: &str) -> Option<EpisodeRange> {
    let Some(captures) = EPISODE_PATTERN.captures(text) else {
        debug!(text, "No episode number in title");
        return None;
    };

    let start: u32 = captures.get(1)?.as_str().parse().ok()?;
    let end = match captures.get(2) {
        Some(m) => m.as_str().parse().ok()?,
        None => start,
    };

    Some(EpisodeRange::new(start, end))
}

/// Render an episode number the way the site writes it: one leading zero
/// below 10, verbatim otherwise.
pub fn format_episode(episode: u32) -> String {
    if episode < 10 {
        format!("0{}", episode)
    } else {
        episode.to_string()
    }
}
