//! Search result classification.

use serde::Serialize;

use super::{extract_episode_range, format_episode, Candidate, MediaKind, RawResult, WantedItem};

/// Marker the site puts in the title of a complete-season bundle.
pub const FULL_SET_MARKER: char = '全';

/// Which episode marker matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeMarker {
    /// `[第NN集]`
    Exact,
    /// `[第NN-`
    Range,
}

/// Outcome of classifying one result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Contains an exclusion keyword. Never selectable.
    Excluded,
    /// Complete-season bundle at the target resolution.
    FullSet,
    /// Release starting at the target episode. The marker kind is kept for
    /// logging only; exact and range markers rank equally.
    EpisodeMatch(EpisodeMarker),
    /// Movie at the target resolution and year.
    MovieMatch,
    NoMatch,
}

impl Verdict {
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Excluded => "excluded",
            Verdict::FullSet => "full_set",
            Verdict::EpisodeMatch(_) => "episode",
            Verdict::MovieMatch => "movie",
            Verdict::NoMatch => "no_match",
        }
    }
}

/// Classifies raw results against the operator's preferences.
#[derive(Debug, Clone, Default)]
pub struct CandidateFilter {
    /// Lower-cased, non-blank.
    exclude_keywords: Vec<String>,
}

impl CandidateFilter {
    pub fn new<I, S>(exclude_keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let exclude_keywords = exclude_keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { exclude_keywords }
    }

    pub fn exclude_keywords(&self) -> &[String] {
        &self.exclude_keywords
    }

    /// Classify `raw` for `item` at `resolution`.
    ///
    /// TV items are matched against their first missing episode and may come
    /// back as a full set.
    pub fn evaluate(&self, raw: &RawResult, resolution: &str, item: &WantedItem) -> Candidate {
        match &item.kind {
            MediaKind::Movie { year } => self.build(raw, resolution, |text, res_ok| {
                if res_ok && text.contains(year.as_str()) {
                    Verdict::MovieMatch
                } else {
                    Verdict::NoMatch
                }
            }),
            MediaKind::TvEpisode => self.evaluate_episode(raw, resolution, item.start_episode(), true),
        }
    }

    /// Classify `raw` against a specific episode number.
    ///
    /// With `allow_full_set` off, full-set bundles are not recognized; the
    /// continuation hop uses this.
    pub fn evaluate_episode(
        &self,
        raw: &RawResult,
        resolution: &str,
        episode: u32,
        allow_full_set: bool,
    ) -> Candidate {
        self.build(raw, resolution, |text, res_ok| {
            if !res_ok {
                return Verdict::NoMatch;
            }
            if allow_full_set && is_full_set(text) {
                return Verdict::FullSet;
            }
            match episode_marker(text, episode) {
                Some(marker) => Verdict::EpisodeMatch(marker),
                None => Verdict::NoMatch,
            }
        })
    }

    /// Whether lower-cased `text` carries an exclusion keyword.
    pub fn is_excluded(&self, text: &str) -> bool {
        self.exclude_keywords.iter().any(|k| text.contains(k.as_str()))
    }

    fn build<F>(&self, raw: &RawResult, resolution: &str, classify: F) -> Candidate
    where
        F: FnOnce(&str, bool) -> Verdict,
    {
        let text = raw.display_text.to_lowercase();
        let verdict = if self.is_excluded(&text) {
            Verdict::Excluded
        } else {
            let res_ok = text.contains(&resolution.to_lowercase());
            classify(&text, res_ok)
        };
        let episode_range = extract_episode_range(&text);

        Candidate {
            raw: raw.clone(),
            normalized_text: text,
            resolution_matched: resolution.to_string(),
            verdict,
            episode_range,
        }
    }
}

fn is_full_set(text: &str) -> bool {
    text.contains(FULL_SET_MARKER) && text.chars().any(|c| c.is_ascii_digit())
}

/// Look for `[第NN集]` / `[第NN-` with the site's zero-padded number, then
/// with the bare number for single-digit episodes.
fn episode_marker(text: &str, episode: u32) -> Option<EpisodeMarker> {
    let mut forms = vec![format_episode(episode)];
    let bare = episode.to_string();
    if forms[0] != bare {
        forms.push(bare);
    }

    for number in &forms {
        if text.contains(&format!("[第{}集]", number)) {
            return Some(EpisodeMarker::Exact);
        }
        if text.contains(&format!("[第{}-", number)) {
            return Some(EpisodeMarker::Range);
        }
    }
    None
}
