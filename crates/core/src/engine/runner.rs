//! Per-item selection and continuation.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use super::types::{ContinuationOutcome, EngineConfig, ItemOutcome};
use crate::connector::{ConnectorError, SiteConnector};
use crate::ledger::{DownloadLedger, LedgerKey};
use crate::metrics::{
    CANDIDATES, CONTINUATION_HOPS, DOWNLOADS, ITEM_DURATION, LEDGER_ERRORS, NOTIFICATIONS,
    SEARCHES,
};
use crate::notifier::{Notifier, DOWNLOAD_NOTIFICATION_TITLE};
use crate::selection::{
    format_episode, Candidate, CandidateFilter, MediaKind, MediaMode, RawResult,
    ResolutionLadder, WantedItem,
};

/// What happened after a winner was chosen.
enum Acquisition {
    Downloaded { recorded: bool },
    AlreadyRecorded,
    NoTorrentLink,
}

/// Turns wanted items into downloads.
///
/// One engine serves one mode. It owns no session state of its own; the
/// connector carries the site session and the ledger carries what has been
/// fetched so far.
pub struct SelectionEngine {
    config: EngineConfig,
    filter: CandidateFilter,
    connector: Arc<dyn SiteConnector>,
    ledger: Arc<dyn DownloadLedger>,
    notifier: Arc<dyn Notifier>,
}

impl SelectionEngine {
    pub fn new(
        config: EngineConfig,
        connector: Arc<dyn SiteConnector>,
        ledger: Arc<dyn DownloadLedger>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let filter = CandidateFilter::new(config.exclude_keywords.iter());
        Self {
            config,
            filter,
            connector,
            ledger,
            notifier,
        }
    }

    pub fn mode(&self) -> MediaMode {
        self.config.mode
    }

    pub fn connector(&self) -> &Arc<dyn SiteConnector> {
        &self.connector
    }

    fn ladder(&self) -> ResolutionLadder {
        ResolutionLadder::new(
            &self.config.preferred_resolution,
            &self.config.fallback_resolution,
        )
    }

    /// Resolve one wanted item, continuation hop included.
    ///
    /// Never returns an error: site failures end up as `ItemOutcome::Failed`.
    pub async fn process_item(&self, item: &WantedItem) -> ItemOutcome {
        let start = Instant::now();
        let mode = item.mode().to_string();

        let result = match &item.kind {
            MediaKind::Movie { year } => self.process_movie(item, year).await,
            MediaKind::TvEpisode => self.process_tv(item).await,
        };

        ITEM_DURATION
            .with_label_values(&[mode.as_str()])
            .observe(start.elapsed().as_secs_f64());

        match result {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(series = %item.series_title, error = %e, "Item aborted");
                DOWNLOADS.with_label_values(&[mode.as_str(), "failed"]).inc();
                ItemOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    async fn process_tv(&self, item: &WantedItem) -> Result<ItemOutcome, ConnectorError> {
        let series = item.series_title.as_str();
        let episode = item.start_episode();
        info!(series, episode = %format_episode(episode), "Processing TV item");

        for resolution in self.ladder() {
            let precheck = LedgerKey::placeholder(series, &resolution);
            if self.ledger.contains(&precheck) {
                info!(series, key = %precheck, "Placeholder record present, skipping item");
                return Ok(ItemOutcome::Skipped {
                    key: precheck.to_string(),
                });
            }

            let Some(results) = self.search_rung(series, &resolution).await else {
                continue;
            };

            let candidates: Vec<Candidate> = results
                .iter()
                .map(|raw| self.filter.evaluate(raw, &resolution, item))
                .collect();
            count_verdicts(&candidates);

            // Full-set pass over the whole list before any episode pass.
            let winner = candidates
                .iter()
                .find(|c| c.is_full_set())
                .or_else(|| candidates.iter().find(|c| c.is_episode_match()));

            let Some(winner) = winner else {
                debug!(series, resolution = %resolution, "No candidate on this rung");
                SEARCHES.with_label_values(&["tv", "no_match"]).inc();
                continue;
            };
            SEARCHES.with_label_values(&["tv", "selected"]).inc();
            info!(
                series,
                resolution = %resolution,
                title = %winner.normalized_text,
                full_set = winner.is_full_set(),
                "Selected candidate"
            );

            let key = LedgerKey::new(series, &resolution, &winner.normalized_text);
            let body = format!("{} - {} - {}", series, resolution, winner.normalized_text);

            return match self.acquire(MediaMode::Tv, winner, &key, &body).await? {
                Acquisition::AlreadyRecorded => Ok(ItemOutcome::AlreadyRecorded {
                    key: key.to_string(),
                }),
                Acquisition::NoTorrentLink => Ok(ItemOutcome::NoTorrentLink {
                    resolution,
                    title: winner.normalized_text.clone(),
                }),
                Acquisition::Downloaded { recorded } => {
                    let continuation = match winner.episode_range {
                        Some(range) => {
                            Some(self.continue_after(series, &resolution, range.next_episode()).await)
                        }
                        None => {
                            debug!(series, "No episode number in matched title, no continuation");
                            None
                        }
                    };
                    Ok(ItemOutcome::Downloaded {
                        key: key.to_string(),
                        resolution,
                        recorded,
                        continuation,
                    })
                }
            };
        }

        info!(series, "No matching resource on any resolution");
        Ok(ItemOutcome::Exhausted)
    }

    async fn process_movie(
        &self,
        item: &WantedItem,
        year: &str,
    ) -> Result<ItemOutcome, ConnectorError> {
        let title = item.series_title.as_str();
        let key = LedgerKey::movie(title, year);
        info!(title, year, "Processing movie");

        if self.ledger.contains(&key) {
            info!(key = %key, "Movie already recorded, skipping");
            return Ok(ItemOutcome::Skipped {
                key: key.to_string(),
            });
        }

        for resolution in self.ladder() {
            let Some(results) = self.search_rung(title, &resolution).await else {
                continue;
            };

            let candidates: Vec<Candidate> = results
                .iter()
                .map(|raw| self.filter.evaluate(raw, &resolution, item))
                .collect();
            count_verdicts(&candidates);

            let matches: Vec<&Candidate> =
                candidates.iter().filter(|c| c.is_movie_match()).collect();
            if matches.is_empty() {
                debug!(title, resolution = %resolution, "No candidate on this rung");
                SEARCHES.with_label_values(&["movie", "no_match"]).inc();
                continue;
            }
            SEARCHES.with_label_values(&["movie", "selected"]).inc();

            // A match whose detail page has no torrent link falls through to
            // the next match on the same rung.
            let mut dead_link = None;
            for winner in matches {
                info!(title, resolution = %resolution, matched = %winner.normalized_text, "Selected candidate");
                let body = winner.normalized_text.clone();
                match self.acquire(MediaMode::Movie, winner, &key, &body).await? {
                    Acquisition::AlreadyRecorded => {
                        return Ok(ItemOutcome::AlreadyRecorded {
                            key: key.to_string(),
                        })
                    }
                    Acquisition::NoTorrentLink => {
                        dead_link = Some(winner.normalized_text.clone());
                    }
                    Acquisition::Downloaded { recorded } => {
                        return Ok(ItemOutcome::Downloaded {
                            key: key.to_string(),
                            resolution,
                            recorded,
                            continuation: None,
                        })
                    }
                }
            }

            if let Some(matched) = dead_link {
                return Ok(ItemOutcome::NoTorrentLink {
                    resolution,
                    title: matched,
                });
            }
        }

        info!(title, year, "No matching resource on any resolution");
        Ok(ItemOutcome::Exhausted)
    }

    /// Search for one ladder rung. A failed search counts as no result.
    async fn search_rung(&self, query: &str, resolution: &str) -> Option<Vec<RawResult>> {
        let mode = self.config.mode.to_string();
        debug!(query, resolution, "Searching");
        match self.connector.search(query).await {
            Ok(results) => Some(results),
            Err(e) => {
                warn!(query, resolution, error = %e, "Search failed, moving to next resolution");
                SEARCHES.with_label_values(&[mode.as_str(), "error"]).inc();
                None
            }
        }
    }

    /// Download `winner` under `key` unless the ledger already has it.
    ///
    /// The ledger is written only after the connector reports the file on
    /// disk, and before the notification goes out.
    async fn acquire(
        &self,
        mode: MediaMode,
        winner: &Candidate,
        key: &LedgerKey,
        body: &str,
    ) -> Result<Acquisition, ConnectorError> {
        let mode_label = mode.to_string();

        if self.ledger.contains(key) {
            info!(key = %key, "Already downloaded, skipping");
            DOWNLOADS
                .with_label_values(&[mode_label.as_str(), "already_recorded"])
                .inc();
            return Ok(Acquisition::AlreadyRecorded);
        }

        self.connector.open_detail(&winner.raw.link).await?;
        let Some(torrent_url) = self.connector.find_torrent_link().await? else {
            warn!(link = %winner.raw.link, "No torrent link on detail page");
            DOWNLOADS.with_label_values(&[mode_label.as_str(), "no_torrent"]).inc();
            return Ok(Acquisition::NoTorrentLink);
        };

        let path = self.connector.trigger_download(&torrent_url).await?;
        DOWNLOADS.with_label_values(&[mode_label.as_str(), "completed"]).inc();
        info!(key = %key, path = %path.display(), "Download complete");

        let recorded = match self.ledger.append(key) {
            Ok(_) => true,
            Err(e) => {
                error!(key = %key, error = %e, "Failed to record download");
                LEDGER_ERRORS.with_label_values(&["append"]).inc();
                false
            }
        };

        self.send_notification(body).await;
        Ok(Acquisition::Downloaded { recorded })
    }

    /// The single follow-up search for the next episode.
    async fn continue_after(
        &self,
        series: &str,
        resolution: &str,
        episode: u32,
    ) -> ContinuationOutcome {
        let outcome = self.continuation_hop(series, resolution, episode).await;
        CONTINUATION_HOPS.with_label_values(&[outcome.label()]).inc();
        outcome
    }

    async fn continuation_hop(
        &self,
        series: &str,
        resolution: &str,
        episode: u32,
    ) -> ContinuationOutcome {
        info!(series, resolution, episode = %format_episode(episode), "Trying next episode");

        let results = match self.connector.search(series).await {
            Ok(results) => results,
            Err(e) => {
                warn!(series, error = %e, "Continuation search failed");
                return ContinuationOutcome::Failed {
                    episode,
                    error: e.to_string(),
                };
            }
        };

        let candidates: Vec<Candidate> = results
            .iter()
            .map(|raw| self.filter.evaluate_episode(raw, resolution, episode, false))
            .collect();
        count_verdicts(&candidates);

        let Some(winner) = candidates.iter().find(|c| c.is_episode_match()) else {
            info!(series, episode = %format_episode(episode), "Next episode not found");
            return ContinuationOutcome::NoMatch { episode };
        };

        if let Err(e) = self.ledger.load() {
            warn!(error = %e, "Ledger reload failed, keeping only this run's unsaved records");
            LEDGER_ERRORS.with_label_values(&["load"]).inc();
        }

        let key = LedgerKey::new(series, resolution, &winner.normalized_text);
        let body = format!("{} - {} - {}", series, resolution, winner.normalized_text);

        match self.acquire(MediaMode::Tv, winner, &key, &body).await {
            Ok(Acquisition::Downloaded { recorded }) => ContinuationOutcome::Downloaded {
                episode,
                key: key.to_string(),
                recorded,
            },
            Ok(Acquisition::AlreadyRecorded) => ContinuationOutcome::AlreadyRecorded {
                episode,
                key: key.to_string(),
            },
            Ok(Acquisition::NoTorrentLink) => ContinuationOutcome::NoTorrentLink { episode },
            Err(e) => {
                warn!(series, episode, error = %e, "Continuation download failed");
                DOWNLOADS.with_label_values(&["tv", "failed"]).inc();
                ContinuationOutcome::Failed {
                    episode,
                    error: e.to_string(),
                }
            }
        }
    }

    async fn send_notification(&self, body: &str) {
        match self.notifier.notify(DOWNLOAD_NOTIFICATION_TITLE, body).await {
            Ok(()) => {
                NOTIFICATIONS.with_label_values(&["success"]).inc();
            }
            Err(e) => {
                warn!(notifier = self.notifier.name(), error = %e, "Notification failed");
                NOTIFICATIONS.with_label_values(&["error"]).inc();
            }
        }
    }

    /// Manual search: every non-excluded result that carries one of the
    /// configured resolutions. Nothing is downloaded or recorded.
    pub async fn browse(
        &self,
        keyword: &str,
        year: Option<&str>,
    ) -> Result<Vec<RawResult>, ConnectorError> {
        let query = match year {
            Some(year) => format!("{} {}", keyword, year),
            None => keyword.to_string(),
        };
        let results = self.connector.search(&query).await?;
        let resolutions: Vec<String> = self
            .ladder()
            .rungs()
            .iter()
            .map(|r| r.to_lowercase())
            .collect();

        let matches: Vec<RawResult> = results
            .into_iter()
            .filter(|raw| {
                let text = raw.display_text.to_lowercase();
                !self.filter.is_excluded(&text)
                    && resolutions.iter().any(|r| text.contains(r.as_str()))
            })
            .collect();
        info!(query = %query, matching = matches.len(), "Manual search");
        Ok(matches)
    }

    /// Manual fetch of a known detail link. Nothing is recorded.
    pub async fn fetch(&self, link: &str) -> Result<Option<std::path::PathBuf>, ConnectorError> {
        self.connector.open_detail(link).await?;
        let Some(torrent_url) = self.connector.find_torrent_link().await? else {
            warn!(link, "No torrent link on detail page");
            return Ok(None);
        };
        let path = self.connector.trigger_download(&torrent_url).await?;
        info!(path = %path.display(), "Download complete");
        Ok(Some(path))
    }
}

fn count_verdicts(candidates: &[Candidate]) {
    for candidate in candidates {
        CANDIDATES
            .with_label_values(&[candidate.verdict.label()])
            .inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::{engine_config, harness, link, result};

    #[tokio::test]
    async fn test_browse_keeps_resolution_matches_only() {
        let dir = tempfile::TempDir::new().unwrap();
        let h = harness(engine_config(MediaMode::Tv), &dir.path().join("tv.json"));
        h.connector
            .set_query_results(
                "Foo 2024",
                vec![
                    result("Foo [第1集] 1080p", 1),
                    result("Foo [第1集] 720P", 2),
                    result("Foo [第1集] 480p", 3),
                    result("Foo 特效 [第1集] 1080p", 4),
                ],
            )
            .await;

        let found = h.engine.browse("Foo", Some("2024")).await.unwrap();

        let links: Vec<String> = found.iter().map(|r| r.link.clone()).collect();
        assert_eq!(links, vec![link(1), link(2)]);
        assert!(h.connector.downloads().await.is_empty());
        assert!(h.ledger.entries().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_does_not_record() {
        let dir = tempfile::TempDir::new().unwrap();
        let h = harness(engine_config(MediaMode::Tv), &dir.path().join("tv.json"));

        let path = h.engine.fetch(&link(9)).await.unwrap();

        assert!(path.is_some());
        assert_eq!(h.connector.downloads().await.len(), 1);
        assert!(h.ledger.entries().is_empty());
        assert!(h.notifier.notifications().await.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_without_torrent_link() {
        let dir = tempfile::TempDir::new().unwrap();
        let h = harness(engine_config(MediaMode::Movie), &dir.path().join("movie.json"));
        h.connector.remove_torrent_link(&link(3)).await;

        let path = h.engine.fetch(&link(3)).await.unwrap();
        assert!(path.is_none());
        assert!(h.connector.downloads().await.is_empty());
    }
}
