// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::Utc;

use crate::config::{ScraperConfig, ScraperKind};
use crate::episode::{DownloadResult, EpisodeRecord, download_episode};
use crate::error::{DownloadError, EpisodeError, ScrapeError};
use crate::feed::{FeedAdapter, RssFeed};
use crate::http::HttpClient;
use crate::policy::{HaltReason, SkipReason, Verdict, check_episode};
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::retention::{clean_partial_files, enforce_limit};

/// How a scrape ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeState {
    /// Every entry in the feed was evaluated
    Done,
    /// An episode halted the scan
    Halted,
}

/// What happened to one feed entry
#[derive(Debug)]
pub enum EpisodeOutcome {
    Downloaded {
        title: String,
        result: DownloadResult,
        deleted: usize,
    },
    Skipped {
        title: String,
        reason: SkipReason,
    },
    /// Extraction or admission failed; counts as a skip
    Errored { title: String, error: EpisodeError },
    DownloadFailed {
        title: String,
        error: DownloadError,
        deleted: usize,
    },
    Halted { title: String, reason: HaltReason },
}

/// Result of scraping one podcast
#[derive(Debug, Clone)]
pub struct ScrapeSummary {
    pub podcast: String,
    /// Number of feed entries looked at before the scan stopped
    pub evaluated: usize,
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Old episodes removed to stay within the episode limit
    pub deleted: usize,
    pub state: ScrapeState,
    /// Details of failed downloads (title, error message)
    pub failed_episodes: Vec<(String, String)>,
}

impl ScrapeSummary {
    fn new(podcast: &str) -> Self {
        Self {
            podcast: podcast.to_string(),
            evaluated: 0,
            downloaded: 0,
            skipped: 0,
            failed: 0,
            deleted: 0,
            state: ScrapeState::Done,
            failed_episodes: Vec::new(),
        }
    }
}

/// Drives one podcast's feed through admission, retention and download
pub struct Scraper<A, C> {
    config: ScraperConfig,
    feed: A,
    client: C,
    reporter: SharedProgressReporter,
}

impl<A: FeedAdapter, C: HttpClient> Scraper<A, C> {
    pub fn new(config: ScraperConfig, feed: A, client: C, reporter: SharedProgressReporter) -> Self {
        Self {
            config,
            feed,
            client,
            reporter,
        }
    }

    /// Scan the feed newest first, downloading admitted episodes until the
    /// feed is exhausted or an episode halts the scan
    ///
    /// If the podcast home does not exist yet, this is a first run and no
    /// old episodes are deleted, whatever the configured limits say.
    pub async fn scrape_podcast(&self) -> Result<ScrapeSummary, ScrapeError> {
        let mut config = self.config.clone();
        let home = config.podcast_home();

        if home.exists() {
            let cleaned = clean_partial_files(&home, &self.reporter)?;
            if cleaned > 0 {
                self.reporter
                    .report(ProgressEvent::PartialFilesCleanedUp { count: cleaned });
            }
        } else {
            config.delete_episodes_if_over_limit = false;
            self.reporter.report(ProgressEvent::FirstRun {
                podcast: config.name.clone(),
                home: home.clone(),
            });
        }

        self.reporter.report(ProgressEvent::FetchingFeed {
            podcast: config.name.clone(),
            source: config.feed_url.clone(),
        });
        let entries = self.feed.fetch_episode_list().await?;
        self.reporter.report(ProgressEvent::FeedFetched {
            podcast: config.name.clone(),
            total_episodes: entries.len(),
        });

        let mut summary = ScrapeSummary::new(&config.name);

        for entry in &entries {
            summary.evaluated += 1;

            match self.process_episode(&config, entry).await {
                EpisodeOutcome::Downloaded { deleted, .. } => {
                    summary.downloaded += 1;
                    summary.deleted += deleted;
                }
                EpisodeOutcome::Skipped { title, reason } => {
                    summary.skipped += 1;
                    self.reporter
                        .report(ProgressEvent::EpisodeSkipped { title, reason });
                }
                EpisodeOutcome::Errored { title, error } => {
                    summary.skipped += 1;
                    self.reporter.report(ProgressEvent::EpisodeFailed {
                        title,
                        error: error.to_string(),
                    });
                }
                EpisodeOutcome::DownloadFailed {
                    title,
                    error,
                    deleted,
                } => {
                    summary.failed += 1;
                    summary.deleted += deleted;
                    summary
                        .failed_episodes
                        .push((title.clone(), error.to_string()));
                    self.reporter.report(ProgressEvent::DownloadFailed {
                        episode_title: title,
                        error: error.to_string(),
                    });
                }
                EpisodeOutcome::Halted { title, reason } => {
                    summary.state = ScrapeState::Halted;
                    self.reporter
                        .report(ProgressEvent::EpisodeHalted { title, reason });
                    break;
                }
            }
        }

        self.reporter.report(ProgressEvent::ScrapeCompleted {
            podcast: summary.podcast.clone(),
            downloaded_count: summary.downloaded,
            skipped_count: summary.skipped,
            failed_count: summary.failed,
            deleted_count: summary.deleted,
            halted: summary.state == ScrapeState::Halted,
        });

        Ok(summary)
    }

    /// Process one entry in isolation; never fails, every problem becomes
    /// part of the outcome
    pub async fn process_episode(&self, config: &ScraperConfig, entry: &A::Entry) -> EpisodeOutcome {
        let mut episode = match self.feed.extract(entry) {
            Ok(episode) => episode,
            Err(error) => {
                return EpisodeOutcome::Errored {
                    title: self.feed.entry_title(entry),
                    error,
                };
            }
        };
        let title = episode.raw_title().to_string();

        let verdict = match check_episode(config, &mut episode, Utc::now()) {
            Ok(verdict) => verdict,
            Err(error) => return EpisodeOutcome::Errored { title, error },
        };

        match verdict {
            Verdict::Skip(reason) => EpisodeOutcome::Skipped { title, reason },
            Verdict::Halt(reason) => EpisodeOutcome::Halted { title, reason },
            Verdict::Download => {
                let deleted = self.make_room(config, &episode);

                match download_episode(&self.client, config, &episode, &self.reporter).await {
                    Ok(result) => EpisodeOutcome::Downloaded {
                        title,
                        result,
                        deleted,
                    },
                    Err(error) => EpisodeOutcome::DownloadFailed {
                        title,
                        error,
                        deleted,
                    },
                }
            }
        }
    }

    /// Delete old episodes from the target directory when a limit is set and
    /// deletion is allowed. Returns how many were deleted.
    fn make_room(&self, config: &ScraperConfig, episode: &EpisodeRecord) -> usize {
        if config.max_episodes == 0 || !config.delete_episodes_if_over_limit {
            return 0;
        }

        let Some(dir) = episode.download_path.as_deref().and_then(|p| p.parent()) else {
            return 0;
        };

        match enforce_limit(dir, config.max_episodes, &self.reporter) {
            Ok(deleted) => deleted,
            Err(e) => {
                self.reporter.report(ProgressEvent::DeleteFailed {
                    path: dir.to_path_buf(),
                    error: e.to_string(),
                });
                0
            }
        }
    }
}

/// Build the feed adapter for the scraper's configured type and run it
pub async fn run_scraper<C: HttpClient + Clone>(
    config: ScraperConfig,
    client: C,
    reporter: SharedProgressReporter,
) -> Result<ScrapeSummary, ScrapeError> {
    match config.kind {
        ScraperKind::Rss => {
            let feed = RssFeed::new(client.clone(), &config);
            Scraper::new(config, feed, client, reporter)
                .scrape_podcast()
                .await
        }
    }
}
