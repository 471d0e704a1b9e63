use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::policy::{HaltReason, SkipReason};

/// Events emitted while scraping a podcast
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Feed is being fetched from a URL or read from disk
    FetchingFeed { podcast: String, source: String },

    /// Feed was fetched and split into entries
    FeedFetched { podcast: String, total_episodes: usize },

    /// The podcast home did not exist before this run; retention deletion is off
    FirstRun { podcast: String, home: PathBuf },

    /// Episode was passed over, scanning continues
    EpisodeSkipped { title: String, reason: SkipReason },

    /// Episode stopped the scan
    EpisodeHalted { title: String, reason: HaltReason },

    /// Extracting or admitting an episode failed; it is treated as skipped
    EpisodeFailed { title: String, error: String },

    /// An old episode was deleted to stay within the episode limit
    EpisodeDeleted { path: PathBuf, limit: usize },

    /// Deleting an old episode failed; remaining deletions continue
    DeleteFailed { path: PathBuf, error: String },

    /// A download is starting
    DownloadStarting {
        episode_title: String,
        episode_number: Option<String>,
        path: PathBuf,
        /// Expected content length in bytes, if known
        content_length: Option<u64>,
    },

    /// Download progress update
    DownloadProgress {
        episode_title: String,
        bytes_downloaded: u64,
        total_bytes: Option<u64>,
    },

    /// A download completed successfully
    DownloadCompleted {
        episode_title: String,
        bytes_downloaded: u64,
    },

    /// A download failed
    DownloadFailed { episode_title: String, error: String },

    /// Leftover partial files from an interrupted run were removed
    PartialFilesCleanedUp { count: usize },

    /// Scrape of one podcast finished
    ScrapeCompleted {
        podcast: String,
        downloaded_count: usize,
        skipped_count: usize,
        failed_count: usize,
        deleted_count: usize,
        halted: bool,
    },
}

/// Trait for reporting events during a scrape.
///
/// The scraper never logs on its own; everything it has to say goes
/// through the reporter it was given.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event
    fn report(&self, event: ProgressEvent);
}

/// A shared reference to a progress reporter
pub type SharedProgressReporter = Arc<dyn ProgressReporter>;

/// A no-op progress reporter that silently ignores all events.
/// Useful for tests or quiet mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: ProgressEvent) {
        // Intentionally empty
    }
}

impl NoopReporter {
    /// Create a new NoopReporter wrapped in an Arc
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}

/// Reporter that turns every event into a structured `tracing` record
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl TracingReporter {
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}

impl ProgressReporter for TracingReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::FetchingFeed { podcast, source } => {
                debug!(%podcast, %source, "Fetching feed");
            }
            ProgressEvent::FeedFetched {
                podcast,
                total_episodes,
            } => {
                debug!(%podcast, total_episodes, "There are {} episodes", total_episodes);
            }
            ProgressEvent::FirstRun { podcast, home } => {
                info!(
                    %podcast,
                    home = %home.display(),
                    "First run for this podcast, old episodes will not be deleted"
                );
            }
            ProgressEvent::EpisodeSkipped { title, reason } => match reason {
                SkipReason::AlreadyDownloaded => {
                    debug!(%title, "Skipping episode - {}", reason);
                }
                _ => info!(%title, "Skipping episode - {}", reason),
            },
            ProgressEvent::EpisodeHalted { title, reason } => {
                info!(%title, "Halting on episode - {}", reason);
            }
            ProgressEvent::EpisodeFailed { title, error } => {
                error!(%title, %error, "Error while processing episode, skipping");
            }
            ProgressEvent::EpisodeDeleted { path, limit } => {
                debug!(
                    path = %path.display(),
                    limit,
                    "Deleting episode to observe episode limit"
                );
            }
            ProgressEvent::DeleteFailed { path, error } => {
                warn!(path = %path.display(), %error, "Failed to delete old episode");
            }
            ProgressEvent::DownloadStarting {
                episode_title,
                episode_number,
                path,
                content_length,
            } => {
                info!(
                    title = %episode_title,
                    episode = episode_number.as_deref().unwrap_or("?"),
                    path = %path.display(),
                    content_length,
                    "Downloading episode"
                );
            }
            ProgressEvent::DownloadProgress { .. } => {}
            ProgressEvent::DownloadCompleted {
                episode_title,
                bytes_downloaded,
            } => {
                debug!(title = %episode_title, bytes_downloaded, "Download finished");
            }
            ProgressEvent::DownloadFailed {
                episode_title,
                error,
            } => {
                error!(title = %episode_title, %error, "Unable to download episode");
            }
            ProgressEvent::PartialFilesCleanedUp { count } => {
                info!(count, "Removed partial files left by an interrupted run");
            }
            ProgressEvent::ScrapeCompleted {
                podcast,
                downloaded_count,
                skipped_count,
                failed_count,
                deleted_count,
                halted,
            } => {
                info!(
                    %podcast,
                    downloaded_count,
                    skipped_count,
                    failed_count,
                    deleted_count,
                    halted,
                    "Scrape finished"
                );
            }
        }
    }
}

/// Forwards every event to each of the wrapped reporters in order
pub struct FanoutReporter {
    reporters: Vec<SharedProgressReporter>,
}

impl FanoutReporter {
    pub fn new(reporters: Vec<SharedProgressReporter>) -> Self {
        Self { reporters }
    }
}

impl ProgressReporter for FanoutReporter {
    fn report(&self, event: ProgressEvent) {
        if let Some((last, rest)) = self.reporters.split_last() {
            for reporter in rest {
                reporter.report(event.clone());
            }
            last.report(event);
        }
    }
}
