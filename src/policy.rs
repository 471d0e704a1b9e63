// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use regex::Regex;

use crate::config::ScraperConfig;
use crate::episode::{EpisodeRecord, download_path};
use crate::error::EpisodeError;
use crate::retention::count_episode_files;

/// Outcome of evaluating one episode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Episode should be downloaded (OK)
    Download,
    /// Skip this episode but keep scanning
    Skip(SkipReason),
    /// Stop processing the feed
    Halt(HaltReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NoUrl,
    Excluded,
    NotIncluded,
    AlreadyDownloaded,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoUrl => write!(f, "no download URL"),
            Self::Excluded => write!(f, "title matches an exclusion filter"),
            Self::NotIncluded => write!(f, "title does not match any inclusion filter"),
            Self::AlreadyDownloaded => write!(f, "already fetched"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HaltReason {
    AlreadyDownloaded,
    TooOld { max_age_days: u32 },
    EpisodeLimitReached { limit: usize },
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyDownloaded => write!(f, "already fetched, scraper is up to date"),
            Self::TooOld { max_age_days } => {
                write!(f, "published more than {max_age_days} days ago")
            }
            Self::EpisodeLimitReached { limit } => {
                write!(f, "maximum number of episodes reached ({limit})")
            }
        }
    }
}

/// A set of title patterns, each anchored at the start of the title
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<Regex>,
}

impl PatternSet {
    /// Compile every pattern; fails on the first invalid one
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|p| Self::anchored(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Compile a single pattern so it only matches at the start of a title
    pub fn anchored(pattern: &str) -> Result<Regex, regex::Error> {
        Regex::new(&format!("^(?:{pattern})"))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn matches_any(&self, title: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(title))
    }
}

impl From<Vec<Regex>> for PatternSet {
    fn from(patterns: Vec<Regex>) -> Self {
        Self { patterns }
    }
}

/// Decide what to do with an episode
///
/// Checks run in a fixed order and the first one that fires decides the
/// verdict. Once the title checks pass, the episode's download path is
/// computed and stored on the record.
///
/// Feeds are assumed to list episodes newest first, so an episode that is
/// already archived or too old halts the scan instead of being skipped.
///
/// `config.delete_episodes_if_over_limit` must already reflect first-run
/// safety; the caller disables it when the podcast home did not exist.
pub fn check_episode(
    config: &ScraperConfig,
    episode: &mut EpisodeRecord,
    now: DateTime<Utc>,
) -> Result<Verdict, EpisodeError> {
    if episode.url.is_none() {
        return Ok(Verdict::Skip(SkipReason::NoUrl));
    }

    if !config.skip_if_matching.is_empty() && config.skip_if_matching.matches_any(episode.raw_title()) {
        return Ok(Verdict::Skip(SkipReason::Excluded));
    }

    if !config.fetch_if_matching.is_empty() && !config.fetch_if_matching.matches_any(episode.raw_title()) {
        return Ok(Verdict::Skip(SkipReason::NotIncluded));
    }

    let path = download_path(config, episode)?;
    let exists = path.exists();
    let target_dir = path.parent().map(|p| p.to_path_buf());
    episode.download_path = Some(path);

    if exists {
        return Ok(if config.halt_on_existing {
            Verdict::Halt(HaltReason::AlreadyDownloaded)
        } else {
            Verdict::Skip(SkipReason::AlreadyDownloaded)
        });
    }

    if config.max_episode_age_in_days > 0
        && let Some(published) = episode.published
        && let Some(cutoff) = TimeDelta::try_days(i64::from(config.max_episode_age_in_days))
            .and_then(|age| now.checked_sub_signed(age))
        && published < cutoff
    {
        return Ok(Verdict::Halt(HaltReason::TooOld {
            max_age_days: config.max_episode_age_in_days,
        }));
    }

    if config.max_episodes > 0
        && !config.delete_episodes_if_over_limit
        && let Some(dir) = target_dir
    {
        let current = count_episode_files(&dir).map_err(|e| EpisodeError::Inventory {
            path: dir.clone(),
            source: e,
        })?;

        if current >= config.max_episodes {
            return Ok(Verdict::Halt(HaltReason::EpisodeLimitReached {
                limit: config.max_episodes,
            }));
        }
    }

    Ok(Verdict::Download)
}
