use std::path::PathBuf;

use chrono::{DateTime, FixedOffset};
use url::Url;

/// Canonical per-episode data, extracted from one feed entry
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeRecord {
    raw_title: String,
    /// Title used for the filename; may be rewritten by title parsing
    pub title: String,
    pub episode_number: Option<String>,
    pub season: Option<String>,
    pub published: Option<DateTime<FixedOffset>>,
    pub url: Option<Url>,
    /// Set by the admission policy once title and number are final
    pub download_path: Option<PathBuf>,
}

impl EpisodeRecord {
    /// Start a record from the title exactly as the feed published it
    pub fn new(raw_title: impl Into<String>) -> Self {
        let raw_title = raw_title.into();
        Self {
            title: raw_title.clone(),
            raw_title,
            episode_number: None,
            season: None,
            published: None,
            url: None,
            download_path: None,
        }
    }

    /// The unparsed title from the feed, used for filtering and reporting
    pub fn raw_title(&self) -> &str {
        &self.raw_title
    }
}
