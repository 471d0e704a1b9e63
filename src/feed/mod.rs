mod fetch;
mod rss_xml;

use async_trait::async_trait;

use crate::episode::EpisodeRecord;
use crate::error::{EpisodeError, FeedError};

pub use fetch::{is_url, load_feed_source};
pub use rss_xml::RssFeed;

/// A source of episodes in one feed format
///
/// Entries are expected newest first; the admission policy relies on that
/// ordering to halt early.
#[async_trait]
pub trait FeedAdapter: Send + Sync {
    /// Raw, format-specific representation of one feed entry
    type Entry: Send + Sync;

    /// Fetch the feed and split it into entries, in feed order
    async fn fetch_episode_list(&self) -> Result<Vec<Self::Entry>, FeedError>;

    /// Title of an entry as published, for reporting when extraction fails
    fn entry_title(&self, entry: &Self::Entry) -> String;

    /// Turn one entry into an episode record
    fn extract(&self, entry: &Self::Entry) -> Result<EpisodeRecord, EpisodeError>;
}
