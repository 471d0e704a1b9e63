// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use url::Url;

use crate::config::{EpisodeNumbering, ScraperConfig};
use crate::episode::{EpisodeRecord, infer_next_episode_number, parse_title, simple_title_parsing};
use crate::error::{EpisodeError, FeedError};
use crate::http::HttpClient;

use super::FeedAdapter;
use super::fetch::load_feed_source;

const UNTITLED: &str = "Untitled Episode";

/// Feed adapter for RSS 2.0 documents with iTunes extensions
pub struct RssFeed<C> {
    client: C,
    source: String,
    numbering: EpisodeNumbering,
    podcast_home: PathBuf,
}

impl<C: HttpClient> RssFeed<C> {
    pub fn new(client: C, config: &ScraperConfig) -> Self {
        Self {
            client,
            source: config.feed_url.clone(),
            numbering: config.episode_numbering.clone(),
            podcast_home: config.podcast_home(),
        }
    }
}

#[async_trait]
impl<C: HttpClient> FeedAdapter for RssFeed<C> {
    type Entry = rss::Item;

    async fn fetch_episode_list(&self) -> Result<Vec<rss::Item>, FeedError> {
        let bytes = load_feed_source(&self.client, &self.source).await?;
        let channel = rss::Channel::read_from(&bytes[..])?;
        Ok(channel.into_items())
    }

    fn entry_title(&self, item: &rss::Item) -> String {
        item_title(item)
    }

    fn extract(&self, item: &rss::Item) -> Result<EpisodeRecord, EpisodeError> {
        let mut episode = EpisodeRecord::new(item_title(item));

        let itunes = item.itunes_ext();
        episode.season = itunes.and_then(|ext| non_empty(ext.season()));
        episode.episode_number = itunes.and_then(|ext| non_empty(ext.episode()));

        episode.published = item.pub_date().and_then(parse_pub_date);
        episode.url = item
            .enclosure()
            .and_then(|enclosure| Url::parse(enclosure.url().trim()).ok());

        match &self.numbering {
            EpisodeNumbering::Metadata => {}
            EpisodeNumbering::Title(pattern) => {
                let parsed = pattern
                    .as_ref()
                    .and_then(|re| parse_title(re, episode.raw_title()))
                    .or_else(|| simple_title_parsing(episode.raw_title()));

                if let Some((number, title)) = parsed {
                    episode.episode_number = Some(number);
                    if !title.is_empty() {
                        episode.title = title;
                    }
                }
            }
            EpisodeNumbering::Count => {
                let next = infer_next_episode_number(&self.podcast_home)?;
                episode.episode_number = Some(next.to_string());
            }
        }

        Ok(episode)
    }
}

/// Title of an item with any HTML entities left by double-escaping decoded
fn item_title(item: &rss::Item) -> String {
    item.title()
        .map(|t| html_escape::decode_html_entities(t.trim()).into_owned())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string())
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(String::from)
}

/// Parse an RSS `pubDate`, accepting a few common deviations from RFC 2822
fn parse_pub_date(date_str: &str) -> Option<DateTime<FixedOffset>> {
    let date_str = date_str.trim();
    if let Ok(dt) = DateTime::parse_from_rfc2822(date_str) {
        return Some(dt);
    }

    const FORMATS: [&str; 3] = [
        "%a, %d %b %Y %H:%M:%S %z",
        "%Y-%m-%dT%H:%M:%S%:z",
        "%Y-%m-%d %H:%M:%S %z",
    ];

    FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(date_str, format).ok())
        .or_else(|| DateTime::parse_from_rfc3339(date_str).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpResponse;
    use bytes::Bytes;
    use regex::Regex;
    use tempfile::tempdir;

    #[derive(Clone)]
    struct FeedClient(String);

    #[async_trait]
    impl HttpClient for FeedClient {
        async fn get_bytes(&self, _url: &str) -> Result<Bytes, reqwest::Error> {
            Ok(Bytes::from(self.0.clone()))
        }

        async fn get_stream(&self, _url: &str) -> Result<HttpResponse, reqwest::Error> {
            unreachable!("feeds are never streamed")
        }
    }

    const SAMPLE_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd">
  <channel>
    <title>Test Podcast</title>
    <description>A test podcast</description>
    <link>https://example.com</link>
    <item>
      <title>12: Cats &amp;amp; Dogs</title>
      <pubDate>Mon, 01 Jan 2024 12:00:00 +0000</pubDate>
      <enclosure url="https://example.com/ep12.mp3" length="1234567" type="audio/mpeg"/>
      <itunes:episode>12</itunes:episode>
      <itunes:season>3</itunes:season>
    </item>
    <item>
      <title>Bonus content</title>
      <pubDate>2023-12-25 08:00:00 +0100</pubDate>
      <enclosure url="https://example.com/bonus.mp3" type="audio/mpeg"/>
    </item>
    <item>
      <title>Show notes only</title>
    </item>
  </channel>
</rss>"#;

    fn make_feed(numbering: EpisodeNumbering, save_path: &std::path::Path) -> RssFeed<FeedClient> {
        let mut config = ScraperConfig::new("Test Podcast", "https://example.com/feed.xml", save_path);
        config.episode_numbering = numbering;
        RssFeed::new(FeedClient(SAMPLE_FEED.to_string()), &config)
    }

    async fn extract_all(feed: &RssFeed<FeedClient>) -> Vec<EpisodeRecord> {
        feed.fetch_episode_list()
            .await
            .unwrap()
            .iter()
            .map(|item| feed.extract(item).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn fetch_keeps_feed_order_and_every_item() {
        let dir = tempdir().unwrap();
        let feed = make_feed(EpisodeNumbering::Metadata, dir.path());

        let items = feed.fetch_episode_list().await.unwrap();
        let titles: Vec<_> = items.iter().map(|i| feed.entry_title(i)).collect();

        assert_eq!(titles, vec!["12: Cats & Dogs", "Bonus content", "Show notes only"]);
    }

    #[tokio::test]
    async fn extract_reads_itunes_metadata() {
        let dir = tempdir().unwrap();
        let episodes = extract_all(&make_feed(EpisodeNumbering::Metadata, dir.path())).await;

        let first = &episodes[0];
        assert_eq!(first.raw_title(), "12: Cats & Dogs");
        assert_eq!(first.title, "12: Cats & Dogs");
        assert_eq!(first.episode_number.as_deref(), Some("12"));
        assert_eq!(first.season.as_deref(), Some("3"));
        assert_eq!(first.url.as_ref().map(Url::as_str), Some("https://example.com/ep12.mp3"));
        assert_eq!(
            first.published,
            DateTime::parse_from_rfc3339("2024-01-01T12:00:00+00:00").ok()
        );
        assert!(first.download_path.is_none());
    }

    #[tokio::test]
    async fn extract_handles_missing_fields() {
        let dir = tempdir().unwrap();
        let episodes = extract_all(&make_feed(EpisodeNumbering::Metadata, dir.path())).await;

        let bonus = &episodes[1];
        assert!(bonus.episode_number.is_none());
        assert!(bonus.season.is_none());
        assert!(bonus.published.is_some());

        let notes = &episodes[2];
        assert!(notes.url.is_none());
        assert!(notes.published.is_none());
    }

    #[tokio::test]
    async fn title_numbering_uses_regex_groups() {
        let dir = tempdir().unwrap();
        let pattern = Regex::new(r"^(\d+): (.*)$").unwrap();
        let episodes = extract_all(&make_feed(EpisodeNumbering::Title(Some(pattern)), dir.path())).await;

        assert_eq!(episodes[0].episode_number.as_deref(), Some("12"));
        assert_eq!(episodes[0].title, "Cats & Dogs");
        assert_eq!(episodes[0].raw_title(), "12: Cats & Dogs");
    }

    #[tokio::test]
    async fn title_numbering_falls_back_to_positional_parsing() {
        let dir = tempdir().unwrap();
        let pattern = Regex::new(r"^Episode (\d+) - (.*)$").unwrap();
        let episodes = extract_all(&make_feed(EpisodeNumbering::Title(Some(pattern)), dir.path())).await;

        assert_eq!(episodes[0].episode_number.as_deref(), Some("12"));
        assert_eq!(episodes[0].title, "Cats & Dogs");
        // Nothing to parse: metadata and raw title stay as they are
        assert!(episodes[1].episode_number.is_none());
        assert_eq!(episodes[1].title, "Bonus content");
    }

    #[tokio::test]
    async fn count_numbering_continues_from_disk() {
        let dir = tempdir().unwrap();
        let home = dir.path().join("Test Podcast");
        std::fs::create_dir_all(&home).unwrap();
        std::fs::write(home.join("041 - Previous.mp3"), b"x").unwrap();

        let episodes = extract_all(&make_feed(EpisodeNumbering::Count, dir.path())).await;

        assert_eq!(episodes[0].episode_number.as_deref(), Some("42"));
    }

    #[tokio::test]
    async fn invalid_feed_is_a_parse_error() {
        let dir = tempdir().unwrap();
        let config = ScraperConfig::new("Broken", "https://example.com/feed.xml", dir.path());
        let feed = RssFeed::new(FeedClient("not xml at all".to_string()), &config);

        assert!(matches!(feed.fetch_episode_list().await, Err(FeedError::ParseFailed(_))));
    }

    #[test]
    fn pub_date_accepts_relaxed_formats() {
        assert!(parse_pub_date("Mon, 01 Jan 2024 12:00:00 +0000").is_some());
        assert!(parse_pub_date("2024-01-01T12:00:00+02:00").is_some());
        assert!(parse_pub_date("2024-01-01 12:00:00 +0200").is_some());
        assert!(parse_pub_date("yesterday").is_none());
    }

    #[test]
    fn untitled_items_get_a_placeholder() {
        let item = rss::Item::default();
        assert_eq!(item_title(&item), UNTITLED);
    }
}
