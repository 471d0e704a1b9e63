use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or resolving the configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Can't find the configuration file {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration file {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration for scraper '{id}': {source}")]
    InvalidScraper {
        id: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid pattern '{pattern}' for scraper '{id}': {source}")]
    InvalidPattern {
        id: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Errors that can occur when fetching or parsing feeds
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Failed to fetch feed from {url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to read feed file {path}: {source}")]
    FileReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse RSS feed: {0}")]
    ParseFailed(#[from] rss::Error),
}

/// Errors produced while rendering a download path template
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Unknown key '{0}' in download path format")]
    UnknownKey(String),

    #[error("Download path format uses '{0}' but the episode has no value for it")]
    MissingValue(&'static str),

    #[error("Unbalanced brace in download path format '{0}'")]
    UnbalancedBrace(String),

    #[error("Value '{value}' for '{key}' is not usable in a file name")]
    UnsafeValue { key: &'static str, value: String },

    #[error("Download path '{0}' is not inside the podcast directory")]
    OutsideHome(String),
}

/// Errors confined to a single episode; the scrape treats them as a skip
#[derive(Error, Debug)]
pub enum EpisodeError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("Failed to inspect directory {path}: {source}")]
    Inventory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot infer the next episode number from '{0}'")]
    UninferableNumber(String),
}

/// Errors that can occur during episode downloads
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Episode '{title}' has no download URL")]
    MissingUrl { title: String },

    #[error("Episode '{title}' has no download path")]
    MissingPath { title: String },

    #[error("HTTP request failed for {url}: {source}")]
    HttpFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to create directory {path}: {source}")]
    CreateDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create file {path}: {source}")]
    FileCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write to file {path}: {source}")]
    FileWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Stream error while downloading {url}: {source}")]
    StreamFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to move {from} into place at {to}: {source}")]
    FinalizeFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur when inspecting a podcast directory
#[derive(Error, Debug)]
pub enum StateError {
    #[error("Failed to read directory {path}: {source}")]
    ReadDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that abort the scrape of a single podcast
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("State error: {0}")]
    State(#[from] StateError),
}
