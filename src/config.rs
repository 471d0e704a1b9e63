use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::policy::PatternSet;

/// Config file used when none is given on the command line
pub const DEFAULT_CONFIG_FILE: &str = "podcast_scraper.toml";

/// Supported feed formats, selected by a scraper's `type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScraperKind {
    #[default]
    Rss,
}

/// Where an episode's number comes from, as written in the config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum EpisodeNumberSource {
    #[serde(rename = "METADATA", alias = "metadata")]
    Metadata,
    #[serde(rename = "TITLE", alias = "title")]
    Title,
    #[serde(rename = "COUNT", alias = "count")]
    Count,
}

/// Resolved episode numbering strategy
#[derive(Debug, Clone, Default)]
pub enum EpisodeNumbering {
    /// Use the feed's episode metadata (e.g. `itunes:episode`)
    #[default]
    Metadata,
    /// Parse number and title out of the title, by regex when one is
    /// configured and positionally otherwise
    Title(Option<Regex>),
    /// Number episodes sequentially from what is already on disk
    Count,
}

/// `[general]` section
#[derive(Debug, Clone, Deserialize)]
pub struct GeneralSettings {
    pub save_path: PathBuf,
    #[serde(default = "default_throttle_seconds")]
    pub throttle_seconds: u64,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(default)]
    pub log_level: Option<String>,
}

/// The whole configuration file, before per-scraper resolution
///
/// `[general]` holds settings for the whole run, `[defaults]` the policy
/// shared by every scraper, and each `[scrapers.<id>]` table overrides the
/// defaults key by key.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub general: GeneralSettings,
    #[serde(default)]
    pub defaults: toml::Table,
    #[serde(default)]
    pub scrapers: toml::Table,
}

/// One scraper's settings after merging defaults with its overrides
#[derive(Debug, Clone, Deserialize)]
struct ScraperSettings {
    #[serde(rename = "type")]
    kind: ScraperKind,
    name: String,
    feed_url: String,
    #[serde(default = "default_season_width")]
    min_season_width: usize,
    #[serde(default = "default_episode_width")]
    min_ep_number_width: usize,
    #[serde(default = "default_path_format")]
    download_path_format: String,
    #[serde(default)]
    max_episodes: usize,
    #[serde(default = "default_true")]
    halt_on_existing: bool,
    #[serde(default)]
    delete_episodes_if_over_limit: bool,
    #[serde(default)]
    max_episode_age_in_days: u32,
    #[serde(default)]
    skip_if_matching: Vec<String>,
    #[serde(default)]
    fetch_if_matching: Vec<String>,
    #[serde(default)]
    episode_number_source: Option<EpisodeNumberSource>,
    #[serde(default)]
    get_episode_number_from_title: bool,
    #[serde(default)]
    title_parsing_regex: Option<String>,
}

fn default_throttle_seconds() -> u64 {
    5
}

fn default_season_width() -> usize {
    2
}

fn default_episode_width() -> usize {
    3
}

fn default_path_format() -> String {
    "{ep_number} - {ep_title}.mp3".to_string()
}

fn default_true() -> bool {
    true
}

/// Effective, immutable configuration for one scraper run
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    /// Key of the scraper's table in the config file
    pub id: String,
    pub kind: ScraperKind,
    /// Podcast name; also the directory under `save_path`
    pub name: String,
    /// An http(s) URL or a path to a local feed file
    pub feed_url: String,
    pub save_path: PathBuf,
    pub throttle: Duration,
    pub min_season_width: usize,
    pub min_episode_width: usize,
    pub download_path_format: String,
    /// 0 = unlimited
    pub max_episodes: usize,
    pub halt_on_existing: bool,
    pub delete_episodes_if_over_limit: bool,
    /// 0 = unlimited
    pub max_episode_age_in_days: u32,
    pub skip_if_matching: PatternSet,
    pub fetch_if_matching: PatternSet,
    pub episode_numbering: EpisodeNumbering,
}

impl ScraperConfig {
    /// A config with the built-in defaults for every policy field
    pub fn new(name: impl Into<String>, feed_url: impl Into<String>, save_path: impl Into<PathBuf>) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            kind: ScraperKind::default(),
            name,
            feed_url: feed_url.into(),
            save_path: save_path.into(),
            throttle: Duration::from_secs(default_throttle_seconds()),
            min_season_width: default_season_width(),
            min_episode_width: default_episode_width(),
            download_path_format: default_path_format(),
            max_episodes: 0,
            halt_on_existing: true,
            delete_episodes_if_over_limit: false,
            max_episode_age_in_days: 0,
            skip_if_matching: PatternSet::default(),
            fetch_if_matching: PatternSet::default(),
            episode_numbering: EpisodeNumbering::default(),
        }
    }

    /// `{save_path}/{name}`, the podcast's home directory
    pub fn podcast_home(&self) -> PathBuf {
        self.save_path.join(&self.name)
    }

    fn resolve(id: &str, settings: ScraperSettings, general: &GeneralSettings) -> Result<Self, ConfigError> {
        let compile = |patterns: &[String]| -> Result<PatternSet, ConfigError> {
            patterns
                .iter()
                .map(|p| {
                    PatternSet::anchored(p).map_err(|source| ConfigError::InvalidPattern {
                        id: id.to_string(),
                        pattern: p.clone(),
                        source,
                    })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(PatternSet::from)
        };

        let title_regex = settings
            .title_parsing_regex
            .as_deref()
            .map(|p| {
                Regex::new(p).map_err(|source| ConfigError::InvalidPattern {
                    id: id.to_string(),
                    pattern: p.to_string(),
                    source,
                })
            })
            .transpose()?;

        // A title regex always wins, as does the older boolean switch
        let episode_numbering = match (title_regex, settings.episode_number_source) {
            (Some(regex), _) => EpisodeNumbering::Title(Some(regex)),
            (None, _) if settings.get_episode_number_from_title => EpisodeNumbering::Title(None),
            (None, Some(EpisodeNumberSource::Title)) => EpisodeNumbering::Title(None),
            (None, Some(EpisodeNumberSource::Count)) => EpisodeNumbering::Count,
            (None, Some(EpisodeNumberSource::Metadata) | None) => EpisodeNumbering::Metadata,
        };

        Ok(Self {
            id: id.to_string(),
            kind: settings.kind,
            name: settings.name,
            feed_url: settings.feed_url,
            save_path: general.save_path.clone(),
            throttle: Duration::from_secs(general.throttle_seconds),
            min_season_width: settings.min_season_width,
            min_episode_width: settings.min_ep_number_width,
            download_path_format: settings.download_path_format,
            max_episodes: settings.max_episodes,
            halt_on_existing: settings.halt_on_existing,
            delete_episodes_if_over_limit: settings.delete_episodes_if_over_limit,
            max_episode_age_in_days: settings.max_episode_age_in_days,
            skip_if_matching: compile(&settings.skip_if_matching)?,
            fetch_if_matching: compile(&settings.fetch_if_matching)?,
            episode_numbering,
        })
    }
}

impl ConfigFile {
    /// Load the configuration file, failing fast if it is missing
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&content).map_err(|e| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Resolve every enabled scraper, ordered by id
    ///
    /// A broken entry yields an error in its own slot and does not affect
    /// the others. Scrapers default to enabled.
    pub fn enabled_scrapers(&self) -> Vec<(String, Result<ScraperConfig, ConfigError>)> {
        self.scrapers
            .iter()
            .filter_map(|(id, overrides)| {
                let merged = match self.merge_with_defaults(overrides.clone()) {
                    Ok(merged) => merged,
                    Err(source) => {
                        return Some((id.clone(), Err(ConfigError::InvalidScraper { id: id.clone(), source })));
                    }
                };

                let enabled = merged
                    .get("enabled")
                    .and_then(toml::Value::as_bool)
                    .unwrap_or(true);
                if !enabled {
                    return None;
                }

                let resolved = toml::Value::Table(merged)
                    .try_into::<ScraperSettings>()
                    .map_err(|source| ConfigError::InvalidScraper { id: id.clone(), source })
                    .and_then(|settings| ScraperConfig::resolve(id, settings, &self.general));

                Some((id.clone(), resolved))
            })
            .collect()
    }

    fn merge_with_defaults(&self, overrides: toml::Value) -> Result<toml::Table, toml::de::Error> {
        let overrides: toml::Table = overrides.try_into()?;
        let mut merged = self.defaults.clone();
        merged.extend(overrides);
        Ok(merged)
    }
}
