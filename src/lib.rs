pub mod config;
pub mod episode;
pub mod error;
pub mod feed;
pub mod http;
pub mod policy;
pub mod progress;
pub mod retention;
pub mod scraper;

// Re-export main types for convenience
pub use config::{ConfigFile, DEFAULT_CONFIG_FILE, EpisodeNumbering, GeneralSettings, ScraperConfig, ScraperKind};
pub use episode::{EpisodeRecord, download_episode, download_path, tidy_up_title};
pub use error::{ConfigError, DownloadError, EpisodeError, FeedError, ScrapeError, StateError, TemplateError};
pub use feed::{FeedAdapter, RssFeed, is_url};
pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use policy::{HaltReason, PatternSet, SkipReason, Verdict, check_episode};
pub use progress::{
    FanoutReporter, NoopReporter, ProgressEvent, ProgressReporter, SharedProgressReporter, TracingReporter,
};
pub use retention::{clean_partial_files, delete_files, enforce_limit, prune_oldest};
pub use scraper::{EpisodeOutcome, ScrapeState, ScrapeSummary, Scraper, run_scraper};
