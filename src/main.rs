use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use podcast_scraper::{
    ConfigFile, DEFAULT_CONFIG_FILE, FanoutReporter, GeneralSettings, NoopReporter, ProgressEvent, ProgressReporter,
    ReqwestClient, ScrapeState, SharedProgressReporter, TracingReporter, run_scraper,
};

// Emoji with fallback for terminals without Unicode support
static MICROPHONE: Emoji<'_, '_> = Emoji("🎙️  ", "");
static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "[~] ");
static HEADPHONES: Emoji<'_, '_> = Emoji("🎧 ", "[i] ");
static DOWNLOAD: Emoji<'_, '_> = Emoji("📥 ", "[v] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static STOP: Emoji<'_, '_> = Emoji("⏹️  ", "[=] ");
static TRASH: Emoji<'_, '_> = Emoji("🗑️  ", "[-] ");
static PARTY: Emoji<'_, '_> = Emoji("🎉 ", "[*] ");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "x ");

/// Scrape podcast feeds into local directories
#[derive(Parser, Debug)]
#[command(name = "podcast-scraper")]
#[command(about = "Scrape podcast feeds into local directories")]
#[command(version)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Quiet mode - suppress progress output
    #[arg(short, long)]
    quiet: bool,
}

/// Progress reporter using indicatif for terminal output
///
/// Downloads run one at a time, so a single bar is reused for each.
struct IndicatifReporter {
    spinner: ProgressBar,
    bar: Mutex<Option<ProgressBar>>,
}

impl IndicatifReporter {
    fn new() -> Result<Self> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {wide_msg}")?);
        spinner.enable_steady_tick(std::time::Duration::from_millis(100));

        Ok(Self {
            spinner,
            bar: Mutex::new(None),
        })
    }

    fn start_bar(&self, length: u64, message: String) {
        let style = ProgressStyle::default_bar()
            .template(&format!(
                "  {DOWNLOAD}[{{bar:30.cyan/blue}}] {{bytes}}/{{total_bytes}} {{wide_msg}}"
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");

        let bar = ProgressBar::new(length);
        bar.set_style(style);
        bar.set_message(message);

        if let Ok(mut current) = self.bar.lock() {
            *current = Some(bar);
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(current) = self.bar.lock()
            && let Some(bar) = current.as_ref()
        {
            f(bar);
        }
    }

    fn take_bar(&self) -> Option<ProgressBar> {
        self.bar.lock().ok().and_then(|mut current| current.take())
    }
}

impl ProgressReporter for IndicatifReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::FetchingFeed { podcast, .. } => {
                self.spinner
                    .set_message(format!("{SEARCH}Fetching feed: {}", podcast.cyan()));
            }

            ProgressEvent::FeedFetched {
                podcast,
                total_episodes,
            } => {
                self.spinner.set_message(format!(
                    "{HEADPHONES}{} • {} episodes in feed",
                    podcast.bold().green(),
                    total_episodes.to_string().cyan()
                ));
            }

            ProgressEvent::DownloadStarting {
                episode_title,
                episode_number,
                content_length,
                ..
            } => {
                let label = match episode_number {
                    Some(number) => format!("#{} {}", number.cyan(), truncate_title(&episode_title, 40)),
                    None => truncate_title(&episode_title, 40),
                };
                self.start_bar(content_length.unwrap_or(0), label);
            }

            ProgressEvent::DownloadProgress {
                bytes_downloaded,
                total_bytes,
                ..
            } => self.with_bar(|bar| {
                if let Some(total) = total_bytes {
                    bar.set_length(total);
                }
                bar.set_position(bytes_downloaded);
            }),

            ProgressEvent::DownloadCompleted {
                episode_title,
                bytes_downloaded,
            } => {
                if let Some(bar) = self.take_bar() {
                    bar.set_position(bytes_downloaded);
                    bar.finish_and_clear();
                }
                self.spinner.println(format!(
                    "  {SUCCESS}{}",
                    truncate_title(&episode_title, 60).green()
                ));
            }

            ProgressEvent::DownloadFailed {
                episode_title,
                error,
            } => {
                if let Some(bar) = self.take_bar() {
                    bar.finish_and_clear();
                }
                self.spinner.println(format!(
                    "  {FAILURE}{} - {}",
                    truncate_title(&episode_title, 30).red(),
                    error.red()
                ));
            }

            ProgressEvent::EpisodeHalted { title, reason } => {
                self.spinner.println(format!(
                    "  {STOP}Stopped at {}: {}",
                    truncate_title(&title, 40).yellow(),
                    reason.to_string().dimmed()
                ));
            }

            ProgressEvent::EpisodeDeleted { path, .. } => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                self.spinner
                    .println(format!("  {TRASH}Removed {}", name.dimmed()));
            }

            ProgressEvent::ScrapeCompleted {
                podcast,
                downloaded_count,
                skipped_count,
                failed_count,
                deleted_count,
                ..
            } => {
                self.spinner.finish_and_clear();
                println!(
                    "{PARTY}{} {} downloaded, {} skipped, {} failed, {} deleted",
                    format!("{podcast}:").bold().green(),
                    downloaded_count.to_string().green().bold(),
                    skipped_count.to_string().yellow(),
                    if failed_count > 0 {
                        failed_count.to_string().red().bold()
                    } else {
                        failed_count.to_string().green()
                    },
                    deleted_count.to_string().dimmed()
                );
            }

            // Skips, cleanup and first-run notices only go to the log
            _ => {}
        }
    }
}

fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() <= max_len {
        title.to_string()
    } else {
        let kept: String = title.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// Install the tracing subscriber. `RUST_LOG` wins over the configured level.
fn init_logging(general: &GeneralSettings) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(general.log_level.as_deref().unwrap_or("info")))
        .context("Invalid log level")?;

    match &general.log_file {
        Some(path) => {
            let file = open_log_file(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }

    Ok(())
}

fn open_log_file(path: &Path) -> Result<std::fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = ConfigFile::load(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config.display()))?;

    init_logging(&config.general)?;

    if !args.quiet {
        println!(
            "\n{}{} {}\n",
            MICROPHONE,
            "podcast-scraper".bold().magenta(),
            "- Podcast Feed Scraper".dimmed()
        );
    }

    let client = ReqwestClient::new().context("Failed to build HTTP client")?;

    let scrapers = config.enabled_scrapers();
    info!(count = scrapers.len(), config = %args.config.display(), "starting run");

    for (id, resolved) in scrapers {
        let scraper_config = match resolved {
            Ok(scraper_config) => scraper_config,
            Err(e) => {
                error!(scraper = %id, error = %e, "skipping misconfigured scraper");
                if !args.quiet {
                    println!("{CROSS}{} {}", id.yellow(), e.to_string().red());
                }
                continue;
            }
        };

        let terminal: SharedProgressReporter = if args.quiet {
            NoopReporter::shared()
        } else {
            Arc::new(IndicatifReporter::new()?)
        };
        let reporter: SharedProgressReporter =
            Arc::new(FanoutReporter::new(vec![TracingReporter::shared(), terminal]));

        match run_scraper(scraper_config, client.clone(), reporter).await {
            Ok(summary) => {
                info!(
                    scraper = %id,
                    evaluated = summary.evaluated,
                    halted = summary.state == ScrapeState::Halted,
                    "scraper finished"
                );

                if !args.quiet && !summary.failed_episodes.is_empty() {
                    println!("\n{}", "Failed episodes:".red().bold());
                    for (title, error) in &summary.failed_episodes {
                        println!("  {}{} - {}", CROSS, title.yellow(), error.dimmed());
                    }
                }
            }
            Err(e) => {
                error!(scraper = %id, error = %e, "scraper failed");
                if !args.quiet {
                    println!("{FAILURE}{} {}", id.yellow(), e.to_string().red());
                }
            }
        }
    }

    info!("run complete");
    Ok(())
}
