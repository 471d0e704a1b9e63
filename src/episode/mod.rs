mod download;
mod filename;
mod numbering;
mod record;

pub use download::{DownloadResult, download_episode, partial_path};
pub use filename::{download_path, render_template, tidy_up_title, zero_pad};
pub use numbering::{infer_next_episode_number, parse_title, simple_title_parsing};
pub use record::EpisodeRecord;
