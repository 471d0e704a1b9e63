use std::ffi::OsString;
use std::path::{Path, PathBuf};

use futures::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::config::ScraperConfig;
use crate::error::DownloadError;
use crate::http::{HttpClient, HttpResponse};
use crate::progress::{ProgressEvent, SharedProgressReporter};

use super::EpisodeRecord;

/// Outcome of a successful download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadResult {
    pub path: PathBuf,
    pub bytes_downloaded: u64,
}

/// Temporary name an episode is streamed to before it is moved into place
pub fn partial_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".partial");
    PathBuf::from(name)
}

/// Download an episode to its computed download path
///
/// Creates any missing directories, streams the body chunk by chunk into a
/// `.partial` file and renames it over the final path once complete. On
/// failure the partial file is removed, so the final path only ever holds a
/// complete episode. After every response from the server the configured
/// throttle delay is observed.
pub async fn download_episode<C: HttpClient>(
    client: &C,
    config: &ScraperConfig,
    episode: &EpisodeRecord,
    reporter: &SharedProgressReporter,
) -> Result<DownloadResult, DownloadError> {
    let url = episode
        .url
        .as_ref()
        .ok_or_else(|| DownloadError::MissingUrl {
            title: episode.raw_title().to_string(),
        })?
        .as_str();
    let output_path = episode
        .download_path
        .as_deref()
        .ok_or_else(|| DownloadError::MissingPath {
            title: episode.raw_title().to_string(),
        })?;

    if let Some(parent) = output_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| DownloadError::CreateDirectoryFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
    }

    let response = client
        .get_stream(url)
        .await
        .map_err(|e| DownloadError::HttpFailed {
            url: url.to_string(),
            source: e,
        })?;

    let result = if response.status >= 400 {
        Err(DownloadError::HttpStatus {
            url: url.to_string(),
            status: response.status,
        })
    } else {
        let partial = partial_path(output_path);
        let finalized = match stream_to_file(url, response, &partial, episode, reporter).await {
            Ok(bytes_downloaded) => tokio::fs::rename(&partial, output_path)
                .await
                .map(|()| bytes_downloaded)
                .map_err(|e| DownloadError::FinalizeFailed {
                    from: partial.clone(),
                    to: output_path.to_path_buf(),
                    source: e,
                }),
            Err(e) => Err(e),
        };

        if finalized.is_err() {
            let _ = tokio::fs::remove_file(&partial).await;
        }

        finalized.map(|bytes_downloaded| DownloadResult {
            path: output_path.to_path_buf(),
            bytes_downloaded,
        })
    };

    // Delay to not overload servers
    tokio::time::sleep(config.throttle).await;

    if let Ok(done) = &result {
        reporter.report(ProgressEvent::DownloadCompleted {
            episode_title: episode.title.clone(),
            bytes_downloaded: done.bytes_downloaded,
        });
    }

    result
}

async fn stream_to_file(
    url: &str,
    response: HttpResponse,
    path: &Path,
    episode: &EpisodeRecord,
    reporter: &SharedProgressReporter,
) -> Result<u64, DownloadError> {
    reporter.report(ProgressEvent::DownloadStarting {
        episode_title: episode.title.clone(),
        episode_number: episode.episode_number.clone(),
        path: episode.download_path.clone().unwrap_or_default(),
        content_length: response.content_length,
    });

    let mut file = File::create(path)
        .await
        .map_err(|e| DownloadError::FileCreateFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    let mut bytes_downloaded: u64 = 0;
    let mut stream = response.body;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::StreamFailed {
            url: url.to_string(),
            source: e,
        })?;

        file.write_all(&chunk)
            .await
            .map_err(|e| DownloadError::FileWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;

        bytes_downloaded += chunk.len() as u64;

        reporter.report(ProgressEvent::DownloadProgress {
            episode_title: episode.title.clone(),
            bytes_downloaded,
            total_bytes: response.content_length,
        });
    }

    // Ensure all data is flushed to disk before the rename
    file.flush()
        .await
        .map_err(|e| DownloadError::FileWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    Ok(bytes_downloaded)
}
