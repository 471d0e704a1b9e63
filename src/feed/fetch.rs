// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;

use bytes::Bytes;

use crate::error::FeedError;
use crate::http::HttpClient;

/// Fetch raw feed bytes from a URL
pub async fn fetch_feed_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Bytes, FeedError> {
    client
        .get_bytes(url)
        .await
        .map_err(|e| FeedError::FetchFailed {
            url: url.to_string(),
            source: e,
        })
}

/// Read raw feed bytes from a local file
pub fn read_feed_file(path: &Path) -> Result<Bytes, FeedError> {
    std::fs::read(path)
        .map(Bytes::from)
        .map_err(|e| FeedError::FileReadFailed {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Load feed bytes from either a URL or a local file path
pub async fn load_feed_source<C: HttpClient>(client: &C, source: &str) -> Result<Bytes, FeedError> {
    if is_url(source) {
        fetch_feed_bytes(client, source).await
    } else {
        read_feed_file(Path::new(source))
    }
}

/// Determine if a string is a URL or a file path
pub fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}
