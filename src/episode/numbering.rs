use std::path::Path;
use std::time::SystemTime;

use regex::Regex;

use crate::error::EpisodeError;

/// Split a title like `"12: Title"` or `"12-Title"` into number and title
/// without a regex.
///
/// Returns `None` when the title does not start with a digit. The single
/// character after the number is treated as a separator and dropped.
pub fn simple_title_parsing(original_title: &str) -> Option<(String, String)> {
    let digits_end = original_title
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(original_title.len(), |(i, _)| i);

    if digits_end == 0 {
        return None;
    }

    let episode = original_title[..digits_end].to_string();
    let mut rest = original_title[digits_end..].chars();
    rest.next();
    let title = rest.as_str().trim().to_string();

    Some((episode, title))
}

/// Extract `(episode number, title)` from the first two capture groups of
/// `pattern`, searched anywhere in the title.
pub fn parse_title(pattern: &Regex, title: &str) -> Option<(String, String)> {
    if pattern.captures_len() < 3 {
        return None;
    }

    let caps = pattern.captures(title)?;
    let episode = caps.get(1)?.as_str().to_string();
    let parsed_title = caps.get(2)?.as_str().to_string();
    Some((episode, parsed_title))
}

/// Determine the next episode number from what is already in the podcast home
///
/// Used when neither the feed metadata nor the title carries a number.
/// An absent or empty directory means episode 1; otherwise the leading
/// number of the most recently modified `.mp3` file is incremented.
pub fn infer_next_episode_number(home: &Path) -> Result<u32, EpisodeError> {
    if !home.exists() {
        return Ok(1);
    }

    let entries = std::fs::read_dir(home).map_err(|e| EpisodeError::Inventory {
        path: home.to_path_buf(),
        source: e,
    })?;

    let mut newest: Option<(SystemTime, String)> = None;
    for entry in entries {
        let entry = entry.map_err(|e| EpisodeError::Inventory {
            path: home.to_path_buf(),
            source: e,
        })?;

        let path = entry.path();
        let is_mp3 = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("mp3"));
        if !is_mp3 || !path.is_file() {
            continue;
        }

        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .map_err(|e| EpisodeError::Inventory {
                path: path.clone(),
                source: e,
            })?;
        let name = entry.file_name().to_string_lossy().into_owned();

        if newest.as_ref().is_none_or(|(t, n)| (modified, &name) > (*t, n)) {
            newest = Some((modified, name));
        }
    }

    let Some((_, newest_name)) = newest else {
        return Ok(1);
    };

    simple_title_parsing(&newest_name)
        .and_then(|(episode, _)| episode.parse::<u32>().ok())
        .and_then(|number| number.checked_add(1))
        .ok_or(EpisodeError::UninferableNumber(newest_name))
}
