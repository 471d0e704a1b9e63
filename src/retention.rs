// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::StateError;
use crate::progress::{ProgressEvent, SharedProgressReporter};

const PARTIAL_SUFFIX: &str = ".partial";

/// Result of pruning a directory
#[derive(Debug, Default)]
pub struct PruneOutcome {
    /// Files that were removed, oldest first
    pub deleted: Vec<PathBuf>,
    /// Files that could not be removed
    pub failed: Vec<(PathBuf, std::io::Error)>,
}

fn is_partial(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(PARTIAL_SUFFIX))
}

/// List the episode files in `dir`, oldest first
///
/// Only regular files count; subdirectories and in-flight `.partial` files
/// are ignored. Age is the creation time where the platform records one,
/// modification time otherwise. Ties are broken by file name so the order
/// is the same on every call.
pub fn episode_files(dir: &Path) -> Result<Vec<PathBuf>, StateError> {
    let read_err = |e| StateError::ReadDirectoryFailed {
        path: dir.to_path_buf(),
        source: e,
    };

    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files: Vec<(SystemTime, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let path = entry.path();
        let metadata = entry.metadata().map_err(read_err)?;

        if !metadata.is_file() || is_partial(&path) {
            continue;
        }

        let born = metadata
            .created()
            .or_else(|_| metadata.modified())
            .map_err(read_err)?;
        files.push((born, path));
    }

    files.sort();
    Ok(files.into_iter().map(|(_, path)| path).collect())
}

/// Number of episode files currently in `dir`; a missing directory holds none
pub fn count_episode_files(dir: &Path) -> std::io::Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() && !is_partial(&entry.path()) {
            count += 1;
        }
    }
    Ok(count)
}

/// Remove each file in turn
///
/// A failed removal is collected and the remaining files are still
/// attempted.
pub fn delete_files(files: impl IntoIterator<Item = PathBuf>) -> PruneOutcome {
    let mut outcome = PruneOutcome::default();
    for path in files {
        match std::fs::remove_file(&path) {
            Ok(()) => outcome.deleted.push(path),
            Err(e) => outcome.failed.push((path, e)),
        }
    }
    outcome
}

/// Delete the oldest episode files until at most `keep` remain
///
/// Individual delete failures are collected rather than aborting, so the
/// remaining deletions still happen.
pub fn prune_oldest(dir: &Path, keep: usize) -> Result<PruneOutcome, StateError> {
    let files = episode_files(dir)?;
    let overflow = files.len().saturating_sub(keep);

    Ok(delete_files(files.into_iter().take(overflow)))
}

fn report_failures(outcome: &PruneOutcome, reporter: &SharedProgressReporter) {
    for (path, error) in &outcome.failed {
        reporter.report(ProgressEvent::DeleteFailed {
            path: path.clone(),
            error: error.to_string(),
        });
    }
}

/// Make room for one more episode in `dir` under a limit of `max_episodes`
///
/// Called right before a download. One slot is reserved for the incoming
/// file, so after the download the directory holds `max_episodes` files.
/// A limit of zero means unlimited and deletes nothing. Returns the number
/// of files deleted.
pub fn enforce_limit(
    dir: &Path,
    max_episodes: usize,
    reporter: &SharedProgressReporter,
) -> Result<usize, StateError> {
    if max_episodes == 0 {
        return Ok(0);
    }

    let outcome = prune_oldest(dir, max_episodes - 1)?;

    for path in &outcome.deleted {
        reporter.report(ProgressEvent::EpisodeDeleted {
            path: path.clone(),
            limit: max_episodes,
        });
    }
    report_failures(&outcome, reporter);

    Ok(outcome.deleted.len())
}

fn partial_files(dir: &Path, found: &mut Vec<PathBuf>) -> Result<(), StateError> {
    let read_err = |e| StateError::ReadDirectoryFailed {
        path: dir.to_path_buf(),
        source: e,
    };

    for entry in std::fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let path = entry.path();

        if entry.file_type().map_err(read_err)?.is_dir() {
            partial_files(&path, found)?;
        } else if is_partial(&path) {
            found.push(path);
        }
    }

    Ok(())
}

/// Remove `.partial` files left behind by an interrupted run
///
/// Walks `dir` and its subdirectories without following symlinks. Files
/// that cannot be removed are reported and skipped. Returns how many files
/// were removed.
pub fn clean_partial_files(dir: &Path, reporter: &SharedProgressReporter) -> Result<usize, StateError> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut found = Vec::new();
    partial_files(dir, &mut found)?;

    let outcome = delete_files(found);
    report_failures(&outcome, reporter);

    Ok(outcome.deleted.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{NoopReporter, ProgressReporter};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::tempdir;

    #[derive(Default)]
    struct RecordingReporter(Mutex<Vec<ProgressEvent>>);

    impl ProgressReporter for RecordingReporter {
        fn report(&self, event: ProgressEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    /// Create files in order so both creation time and name increase
    fn create_episodes(dir: &Path, count: usize) -> Vec<PathBuf> {
        (0..count)
            .map(|i| {
                let path = dir.join(format!("ep-{i:02}.mp3"));
                std::fs::write(&path, b"audio").unwrap();
                std::thread::sleep(Duration::from_millis(15));
                path
            })
            .collect()
    }

    #[test]
    fn episode_files_lists_oldest_first() {
        let dir = tempdir().unwrap();
        let created = create_episodes(dir.path(), 3);

        assert_eq!(episode_files(dir.path()).unwrap(), created);
    }

    #[test]
    fn episode_files_ignores_directories_and_partials() {
        let dir = tempdir().unwrap();
        create_episodes(dir.path(), 2);
        std::fs::create_dir(dir.path().join("Season 01")).unwrap();
        std::fs::write(dir.path().join("ep-99.mp3.partial"), b"half").unwrap();

        assert_eq!(episode_files(dir.path()).unwrap().len(), 2);
        assert_eq!(count_episode_files(dir.path()).unwrap(), 2);
    }

    #[test]
    fn missing_directory_has_no_episodes() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");

        assert!(episode_files(&missing).unwrap().is_empty());
        assert_eq!(count_episode_files(&missing).unwrap(), 0);
    }

    #[test]
    fn prune_keeps_the_newest_files() {
        let dir = tempdir().unwrap();
        let created = create_episodes(dir.path(), 7);

        let outcome = prune_oldest(dir.path(), 4).unwrap();

        assert_eq!(outcome.deleted, created[..3].to_vec());
        assert!(outcome.failed.is_empty());
        assert_eq!(episode_files(dir.path()).unwrap(), created[3..].to_vec());
    }

    #[test]
    fn prune_is_noop_under_limit() {
        let dir = tempdir().unwrap();
        create_episodes(dir.path(), 3);

        let outcome = prune_oldest(dir.path(), 5).unwrap();

        assert!(outcome.deleted.is_empty());
        assert_eq!(count_episode_files(dir.path()).unwrap(), 3);
    }

    #[test]
    fn prune_order_is_deterministic() {
        let dir = tempdir().unwrap();
        create_episodes(dir.path(), 5);

        let first = episode_files(dir.path()).unwrap();
        let second = episode_files(dir.path()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn enforce_limit_reserves_a_slot_for_the_download() {
        let dir = tempdir().unwrap();
        let created = create_episodes(dir.path(), 5);

        let deleted = enforce_limit(dir.path(), 5, &NoopReporter::shared()).unwrap();

        assert_eq!(deleted, 1);
        assert!(!created[0].exists());
        assert_eq!(count_episode_files(dir.path()).unwrap(), 4);
    }

    #[test]
    fn enforce_limit_trims_an_overfull_directory() {
        let dir = tempdir().unwrap();
        create_episodes(dir.path(), 8);

        let deleted = enforce_limit(dir.path(), 5, &NoopReporter::shared()).unwrap();

        assert_eq!(deleted, 4);
        assert_eq!(count_episode_files(dir.path()).unwrap(), 4);
    }

    #[test]
    fn enforce_limit_with_room_deletes_nothing() {
        let dir = tempdir().unwrap();
        create_episodes(dir.path(), 2);

        assert_eq!(enforce_limit(dir.path(), 5, &NoopReporter::shared()).unwrap(), 0);
    }

    #[test]
    fn zero_limit_means_unlimited() {
        let dir = tempdir().unwrap();
        create_episodes(dir.path(), 3);

        assert_eq!(enforce_limit(dir.path(), 0, &NoopReporter::shared()).unwrap(), 0);
        assert_eq!(count_episode_files(dir.path()).unwrap(), 3);
    }

    #[test]
    fn clean_partial_files_walks_subdirectories() {
        let dir = tempdir().unwrap();
        let season = dir.path().join("Season 01");
        std::fs::create_dir(&season).unwrap();
        std::fs::write(dir.path().join("a.mp3.partial"), b"x").unwrap();
        std::fs::write(season.join("b.mp3.partial"), b"x").unwrap();
        std::fs::write(season.join("c.mp3"), b"x").unwrap();

        assert_eq!(clean_partial_files(dir.path(), &NoopReporter::shared()).unwrap(), 2);
        assert!(season.join("c.mp3").exists());
        assert!(!season.join("b.mp3.partial").exists());
    }

    #[test]
    fn delete_failure_does_not_stop_later_deletions() {
        let dir = tempdir().unwrap();
        let created = create_episodes(dir.path(), 4);
        // Gone between listing and removal
        std::fs::remove_file(&created[1]).unwrap();

        let outcome = delete_files(created[..3].to_vec());

        assert_eq!(outcome.deleted, vec![created[0].clone(), created[2].clone()]);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].0, created[1]);
        assert!(created[3].exists());
    }

    #[test]
    fn delete_failures_are_reported() {
        let dir = tempdir().unwrap();
        let created = create_episodes(dir.path(), 2);
        std::fs::remove_file(&created[0]).unwrap();

        let recorder = Arc::new(RecordingReporter::default());
        let reporter: SharedProgressReporter = recorder.clone();

        let outcome = delete_files(created.clone());
        report_failures(&outcome, &reporter);

        let events = recorder.0.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], ProgressEvent::DeleteFailed { path, .. } if *path == created[0]));
        assert!(!created[1].exists());
    }

    #[test]
    fn clean_partial_files_reports_nothing_when_all_removed() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.mp3.partial"), b"x").unwrap();

        let recorder = Arc::new(RecordingReporter::default());
        let reporter: SharedProgressReporter = recorder.clone();

        assert_eq!(clean_partial_files(dir.path(), &reporter).unwrap(), 1);
        assert!(recorder.0.lock().unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn clean_partial_files_does_not_follow_symlinks() {
        let dir = tempdir().unwrap();
        let outside = tempdir().unwrap();
        std::fs::write(outside.path().join("other.mp3.partial"), b"x").unwrap();

        let home = dir.path().join("home");
        std::fs::create_dir(&home).unwrap();
        std::os::unix::fs::symlink(outside.path(), home.join("linked")).unwrap();

        assert_eq!(clean_partial_files(&home, &NoopReporter::shared()).unwrap(), 0);
        assert!(outside.path().join("other.mp3.partial").exists());
    }
}
