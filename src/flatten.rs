// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::error::PrepareError;
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::task::{FeedWorkUnit, Task};

/// Result of flattening work units into a task list
#[derive(Debug, Default)]
pub struct FlattenOutput {
    /// Tasks in queue order
    pub tasks: Vec<Task>,
    /// Number of tasks dropped because their destination already exists
    pub skipped: usize,
    /// Destinations whose directory could not be created
    pub unprepared: Vec<PathBuf>,
}

/// Flatten work units into an ordered task list, dropping tasks already on disk
///
/// Up to `parallelism` feeds are prepared at once. Output keeps feed order,
/// and every directory a returned task writes into exists afterwards.
pub async fn flatten_and_skip_existing<E>(
    units: Vec<FeedWorkUnit>,
    parallelism: usize,
    exists: &E,
    reporter: &SharedProgressReporter,
) -> FlattenOutput
where
    E: Fn(&Path) -> bool + Sync + ?Sized,
{
    let prepared: Vec<FlattenOutput> = stream::iter(units)
        .map(|unit| prepare_feed(unit, exists, reporter))
        .buffered(parallelism.max(1))
        .collect()
        .await;

    prepared
        .into_iter()
        .fold(FlattenOutput::default(), |mut acc, feed| {
            acc.tasks.extend(feed.tasks);
            acc.skipped += feed.skipped;
            acc.unprepared.extend(feed.unprepared);
            acc
        })
}

/// Default skip check used outside of tests
pub fn destination_exists(path: &Path) -> bool {
    path.exists()
}

async fn prepare_feed<E>(
    mut unit: FeedWorkUnit,
    exists: &E,
    reporter: &SharedProgressReporter,
) -> FlattenOutput
where
    E: Fn(&Path) -> bool + Sync + ?Sized,
{
    let mut output = FlattenOutput::default();

    if let Err(e) = ensure_directory(&unit.base_dest_dir).await {
        warn!(feed = %unit.feed_title, error = %e, "Feed directory unavailable");
        output.unprepared = unit.destinations();
        return output;
    }

    output.skipped += unit.remove_existing_cover(exists);

    let episodes = std::mem::take(&mut unit.episodes);
    let mut ready = Vec::with_capacity(episodes.len());
    for mut episode in episodes {
        output.skipped += episode.remove_existing(exists);
        if episode.task_count() == 0 {
            continue;
        }

        match ensure_directory(&episode.base_dest_dir).await {
            Ok(()) => ready.push(episode),
            Err(e) => {
                warn!(
                    feed = %unit.feed_title,
                    episode = %episode.episode_title,
                    error = %e,
                    "Episode directory unavailable"
                );
                output.unprepared.extend(episode.destinations());
            }
        }
    }
    unit.episodes = ready;

    debug!(
        feed = %unit.feed_title,
        queued = unit.task_count(),
        skipped = output.skipped,
        "Feed checked"
    );
    reporter.report(ProgressEvent::FeedChecked {
        podcast_title: unit.feed_title.clone(),
        queued: unit.task_count(),
        skipped: output.skipped,
    });

    output.tasks = unit.into_tasks();
    output
}

async fn ensure_directory(path: &Path) -> Result<(), PrepareError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| PrepareError {
            path: path.to_path_buf(),
            source: e,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoopReporter;
    use crate::task::{EpisodeWorkUnit, JobKind, TextTask, UrlTask};
    use std::collections::HashSet;
    use tempfile::tempdir;

    fn url_task(kind: JobKind, dest: PathBuf) -> UrlTask {
        UrlTask {
            job_name: dest.display().to_string(),
            job_kind: kind,
            source_url: "https://example.com/file".to_string(),
            destination_path: dest,
        }
    }

    fn feed_unit(root: &Path, feed: &str, episodes: &[&str]) -> FeedWorkUnit {
        let feed_dir = root.join(feed);
        FeedWorkUnit {
            feed_title: feed.to_string(),
            episodes: episodes
                .iter()
                .map(|name| {
                    let dir = feed_dir.join(name);
                    EpisodeWorkUnit {
                        episode_title: name.to_string(),
                        enclosure_tasks: vec![
                            url_task(JobKind::Enclosure, dir.join(format!("{name}_1.mp3"))),
                            url_task(JobKind::Enclosure, dir.join(format!("{name}_2.mp3"))),
                        ],
                        cover_task: Some(url_task(JobKind::Cover, dir.join("cover.jpg"))),
                        shownotes_task: Some(TextTask {
                            job_name: name.to_string(),
                            content: "notes".to_string(),
                            destination_path: dir.join("shownotes.html"),
                        }),
                        base_dest_dir: dir,
                    }
                })
                .collect(),
            cover_task: Some(url_task(JobKind::Cover, feed_dir.join("cover.png"))),
            feed_doc_task: url_task(JobKind::Rss, feed_dir.join("rss.xml")),
            base_dest_dir: feed_dir,
        }
    }

    /// Write every task's destination as if a run had completed
    fn materialize(tasks: &[Task]) {
        for task in tasks {
            std::fs::write(task.destination_path(), b"done").unwrap();
        }
    }

    #[tokio::test]
    async fn fresh_output_queues_everything_and_creates_directories() {
        let dir = tempdir().unwrap();
        let units = vec![feed_unit(dir.path(), "show", &["a", "b"])];

        let output = flatten_and_skip_existing(
            units,
            4,
            &destination_exists,
            &NoopReporter::shared(),
        )
        .await;

        assert_eq!(output.tasks.len(), 2 + 2 * 4);
        assert_eq!(output.skipped, 0);
        assert!(output.unprepared.is_empty());
        assert!(dir.path().join("show/a").is_dir());
        assert!(dir.path().join("show/b").is_dir());
    }

    #[tokio::test]
    async fn existing_destinations_are_skipped_but_document_is_not() {
        let dir = tempdir().unwrap();
        let show = dir.path().join("show");
        std::fs::create_dir_all(show.join("a")).unwrap();
        for existing in ["rss.xml", "cover.png", "a/cover.jpg", "a/a_2.mp3"] {
            std::fs::write(show.join(existing), b"old").unwrap();
        }

        let output = flatten_and_skip_existing(
            vec![feed_unit(dir.path(), "show", &["a"])],
            1,
            &destination_exists,
            &NoopReporter::shared(),
        )
        .await;

        let queued: HashSet<_> = output
            .tasks
            .iter()
            .map(|t| t.destination_path().to_path_buf())
            .collect();
        assert_eq!(output.skipped, 3);
        assert!(queued.contains(&show.join("rss.xml")));
        assert!(queued.contains(&show.join("a/shownotes.html")));
        assert!(queued.contains(&show.join("a/a_1.mp3")));
        assert!(!queued.contains(&show.join("cover.png")));
        assert!(!queued.contains(&show.join("a/cover.jpg")));
        assert!(!queued.contains(&show.join("a/a_2.mp3")));
    }

    #[tokio::test]
    async fn second_run_only_refreshes_feed_documents() {
        let dir = tempdir().unwrap();
        let units = || {
            vec![
                feed_unit(dir.path(), "one", &["a", "b"]),
                feed_unit(dir.path(), "two", &["c"]),
            ]
        };
        let reporter = NoopReporter::shared();

        let first = flatten_and_skip_existing(units(), 2, &destination_exists, &reporter).await;
        materialize(&first.tasks);

        let second = flatten_and_skip_existing(units(), 2, &destination_exists, &reporter).await;
        assert_eq!(second.tasks.len(), 2);
        assert!(second.tasks.iter().all(|t| t.job_kind() == JobKind::Rss));
        assert_eq!(second.skipped, first.tasks.len() - 2);
    }

    #[tokio::test]
    async fn ordering_is_feed_major_regardless_of_parallelism() {
        let dir = tempdir().unwrap();
        let units = vec![
            feed_unit(dir.path(), "one", &["a"]),
            feed_unit(dir.path(), "two", &["b"]),
            feed_unit(dir.path(), "three", &["c"]),
        ];
        let expected: Vec<PathBuf> = units
            .iter()
            .cloned()
            .flat_map(FeedWorkUnit::into_tasks)
            .map(|t| t.destination_path().to_path_buf())
            .collect();

        let output =
            flatten_and_skip_existing(units, 3, &|_: &Path| false, &NoopReporter::shared()).await;
        let actual: Vec<PathBuf> = output
            .tasks
            .iter()
            .map(|t| t.destination_path().to_path_buf())
            .collect();
        assert_eq!(actual, expected);
    }

    #[tokio::test]
    async fn unwritable_feed_directory_reports_all_destinations() {
        let dir = tempdir().unwrap();
        // A file where the feed directory should go
        std::fs::write(dir.path().join("blocked"), b"").unwrap();

        let output = flatten_and_skip_existing(
            vec![
                feed_unit(dir.path(), "blocked", &["a"]),
                feed_unit(dir.path(), "fine", &["b"]),
            ],
            2,
            &destination_exists,
            &NoopReporter::shared(),
        )
        .await;

        assert_eq!(output.unprepared.len(), 6);
        assert_eq!(output.tasks.len(), 6);
        assert!(
            output
                .tasks
                .iter()
                .all(|t| t.destination_path().starts_with(dir.path().join("fine")))
        );
    }

    #[tokio::test]
    async fn fully_present_episode_needs_no_directory() {
        let dir = tempdir().unwrap();
        let units = vec![feed_unit(dir.path(), "show", &["a"])];

        let output = flatten_and_skip_existing(
            units,
            1,
            &|path: &Path| path.parent().is_some_and(|p| p.ends_with("a")),
            &NoopReporter::shared(),
        )
        .await;

        assert_eq!(output.skipped, 4);
        assert_eq!(output.tasks.len(), 2);
        assert!(!dir.path().join("show/a").exists());
    }
}
