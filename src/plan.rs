// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Turning parsed feeds into the on-disk layout of work units.
//!
//! ```text
//! <output>/<feed>/rss.xml
//! <output>/<feed>/cover.<ext>
//! <output>/<feed>/<episode>/shownotes.html
//! <output>/<feed>/<episode>/cover.<ext>
//! <output>/<feed>/<episode>/<episode>[_N].<ext>
//! ```

use std::path::Path;

use tracing::warn;

use crate::feed::{Episode, Podcast};
use crate::http::HttpClient;
use crate::naming::{enclosure_file_name, resolve_extension, sanitize_file_name};
use crate::task::{EpisodeWorkUnit, FeedWorkUnit, JobKind, TextTask, UrlTask};

const FEED_DOCUMENT_FILENAME: &str = "rss.xml";
const SHOWNOTES_FILENAME: &str = "shownotes.html";
const COVER_STEM: &str = "cover";

/// Build one work unit per podcast, rooted under `output_root`
///
/// Covers and enclosures whose file extension cannot be determined are
/// left out with a warning; everything else of the feed is kept.
pub async fn build_work_units<C: HttpClient + ?Sized>(
    client: &C,
    podcasts: &[Podcast],
    output_root: &Path,
) -> Vec<FeedWorkUnit> {
    let mut units = Vec::with_capacity(podcasts.len());
    for podcast in podcasts {
        units.push(build_feed_unit(client, podcast, output_root).await);
    }
    units
}

async fn build_feed_unit<C: HttpClient + ?Sized>(
    client: &C,
    podcast: &Podcast,
    output_root: &Path,
) -> FeedWorkUnit {
    let base_dest_dir = output_root.join(sanitize_file_name(&podcast.title));

    let cover_task = match &podcast.image_url {
        Some(image_url) => {
            cover_task(client, image_url.as_str(), &podcast.title, &base_dest_dir).await
        }
        None => None,
    };

    let mut episodes = Vec::with_capacity(podcast.episodes.len());
    for episode in &podcast.episodes {
        episodes.push(build_episode_unit(client, &podcast.title, episode, &base_dest_dir).await);
    }

    FeedWorkUnit {
        feed_title: podcast.title.clone(),
        feed_doc_task: UrlTask {
            job_name: format!("{} | RSS", podcast.title),
            job_kind: JobKind::Rss,
            source_url: podcast.feed_url.clone(),
            destination_path: base_dest_dir.join(FEED_DOCUMENT_FILENAME),
        },
        cover_task,
        episodes,
        base_dest_dir,
    }
}

async fn build_episode_unit<C: HttpClient + ?Sized>(
    client: &C,
    feed_title: &str,
    episode: &Episode,
    feed_dir: &Path,
) -> EpisodeWorkUnit {
    let safe_title = sanitize_file_name(&episode.title);
    let base_dest_dir = feed_dir.join(&safe_title);
    let job_name = format!("{} - {}", feed_title, episode.title);

    let cover_task = match &episode.image_url {
        Some(image_url) => cover_task(client, image_url.as_str(), &job_name, &base_dest_dir).await,
        None => None,
    };

    let shownotes_task = episode.description.as_ref().map(|description| TextTask {
        job_name: job_name.clone(),
        content: description.clone(),
        destination_path: base_dest_dir.join(SHOWNOTES_FILENAME),
    });

    let count = episode.enclosures.len();
    let mut enclosure_tasks = Vec::with_capacity(count);
    for (index, enclosure) in episode.enclosures.iter().enumerate() {
        let url = enclosure.url.as_str();
        let ext = match resolve_extension(client, url, enclosure.mime_type.as_deref()).await {
            Ok(ext) => ext,
            Err(e) => {
                warn!(
                    feed = %feed_title,
                    episode = %episode.title,
                    error = %e,
                    "Skipping enclosure with unknown file type"
                );
                continue;
            }
        };

        let enclosure_job_name = if count == 1 {
            job_name.clone()
        } else {
            format!("{} #{}", job_name, index + 1)
        };

        enclosure_tasks.push(UrlTask {
            job_name: enclosure_job_name,
            job_kind: JobKind::Enclosure,
            source_url: url.to_string(),
            destination_path: base_dest_dir.join(enclosure_file_name(&safe_title, &ext, index, count)),
        });
    }

    EpisodeWorkUnit {
        episode_title: episode.title.clone(),
        base_dest_dir,
        enclosure_tasks,
        cover_task,
        shownotes_task,
    }
}

async fn cover_task<C: HttpClient + ?Sized>(
    client: &C,
    image_url: &str,
    job_name: &str,
    dir: &Path,
) -> Option<UrlTask> {
    match resolve_extension(client, image_url, None).await {
        Ok(ext) => Some(UrlTask {
            job_name: job_name.to_string(),
            job_kind: JobKind::Cover,
            source_url: image_url.to_string(),
            destination_path: dir.join(format!("{COVER_STEM}.{ext}")),
        }),
        Err(e) => {
            warn!(job = %job_name, error = %e, "Skipping cover with unknown file type");
            None
        }
    }
}
