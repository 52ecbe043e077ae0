// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use futures::StreamExt;
use tracing::{info, warn};

use crate::error::FeedError;
use crate::http::HttpClient;
use crate::progress::{ProgressEvent, SharedProgressReporter};

use super::parse::{Podcast, parse_feed};

/// Feeds that were parsed and feeds that could not be
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub podcasts: Vec<Podcast>,
    pub failed: Vec<(String, FeedError)>,
}

/// Fetch and parse a podcast feed from a URL
pub async fn fetch_podcast<C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
) -> Result<Podcast, FeedError> {
    let bytes = client
        .get_bytes(url)
        .await
        .map_err(|e| FeedError::FetchFailed {
            url: url.to_string(),
            source: e,
        })?;
    parse_feed(&bytes, url)
}

/// Fetch and parse many feeds, at most `parallelism` at a time.
///
/// A feed that fails does not affect the others. Parsed podcasts keep the
/// order of `urls`.
pub async fn fetch_podcasts<C: HttpClient + ?Sized>(
    client: &C,
    urls: &[String],
    parallelism: usize,
    reporter: &SharedProgressReporter,
) -> FetchOutcome {
    let results: Vec<_> = futures::stream::iter(urls)
        .map(|url| async move {
            reporter.report(ProgressEvent::FetchingFeed { url: url.clone() });
            (url, fetch_podcast(client, url).await)
        })
        .buffered(parallelism.max(1))
        .collect()
        .await;

    let mut outcome = FetchOutcome::default();
    for (url, result) in results {
        match result {
            Ok(podcast) => {
                info!(
                    url = %url,
                    title = %podcast.title,
                    episodes = podcast.episodes.len(),
                    "Parsed feed"
                );
                reporter.report(ProgressEvent::FeedParsed {
                    podcast_title: podcast.title.clone(),
                    total_episodes: podcast.episodes.len(),
                });
                outcome.podcasts.push(podcast);
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Failed to parse feed");
                reporter.report(ProgressEvent::FeedFailed {
                    url: url.clone(),
                    error: e.to_string(),
                });
                outcome.failed.push((url.clone(), e));
            }
        }
    }
    outcome
}
