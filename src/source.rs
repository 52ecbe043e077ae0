// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::info;
use url::Url;

use crate::error::SourceError;
use crate::http::HttpClient;
use crate::opml::load_opml;

/// Where feed URLs come from. The first one set wins: OPML, then list file, then a single URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedSources {
    pub rss: Option<String>,
    pub list: Option<PathBuf>,
    pub opml: Option<String>,
}

impl FeedSources {
    pub fn is_empty(&self) -> bool {
        self.rss.is_none() && self.list.is_none() && self.opml.is_none()
    }

    /// Resolve the configured source into a list of feed URLs
    pub async fn load_feed_urls<C: HttpClient + ?Sized>(
        &self,
        client: &C,
    ) -> Result<Vec<String>, SourceError> {
        if let Some(opml) = &self.opml {
            info!(opml = %opml, "Loading feed URLs from OPML");
            Ok(load_opml(client, opml).await?)
        } else if let Some(list) = &self.list {
            info!(list = %list.display(), "Loading feed URLs from list file");
            read_feed_list(list).await
        } else if let Some(rss) = &self.rss {
            info!(rss = %rss, "Using single feed URL");
            Ok(vec![rss.clone()])
        } else {
            Err(SourceError::NoSource)
        }
    }
}

/// True for absolute http(s) URLs with a host
pub fn is_http_url(candidate: &str) -> bool {
    Url::parse(candidate)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host().is_some())
        .unwrap_or(false)
}

/// Read a feed list file: one URL per line, anything else is ignored
pub async fn read_feed_list(path: &Path) -> Result<Vec<String>, SourceError> {
    let content =
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SourceError::ListReadFailed {
                path: path.to_path_buf(),
                source: e,
            })?;

    Ok(parse_feed_list(&content))
}

fn parse_feed_list(content: &str) -> Vec<String> {
    // `lines` already strips a trailing '\r'
    content
        .lines()
        .map(str::trim)
        .filter(|line| is_http_url(line))
        .map(String::from)
        .collect()
}

/// Split `urls` into unique URLs (first occurrence order) and the repeated ones
pub fn dedup_urls(urls: Vec<String>) -> (Vec<String>, Vec<String>) {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(urls.len());
    let mut duplicates = Vec::new();

    for url in urls {
        if seen.insert(url.clone()) {
            unique.push(url);
        } else {
            duplicates.push(url);
        }
    }

    (unique, duplicates)
}
