// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod execute;
mod unit;

use std::fmt;
use std::path::{Path, PathBuf};

pub use execute::{execute, partial_path};
pub use unit::{EpisodeWorkUnit, FeedWorkUnit};

/// What a task produces, used for display and log fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Rss,
    Cover,
    Enclosure,
    Shownotes,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobKind::Rss => "RSS",
            JobKind::Cover => "Cover",
            JobKind::Enclosure => "Enclosure",
            JobKind::Shownotes => "Shownotes",
        };
        f.write_str(label)
    }
}

/// Fetch `source_url` and write the response body to `destination_path`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTask {
    pub job_name: String,
    pub job_kind: JobKind,
    pub source_url: String,
    pub destination_path: PathBuf,
}

/// Write `content` verbatim to `destination_path`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextTask {
    pub job_name: String,
    pub content: String,
    pub destination_path: PathBuf,
}

impl TextTask {
    /// Text tasks only ever carry show notes
    pub fn job_kind(&self) -> JobKind {
        JobKind::Shownotes
    }
}

/// One unit of download or write work with a fixed destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    Url(UrlTask),
    Text(TextTask),
}

impl Task {
    pub fn destination_path(&self) -> &Path {
        match self {
            Task::Url(task) => &task.destination_path,
            Task::Text(task) => &task.destination_path,
        }
    }

    pub fn job_name(&self) -> &str {
        match self {
            Task::Url(task) => &task.job_name,
            Task::Text(task) => &task.job_name,
        }
    }

    pub fn job_kind(&self) -> JobKind {
        match self {
            Task::Url(task) => task.job_kind,
            Task::Text(task) => task.job_kind(),
        }
    }
}

impl From<UrlTask> for Task {
    fn from(task: UrlTask) -> Self {
        Task::Url(task)
    }
}

impl From<TextTask> for Task {
    fn from(task: TextTask) -> Self {
        Task::Text(task)
    }
}
