// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when fetching or parsing RSS feeds
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Failed to fetch feed from {url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to parse RSS feed {url}: {source}")]
    ParseFailed {
        url: String,
        #[source]
        source: rss::Error,
    },
}

/// Errors that can occur when reading an OPML subscription list
#[derive(Error, Debug)]
pub enum OpmlError {
    #[error("Failed to read OPML file {path}: {source}")]
    FileReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to fetch OPML from {url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Malformed OPML document: {0}")]
    Malformed(#[from] quick_xml::Error),

    #[error("Malformed OPML attribute: {0}")]
    MalformedAttribute(#[from] quick_xml::events::attributes::AttrError),
}

/// Errors resolving the list of feed URLs to mirror; all of these are fatal
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("No feed source given: specify at least one of --rss, --list or --opml")]
    NoSource,

    #[error("Failed to read feed list file {path}: {source}")]
    ListReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to load OPML: {0}")]
    Opml(#[from] OpmlError),
}

/// Errors loading or validating the configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config file {0} does not name any feed source (rss, list or opml)")]
    MissingSource(PathBuf),

    #[error("Thread count must be at least 1")]
    ZeroThreads,
}

/// Errors setting up log output
#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Failed to create log directory {path}: {source}")]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to install log subscriber: {0}")]
    InitFailed(#[from] tracing_subscriber::util::TryInitError),
}

/// Errors that can occur while executing a single task
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("HTTP request failed for {url}: {source}")]
    HttpFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to create file {path}: {source}")]
    FileCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write to file {path}: {source}")]
    FileWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Stream error while downloading {url}: {source}")]
    StreamFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Errors determining a file extension for a remote resource
#[derive(Error, Debug)]
pub enum ExtensionError {
    #[error("HEAD request failed for {url}: {source}")]
    HeadRequestFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Unknown content type {content_type:?} for {url}")]
    UnknownContentType {
        url: String,
        content_type: Option<String>,
    },
}

/// Raised when creating a destination directory fails during flattening
#[derive(Error, Debug)]
#[error("Failed to create directory {path}: {source}")]
pub struct PrepareError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Errors from the work queue
#[derive(Error, Debug, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue is empty")]
    Empty,
}
