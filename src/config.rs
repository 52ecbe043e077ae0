// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::http::DEFAULT_USER_AGENT;
use crate::pool::DEFAULT_THREAD_COUNT;
use crate::source::FeedSources;

/// Config file picked up from the working directory when no source is given
pub const DEFAULT_CONFIG_FILE: &str = ".podmirror.toml";

/// Default output directory
pub const DEFAULT_OUTPUT: &str = "podcast";

/// Settings where every value is optional, as read from the command line
/// or a TOML config file
///
/// ```toml
/// opml = "subscriptions.opml"
/// output = "/srv/podcasts"
/// thread = 6
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PartialSettings {
    pub rss: Option<String>,
    pub list: Option<PathBuf>,
    pub opml: Option<String>,
    pub output: Option<PathBuf>,
    pub ua: Option<String>,
    pub thread: Option<usize>,
}

impl PartialSettings {
    /// Read a TOML config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            source: e,
        })
    }

    fn has_source(&self) -> bool {
        self.rss.is_some() || self.list.is_some() || self.opml.is_some()
    }

    /// Fill unset values from `fallback`
    fn or(self, fallback: Self) -> Self {
        Self {
            rss: self.rss.or(fallback.rss),
            list: self.list.or(fallback.list),
            opml: self.opml.or(fallback.opml),
            output: self.output.or(fallback.output),
            ua: self.ua.or(fallback.ua),
            thread: self.thread.or(fallback.thread),
        }
    }
}

/// Fully resolved run settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub sources: FeedSources,
    pub output: PathBuf,
    pub user_agent: String,
    pub thread_count: usize,
}

impl Settings {
    /// Merge command line values with a config file.
    ///
    /// An explicit `config` path is always loaded. Otherwise `default_config`
    /// is consulted only when the command line names no feed source, and
    /// only if it exists. Command line values win over file values.
    pub fn resolve(
        cli: PartialSettings,
        config: Option<&Path>,
        default_config: &Path,
    ) -> Result<Self, ConfigError> {
        let config_path = match config {
            Some(path) => Some(path),
            None if !cli.has_source() && default_config.is_file() => Some(default_config),
            None => None,
        };

        let merged = match config_path {
            Some(path) => {
                info!(config = %path.display(), "Loading config file");
                let file = PartialSettings::load(path)?;
                let merged = cli.or(file);
                if !merged.has_source() {
                    return Err(ConfigError::MissingSource(path.to_path_buf()));
                }
                merged
            }
            None => cli,
        };

        let thread_count = merged.thread.unwrap_or(DEFAULT_THREAD_COUNT);
        if thread_count == 0 {
            return Err(ConfigError::ZeroThreads);
        }

        let settings = Self {
            sources: FeedSources {
                rss: merged.rss,
                list: merged.list,
                opml: merged.opml,
            },
            output: merged
                .output
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT)),
            user_agent: merged.ua.unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            thread_count,
        };
        debug!(?settings, "Resolved settings");
        Ok(settings)
    }
}
