// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

/// Destinations of tasks that failed, appended to by every worker
#[derive(Debug, Default)]
pub struct FailureLog {
    paths: Mutex<Vec<PathBuf>>,
}

impl FailureLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, path: PathBuf) {
        self.paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path);
    }

    pub fn len(&self) -> usize {
        self.paths.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hand out the collected paths once no worker holds a reference anymore
    pub fn into_paths(self) -> Vec<PathBuf> {
        self.paths.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}
