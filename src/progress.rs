// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Arc;

use crate::task::JobKind;

/// Events emitted while mirroring feeds, for progress reporting
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// A feed is being fetched and parsed
    FetchingFeed { url: String },

    /// A feed has been parsed successfully
    FeedParsed {
        podcast_title: String,
        total_episodes: usize,
    },

    /// A feed could not be fetched or parsed
    FeedFailed { url: String, error: String },

    /// A feed's directories were prepared and existing files checked
    FeedChecked {
        podcast_title: String,
        queued: usize,
        skipped: usize,
    },

    /// A worker started executing a task
    TaskStarting {
        /// Identifies the worker slot (0 to workers-1)
        worker_id: usize,
        job_name: String,
        job_kind: JobKind,
        /// Expected content length in bytes, if known
        content_length: Option<u64>,
    },

    /// Transfer progress of a running task
    TaskProgress {
        worker_id: usize,
        bytes_written: u64,
        total_bytes: Option<u64>,
    },

    /// A task completed successfully
    TaskCompleted {
        worker_id: usize,
        job_name: String,
        bytes_written: u64,
    },

    /// A task failed
    TaskFailed {
        worker_id: usize,
        job_name: String,
        error: String,
    },

    /// Cancellation was observed; `discarded` queued tasks were never started
    Cancelled { discarded: usize },

    /// All workers have exited
    RunCompleted {
        succeeded_count: usize,
        failed_count: usize,
        skipped_count: usize,
    },
}

/// Trait for reporting progress events.
///
/// Workers report concurrently, so implementations must tolerate calls
/// from several tasks at once.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event
    fn report(&self, event: ProgressEvent);
}

/// A shared reference to a progress reporter
pub type SharedProgressReporter = Arc<dyn ProgressReporter>;

/// A no-op progress reporter that silently ignores all events.
/// Useful for tests or quiet mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: ProgressEvent) {}
}

impl NoopReporter {
    /// Create a new NoopReporter wrapped in an Arc
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}
