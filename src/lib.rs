pub mod cancel;
pub mod config;
pub mod error;
pub mod failures;
pub mod feed;
pub mod flatten;
pub mod http;
pub mod logging;
pub mod naming;
pub mod opml;
pub mod plan;
pub mod pool;
pub mod progress;
pub mod queue;
pub mod source;
pub mod task;

// Re-export main types for convenience
pub use cancel::CancellationController;
pub use config::{DEFAULT_CONFIG_FILE, PartialSettings, Settings};
pub use error::{
    ConfigError, ExtensionError, FeedError, LoggingError, OpmlError, PrepareError, QueueError,
    SourceError, TaskError,
};
pub use failures::FailureLog;
pub use feed::{Enclosure, Episode, FetchOutcome, Podcast, fetch_podcast, fetch_podcasts, parse_feed};
pub use flatten::{FlattenOutput, destination_exists, flatten_and_skip_existing};
pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use plan::build_work_units;
pub use pool::{PoolOptions, RunSummary, run};
pub use progress::{NoopReporter, ProgressEvent, ProgressReporter, SharedProgressReporter};
pub use queue::WorkQueue;
pub use source::{FeedSources, dedup_urls};
pub use task::{EpisodeWorkUnit, FeedWorkUnit, JobKind, Task, TextTask, UrlTask, execute};
