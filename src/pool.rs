// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Draining a [`WorkQueue`] with a fixed number of workers.
//!
//! A single feeder moves tasks from the queue into a handoff channel whose
//! capacity equals the worker count; workers share the receiving end and
//! exit once it is closed. The feeder polls the cancellation token before
//! every dispatch. Once cancelled, dispatch stops, the channel is closed
//! and whatever is still buffered is discarded, even when the queue had
//! already run dry. Running tasks are always allowed to finish.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::future;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::failures::FailureLog;
use crate::http::HttpClient;
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::queue::WorkQueue;
use crate::task::{Task, execute};

/// Default number of concurrent workers
pub const DEFAULT_THREAD_COUNT: usize = 3;

/// Options for a download run
#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// Upper bound on concurrent workers
    pub thread_count: usize,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            thread_count: DEFAULT_THREAD_COUNT,
        }
    }
}

/// Outcome of a download run
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Destinations of tasks that were attempted and failed
    pub failed: Vec<PathBuf>,
    pub succeeded: usize,
    /// Tasks handed off but never started because of cancellation
    pub discarded: usize,
    /// Tasks never taken from the queue because of cancellation
    pub remaining: usize,
    /// Number of workers actually started
    pub workers: usize,
    pub cancelled: bool,
}

impl RunSummary {
    /// Tasks that were never started, whether buffered or still queued
    pub fn not_started(&self) -> usize {
        self.discarded + self.remaining
    }
}

type SharedReceiver = Arc<Mutex<mpsc::Receiver<Task>>>;

impl WorkQueue {
    /// Run every queued task and wait until all workers have exited.
    ///
    /// At most `min(thread_count, len())` workers are started. Task failures
    /// are collected, never propagated; cancellation ends the run early with
    /// unstarted tasks left in the queue or counted as discarded.
    pub async fn start_download<C>(
        &self,
        client: &C,
        options: &PoolOptions,
        cancel: &CancellationToken,
        reporter: &SharedProgressReporter,
    ) -> RunSummary
    where
        C: HttpClient + Clone + 'static,
    {
        let workers = options.thread_count.max(1).min(self.len());
        if workers == 0 {
            return RunSummary {
                cancelled: cancel.is_cancelled(),
                ..Default::default()
            };
        }

        info!(tasks = self.len(), workers, "Starting download run");

        let (handoff_tx, handoff_rx) = mpsc::channel(workers);
        let handoff_rx: SharedReceiver = Arc::new(Mutex::new(handoff_rx));
        let failures = Arc::new(FailureLog::new());
        let succeeded = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..workers)
            .map(|worker_id| {
                tokio::spawn(work(
                    worker_id,
                    client.clone(),
                    Arc::clone(&handoff_rx),
                    cancel.clone(),
                    Arc::clone(reporter),
                    Arc::clone(&failures),
                    Arc::clone(&succeeded),
                ))
            })
            .collect();

        self.feed(handoff_tx, cancel).await;

        // The handoff may still hold tasks after the queue ran dry, so a
        // cancellation is watched until the last worker has exited
        let mut workers_done = future::join_all(handles);
        let joined = tokio::select! {
            results = &mut workers_done => Some(results),
            _ = cancel.cancelled() => None,
        };

        let mut discarded = 0;
        if cancel.is_cancelled() {
            discarded = discard_handoff(&handoff_rx).await;
            info!(discarded, remaining = self.len(), "Download run cancelled");
            reporter.report(ProgressEvent::Cancelled { discarded });
        }

        let results = match joined {
            Some(results) => results,
            None => workers_done.await,
        };
        for result in results {
            if let Err(e) = result {
                error!(error = %e, "Worker terminated abnormally");
            }
        }

        // Every worker has exited, so this is the last reference
        let failed = match Arc::try_unwrap(failures) {
            Ok(log) => log.into_paths(),
            Err(_) => Vec::new(),
        };

        RunSummary {
            failed,
            succeeded: succeeded.load(Ordering::SeqCst),
            discarded,
            remaining: self.len(),
            workers,
            cancelled: cancel.is_cancelled(),
        }
    }

    /// Move tasks into the handoff channel until the queue runs dry or the
    /// run is cancelled. Dropping the sender on return closes the handoff.
    async fn feed(&self, handoff_tx: mpsc::Sender<Task>, cancel: &CancellationToken) {
        loop {
            // A slot is reserved before dequeuing so no task is ever held back
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Cancelled, feeder stops dispatching");
                    return;
                }
                permit = handoff_tx.reserve() => match permit {
                    Ok(permit) => permit,
                    Err(_) => {
                        warn!("All workers gone, stopping feeder");
                        return;
                    }
                },
            };

            let Ok(task) = self.dequeue() else {
                debug!("Queue drained, closing handoff");
                return;
            };
            permit.send(task);
        }
    }
}

/// Close the handoff and count the tasks still buffered in it.
///
/// Workers release the receiver as soon as they observe cancellation.
async fn discard_handoff(handoff_rx: &SharedReceiver) -> usize {
    let mut rx = handoff_rx.lock().await;
    rx.close();
    let mut discarded = 0;
    while rx.try_recv().is_ok() {
        discarded += 1;
    }
    discarded
}

/// Run `tasks` to completion with a fresh queue
pub async fn run<C>(
    tasks: Vec<Task>,
    client: &C,
    options: &PoolOptions,
    cancel: &CancellationToken,
    reporter: &SharedProgressReporter,
) -> RunSummary
where
    C: HttpClient + Clone + 'static,
{
    WorkQueue::from_tasks(tasks)
        .start_download(client, options, cancel, reporter)
        .await
}

async fn work<C: HttpClient>(
    worker_id: usize,
    client: C,
    handoff_rx: SharedReceiver,
    cancel: CancellationToken,
    reporter: SharedProgressReporter,
    failures: Arc<FailureLog>,
    succeeded: Arc<AtomicUsize>,
) {
    loop {
        let next = {
            let mut rx = handoff_rx.lock().await;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                task = rx.recv() => task,
            }
        };
        let Some(task) = next else {
            break;
        };

        match execute(&client, &task, worker_id, &reporter).await {
            Ok(bytes) => {
                succeeded.fetch_add(1, Ordering::SeqCst);
                info!(
                    worker_id,
                    job = %task.job_name(),
                    kind = %task.job_kind(),
                    destination = %task.destination_path().display(),
                    bytes,
                    "Downloaded"
                );
            }
            Err(e) => {
                warn!(
                    worker_id,
                    job = %task.job_name(),
                    destination = %task.destination_path().display(),
                    error = %e,
                    "Task failed"
                );
                failures.record(task.destination_path().to_path_buf());
                reporter.report(ProgressEvent::TaskFailed {
                    worker_id,
                    job_name: task.job_name().to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    debug!(worker_id, "Worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{ByteStream, HttpResponse};
    use crate::progress::{NoopReporter, ProgressReporter};
    use crate::task::{JobKind, TextTask, UrlTask};
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::collections::HashSet;
    use std::path::Path;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;
    use tempfile::tempdir;

    /// Serves a short body, or a 500 for URLs containing "fail"
    #[derive(Clone, Default)]
    struct MockHttpClient {
        delay: Option<Duration>,
    }

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn get_bytes(&self, _url: &str) -> Result<Bytes, reqwest::Error> {
            unimplemented!()
        }

        async fn get_stream(&self, url: &str) -> Result<HttpResponse, reqwest::Error> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            let status = if url.contains("fail") { 500 } else { 200 };
            let stream: ByteStream = Box::pin(futures::stream::once(async {
                Ok(Bytes::from_static(b"payload"))
            }));

            Ok(HttpResponse {
                status,
                content_length: Some(7),
                body: stream,
            })
        }

        async fn content_type(&self, _url: &str) -> Result<Option<String>, reqwest::Error> {
            Ok(None)
        }
    }

    /// Records worker ids and cancels the token after `cancel_after` completions
    struct RecordingReporter {
        worker_ids: StdMutex<HashSet<usize>>,
        completed: AtomicUsize,
        cancel_after: Option<(usize, CancellationToken)>,
    }

    impl RecordingReporter {
        fn new(cancel_after: Option<(usize, CancellationToken)>) -> Arc<Self> {
            Arc::new(Self {
                worker_ids: StdMutex::new(HashSet::new()),
                completed: AtomicUsize::new(0),
                cancel_after,
            })
        }
    }

    impl ProgressReporter for RecordingReporter {
        fn report(&self, event: ProgressEvent) {
            match event {
                ProgressEvent::TaskStarting { worker_id, .. } => {
                    self.worker_ids.lock().unwrap().insert(worker_id);
                }
                ProgressEvent::TaskCompleted { .. } => {
                    let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some((limit, token)) = &self.cancel_after
                        && done >= *limit
                    {
                        token.cancel();
                    }
                }
                _ => {}
            }
        }
    }

    fn url_tasks(dir: &Path, count: usize, failing: impl Fn(usize) -> bool) -> Vec<Task> {
        (0..count)
            .map(|i| {
                let name = if failing(i) { "fail" } else { "ok" };
                Task::from(UrlTask {
                    job_name: format!("job {i}"),
                    job_kind: JobKind::Enclosure,
                    source_url: format!("https://example.com/{name}/{i}.mp3"),
                    destination_path: dir.join(format!("{i}.mp3")),
                })
            })
            .collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn half_failing_tasks_are_all_reported_once() {
        let dir = tempdir().unwrap();
        let tasks = url_tasks(dir.path(), 1000, |i| i % 2 == 1);
        let expected: HashSet<PathBuf> = (0..1000)
            .filter(|i| i % 2 == 1)
            .map(|i| dir.path().join(format!("{i}.mp3")))
            .collect();

        let summary = run(
            tasks,
            &MockHttpClient::default(),
            &PoolOptions { thread_count: 8 },
            &CancellationToken::new(),
            &NoopReporter::shared(),
        )
        .await;

        assert!(!summary.cancelled);
        assert_eq!(summary.workers, 8);
        assert_eq!(summary.succeeded, 500);
        assert_eq!(summary.failed.len(), 500);

        let failed: HashSet<PathBuf> = summary.failed.into_iter().collect();
        assert_eq!(failed, expected);
        assert!(dir.path().join("0.mp3").exists());
        assert!(!dir.path().join("1.mp3").exists());
    }

    #[tokio::test]
    async fn worker_count_is_clamped_to_task_count() {
        let dir = tempdir().unwrap();
        let tasks = url_tasks(dir.path(), 3, |_| false);
        let reporter = RecordingReporter::new(None);
        let shared: SharedProgressReporter = reporter.clone();

        let summary = run(
            tasks,
            &MockHttpClient::default(),
            &PoolOptions { thread_count: 10 },
            &CancellationToken::new(),
            &shared,
        )
        .await;

        assert_eq!(summary.workers, 3);
        assert_eq!(summary.succeeded, 3);
        let ids = reporter.worker_ids.lock().unwrap();
        assert!(ids.iter().all(|&id| id < 3));
    }

    #[tokio::test]
    async fn zero_threads_still_runs_one_worker() {
        let dir = tempdir().unwrap();
        let summary = run(
            url_tasks(dir.path(), 2, |_| false),
            &MockHttpClient::default(),
            &PoolOptions { thread_count: 0 },
            &CancellationToken::new(),
            &NoopReporter::shared(),
        )
        .await;

        assert_eq!(summary.workers, 1);
        assert_eq!(summary.succeeded, 2);
    }

    #[tokio::test]
    async fn empty_queue_returns_immediately() {
        let summary = WorkQueue::new()
            .start_download(
                &MockHttpClient::default(),
                &PoolOptions::default(),
                &CancellationToken::new(),
                &NoopReporter::shared(),
            )
            .await;

        assert_eq!(summary.workers, 0);
        assert_eq!(summary.succeeded, 0);
        assert!(summary.failed.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn cancellation_stops_dispatch_without_losing_accounting() {
        let dir = tempdir().unwrap();
        let total = 200;
        let tasks = url_tasks(dir.path(), total, |i| i % 10 == 0);
        let queue = WorkQueue::from_tasks(tasks);

        let cancel = CancellationToken::new();
        let reporter = RecordingReporter::new(Some((10, cancel.clone())));
        let shared: SharedProgressReporter = reporter.clone();
        let client = MockHttpClient {
            delay: Some(Duration::from_millis(2)),
        };

        let summary = tokio::time::timeout(
            Duration::from_secs(10),
            queue.start_download(&client, &PoolOptions { thread_count: 4 }, &cancel, &shared),
        )
        .await
        .expect("cancelled run must not hang");

        assert!(summary.cancelled);
        assert!(summary.succeeded >= 10);

        let attempted = summary.succeeded + summary.failed.len();
        assert!(attempted < total);
        assert_eq!(summary.remaining, queue.len());
        assert_eq!(attempted + summary.discarded + summary.remaining, total);

        // Only attempted tasks can show up as failures
        for path in &summary.failed {
            assert!(!path.exists());
            let index: usize = path
                .file_stem()
                .unwrap()
                .to_str()
                .unwrap()
                .parse()
                .unwrap();
            assert_eq!(index % 10, 0);
        }
    }

    #[tokio::test]
    async fn cancelled_before_start_runs_nothing() {
        let dir = tempdir().unwrap();
        let queue = WorkQueue::from_tasks(url_tasks(dir.path(), 5, |_| false));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = queue
            .start_download(
                &MockHttpClient::default(),
                &PoolOptions { thread_count: 2 },
                &cancel,
                &NoopReporter::shared(),
            )
            .await;

        assert!(summary.cancelled);
        assert_eq!(summary.succeeded, 0);
        assert_eq!(summary.discarded, 0);
        assert_eq!(queue.len(), 5);
        assert_eq!(summary.remaining, 5);
        assert_eq!(summary.not_started(), 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn cancellation_after_queue_ran_dry_discards_buffered_tasks() {
        let dir = tempdir().unwrap();
        let total = 3;
        let cancel = CancellationToken::new();
        let reporter = RecordingReporter::new(Some((1, cancel.clone())));
        let shared: SharedProgressReporter = reporter.clone();
        let client = MockHttpClient {
            delay: Some(Duration::from_millis(100)),
        };

        // Two workers take two tasks; the third waits in the handoff while
        // the queue itself is already empty
        let summary = tokio::time::timeout(
            Duration::from_secs(10),
            run(
                url_tasks(dir.path(), total, |_| false),
                &client,
                &PoolOptions { thread_count: 2 },
                &cancel,
                &shared,
            ),
        )
        .await
        .expect("cancelled run must not hang");

        assert!(summary.cancelled);
        assert_eq!(summary.remaining, 0);
        assert!(summary.discarded >= 1);
        assert_eq!(
            summary.succeeded + summary.failed.len() + summary.discarded,
            total
        );
        assert!(!dir.path().join("2.mp3").exists());
    }

    #[tokio::test]
    async fn cancellation_after_last_task_leaves_nothing_unstarted() {
        let dir = tempdir().unwrap();
        let cancel = CancellationToken::new();
        let reporter = RecordingReporter::new(Some((1, cancel.clone())));
        let shared: SharedProgressReporter = reporter.clone();

        let summary = run(
            url_tasks(dir.path(), 1, |_| false),
            &MockHttpClient::default(),
            &PoolOptions { thread_count: 2 },
            &cancel,
            &shared,
        )
        .await;

        assert!(summary.cancelled);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.not_started(), 0);
    }

    #[tokio::test]
    async fn text_and_url_tasks_share_the_pool() {
        let dir = tempdir().unwrap();
        let mut tasks = url_tasks(dir.path(), 2, |i| i == 1);
        tasks.push(Task::from(TextTask {
            job_name: "notes".to_string(),
            content: "<p>hi</p>".to_string(),
            destination_path: dir.path().join("shownotes.html"),
        }));
        tasks.push(Task::from(TextTask {
            job_name: "broken".to_string(),
            content: String::new(),
            destination_path: dir.path().join("missing/shownotes.html"),
        }));

        let summary = run(
            tasks,
            &MockHttpClient::default(),
            &PoolOptions { thread_count: 2 },
            &CancellationToken::new(),
            &NoopReporter::shared(),
        )
        .await;

        assert_eq!(summary.succeeded, 2);
        let failed: HashSet<_> = summary.failed.into_iter().collect();
        assert_eq!(
            failed,
            HashSet::from([
                dir.path().join("1.mp3"),
                dir.path().join("missing/shownotes.html"),
            ])
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("shownotes.html")).unwrap(),
            "<p>hi</p>"
        );
    }
}
