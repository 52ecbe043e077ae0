// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use futures::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::error::TaskError;
use crate::http::{ByteStream, HttpClient};
use crate::progress::{ProgressEvent, SharedProgressReporter};

use super::{Task, TextTask, UrlTask};

const PARTIAL_SUFFIX: &str = ".partial";

/// Path a task writes to before it is moved to its destination.
///
/// The destination only ever appears once the body is complete, so an
/// interrupted transfer is retried from scratch on the next run.
pub fn partial_path(destination: &Path) -> PathBuf {
    let mut name = OsString::from(destination.as_os_str());
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Execute a task, returning the number of bytes written on success.
///
/// The destination directory must already exist.
pub async fn execute<C: HttpClient + ?Sized>(
    client: &C,
    task: &Task,
    worker_id: usize,
    reporter: &SharedProgressReporter,
) -> Result<u64, TaskError> {
    match task {
        Task::Url(task) => download(client, task, worker_id, reporter).await,
        Task::Text(task) => write_text(task, worker_id, reporter).await,
    }
}

async fn download<C: HttpClient + ?Sized>(
    client: &C,
    task: &UrlTask,
    worker_id: usize,
    reporter: &SharedProgressReporter,
) -> Result<u64, TaskError> {
    let url = task.source_url.as_str();

    let response = client
        .get_stream(url)
        .await
        .map_err(|e| TaskError::HttpFailed {
            url: url.to_string(),
            source: e,
        })?;

    if !response.is_success() {
        return Err(TaskError::HttpStatus {
            url: url.to_string(),
            status: response.status,
        });
    }

    reporter.report(ProgressEvent::TaskStarting {
        worker_id,
        job_name: task.job_name.clone(),
        job_kind: task.job_kind,
        content_length: response.content_length,
    });

    let partial = partial_path(&task.destination_path);
    let mut file = create(&partial).await?;

    let copied = copy_body(
        &mut file,
        response.body,
        &partial,
        url,
        worker_id,
        response.content_length,
        reporter,
    )
    .await;

    let bytes_written = match copied {
        Ok(bytes_written) => bytes_written,
        Err(e) => {
            // Whatever arrived stays in the partial file
            if let Err(flush_error) = file.flush().await {
                warn!(path = %partial.display(), error = %flush_error, "Failed to flush partial file");
            }
            return Err(e);
        }
    };

    finish(file, &partial, &task.destination_path).await?;

    reporter.report(ProgressEvent::TaskCompleted {
        worker_id,
        job_name: task.job_name.clone(),
        bytes_written,
    });

    Ok(bytes_written)
}

/// Stream `body` into `file`, reporting progress after every chunk
async fn copy_body(
    file: &mut File,
    mut body: ByteStream,
    partial: &Path,
    url: &str,
    worker_id: usize,
    total_bytes: Option<u64>,
    reporter: &SharedProgressReporter,
) -> Result<u64, TaskError> {
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = body.next().await {
        let chunk = chunk_result.map_err(|e| TaskError::StreamFailed {
            url: url.to_string(),
            source: e,
        })?;

        file.write_all(&chunk)
            .await
            .map_err(|e| TaskError::FileWriteFailed {
                path: partial.to_path_buf(),
                source: e,
            })?;

        bytes_written += chunk.len() as u64;

        reporter.report(ProgressEvent::TaskProgress {
            worker_id,
            bytes_written,
            total_bytes,
        });
    }

    Ok(bytes_written)
}

async fn write_text(
    task: &TextTask,
    worker_id: usize,
    reporter: &SharedProgressReporter,
) -> Result<u64, TaskError> {
    let content = task.content.as_bytes();
    let total = content.len() as u64;

    reporter.report(ProgressEvent::TaskStarting {
        worker_id,
        job_name: task.job_name.clone(),
        job_kind: task.job_kind(),
        content_length: Some(total),
    });

    let partial = partial_path(&task.destination_path);
    let mut file = create(&partial).await?;

    file.write_all(content)
        .await
        .map_err(|e| TaskError::FileWriteFailed {
            path: partial.clone(),
            source: e,
        })?;

    finish(file, &partial, &task.destination_path).await?;

    reporter.report(ProgressEvent::TaskCompleted {
        worker_id,
        job_name: task.job_name.clone(),
        bytes_written: total,
    });

    Ok(total)
}

async fn create(path: &Path) -> Result<File, TaskError> {
    File::create(path)
        .await
        .map_err(|e| TaskError::FileCreateFailed {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Flush the partial file and move it onto its final destination
async fn finish(mut file: File, partial: &Path, destination: &Path) -> Result<(), TaskError> {
    file.flush()
        .await
        .map_err(|e| TaskError::FileWriteFailed {
            path: partial.to_path_buf(),
            source: e,
        })?;
    drop(file);

    tokio::fs::rename(partial, destination)
        .await
        .map_err(|e| TaskError::FileWriteFailed {
            path: destination.to_path_buf(),
            source: e,
        })
}
