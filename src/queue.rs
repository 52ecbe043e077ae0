// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::QueueError;
use crate::task::Task;

/// FIFO of pending tasks, safe to share between the feeder and other callers.
///
/// `dequeue` never waits: an empty queue is reported as [`QueueError::Empty`].
#[derive(Debug, Default)]
pub struct WorkQueue {
    tasks: Mutex<VecDeque<Task>>,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        Self {
            tasks: Mutex::new(tasks.into_iter().collect()),
        }
    }

    pub fn enqueue(&self, task: Task) {
        self.lock().push_back(task);
    }

    pub fn dequeue(&self) -> Result<Task, QueueError> {
        self.lock().pop_front().ok_or(QueueError::Empty)
    }

    /// Copy of the next task without removing it
    pub fn peek(&self) -> Result<Task, QueueError> {
        self.lock().front().cloned().ok_or(QueueError::Empty)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Task>> {
        // Operations never leave the deque half-updated
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FromIterator<Task> for WorkQueue {
    fn from_iter<I: IntoIterator<Item = Task>>(iter: I) -> Self {
        Self::from_tasks(iter)
    }
}
