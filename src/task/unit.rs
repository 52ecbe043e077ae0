// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use super::{Task, TextTask, UrlTask};

/// All tasks derived from one episode, rooted at `base_dest_dir`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeWorkUnit {
    pub episode_title: String,
    pub base_dest_dir: PathBuf,
    pub enclosure_tasks: Vec<UrlTask>,
    pub cover_task: Option<UrlTask>,
    pub shownotes_task: Option<TextTask>,
}

/// All tasks derived from one feed, rooted at `base_dest_dir`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedWorkUnit {
    pub feed_title: String,
    pub base_dest_dir: PathBuf,
    pub episodes: Vec<EpisodeWorkUnit>,
    pub cover_task: Option<UrlTask>,
    pub feed_doc_task: UrlTask,
}

impl EpisodeWorkUnit {
    /// Drop every task whose destination already exists, returning how many were dropped
    pub fn remove_existing<F>(&mut self, exists: &F) -> usize
    where
        F: Fn(&Path) -> bool + ?Sized,
    {
        let mut removed = 0;

        let before = self.enclosure_tasks.len();
        self.enclosure_tasks
            .retain(|task| !exists(task.destination_path.as_path()));
        removed += before - self.enclosure_tasks.len();

        if self
            .cover_task
            .take_if(|task| exists(task.destination_path.as_path()))
            .is_some()
        {
            removed += 1;
        }

        if self
            .shownotes_task
            .take_if(|task| exists(task.destination_path.as_path()))
            .is_some()
        {
            removed += 1;
        }

        removed
    }

    pub fn task_count(&self) -> usize {
        self.enclosure_tasks.len()
            + usize::from(self.cover_task.is_some())
            + usize::from(self.shownotes_task.is_some())
    }

    /// Tasks in queue order: show notes, cover, then enclosures
    pub fn into_tasks(self) -> Vec<Task> {
        let mut tasks = Vec::with_capacity(self.task_count());
        tasks.extend(self.shownotes_task.map(Task::from));
        tasks.extend(self.cover_task.map(Task::from));
        tasks.extend(self.enclosure_tasks.into_iter().map(Task::from));
        tasks
    }

    /// Destinations of all remaining tasks
    pub fn destinations(&self) -> Vec<PathBuf> {
        let mut paths = Vec::with_capacity(self.task_count());
        paths.extend(
            self.shownotes_task
                .iter()
                .map(|task| task.destination_path.clone()),
        );
        paths.extend(self.cover_task.iter().map(|task| task.destination_path.clone()));
        paths.extend(
            self.enclosure_tasks
                .iter()
                .map(|task| task.destination_path.clone()),
        );
        paths
    }
}

impl FeedWorkUnit {
    /// Drop the feed cover if it already exists.
    ///
    /// The feed document is always refreshed and never dropped; episodes
    /// are pruned separately once their directories exist.
    pub fn remove_existing_cover<F>(&mut self, exists: &F) -> usize
    where
        F: Fn(&Path) -> bool + ?Sized,
    {
        usize::from(
            self.cover_task
                .take_if(|task| exists(task.destination_path.as_path()))
                .is_some(),
        )
    }

    pub fn task_count(&self) -> usize {
        1 + usize::from(self.cover_task.is_some())
            + self
                .episodes
                .iter()
                .map(EpisodeWorkUnit::task_count)
                .sum::<usize>()
    }

    /// Destinations of all remaining tasks, episodes included
    pub fn destinations(&self) -> Vec<PathBuf> {
        let mut paths = Vec::with_capacity(self.task_count());
        paths.push(self.feed_doc_task.destination_path.clone());
        paths.extend(self.cover_task.iter().map(|task| task.destination_path.clone()));
        for episode in &self.episodes {
            paths.extend(episode.destinations());
        }
        paths
    }

    /// Tasks in queue order: document, cover, then episodes in source order
    pub fn into_tasks(self) -> Vec<Task> {
        let mut tasks = Vec::with_capacity(self.task_count());
        tasks.push(Task::from(self.feed_doc_task));
        tasks.extend(self.cover_task.map(Task::from));
        for episode in self.episodes {
            tasks.extend(episode.into_tasks());
        }
        tasks
    }
}
