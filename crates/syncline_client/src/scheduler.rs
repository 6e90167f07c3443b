//! Named background tasks with teardown on logout.

use std::future::Future;

use tokio::task::JoinHandle;

struct ScheduledTask {
    name: &'static str,
    handle: JoinHandle<()>,
}

/// Owns the background tasks that run while a session is active.
///
/// Every task is named and cancelable as a group; [`TaskScheduler::shutdown`]
/// aborts whatever is still running and forgets the handles. Tasks are
/// created on session start and torn down on logout, so no timer or loop
/// survives across login cycles.
pub struct TaskScheduler {
    tasks: Vec<ScheduledTask>,
}

impl TaskScheduler {
    /// Creates an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    /// Spawns a named task onto the current tokio runtime.
    pub fn spawn<F>(&mut self, name: &'static str, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::debug!(task = name, "background task started");
        self.tasks.push(ScheduledTask {
            name,
            handle: tokio::spawn(future),
        });
    }

    /// Aborts every task still running and forgets all handles.
    pub fn shutdown(&mut self) {
        for task in self.tasks.drain(..) {
            if task.handle.is_finished() {
                tracing::debug!(task = task.name, "background task had already finished");
            } else {
                task.handle.abort();
                tracing::debug!(task = task.name, "background task stopped");
            }
        }
    }

    /// Names of the scheduled tasks that have not finished.
    #[must_use]
    pub fn active_tasks(&self) -> Vec<&'static str> {
        self.tasks
            .iter()
            .filter(|task| !task.handle.is_finished())
            .map(|task| task.name)
            .collect()
    }

    /// Returns `true` when no scheduled task is still running.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.tasks.iter().all(|task| task.handle.is_finished())
    }
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TaskScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
