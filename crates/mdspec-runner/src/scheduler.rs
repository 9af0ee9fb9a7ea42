//! Bounded-parallel task group with dependency edges and per-task timeouts.
//!
//! Tasks are added up front, then [`TaskGroup::wait`] drives them to
//! completion and returns one [`TaskStatus`] per task. A task whose dependency
//! did not complete successfully is never started; it is reported as
//! [`TaskStatus::Skipped`] naming that dependency.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt as _;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use uuid::Uuid;

use crate::error::{Result, RunError};
use crate::graph::TaskGraph;

/// Handle to a task in a [`TaskGroup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Allocate a fresh id
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// How a task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus<T> {
    /// The task returned a value
    Completed(T),
    /// The task returned an error
    Failed(String),
    /// The task exceeded its timeout and was dropped
    TimedOut(Duration),
    /// The task never started because a dependency did not complete
    Skipped {
        /// The dependency that did not complete
        dependency: TaskId,
    },
    /// The task panicked
    Panicked(String),
}

impl<T> TaskStatus<T> {
    /// Whether the task produced a value
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

struct PendingTask<T> {
    name: String,
    timeout: Duration,
    future: BoxFuture<'static, CoreTaskResult<T>>,
}

type CoreTaskResult<T> = core::result::Result<T, String>;

/// A set of tasks executed with bounded parallelism.
pub struct TaskGroup<T> {
    max_concurrent: usize,
    default_timeout: Duration,
    order: Vec<(TaskId, Vec<TaskId>)>,
    pending: HashMap<TaskId, PendingTask<T>>,
}

impl<T: Send + 'static> TaskGroup<T> {
    /// Create a group running at most `max_concurrent` tasks at once
    #[must_use]
    pub fn new(max_concurrent: usize, default_timeout: Duration) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
            default_timeout,
            order: Vec::new(),
            pending: HashMap::new(),
        }
    }

    /// Add a task. It starts once every task in `dependencies` has completed.
    pub fn add<F>(
        &mut self,
        name: impl Into<String>,
        dependencies: &[TaskId],
        task_timeout: Option<Duration>,
        future: F,
    ) -> TaskId
    where
        F: Future<Output = CoreTaskResult<T>> + Send + 'static,
    {
        let id = TaskId::new();
        self.order.push((id, dependencies.to_vec()));
        self.pending.insert(
            id,
            PendingTask {
                name: name.into(),
                timeout: task_timeout.unwrap_or(self.default_timeout),
                future: future.boxed(),
            },
        );
        id
    }

    /// Number of tasks added
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no task was added
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Run every task and block until all have finished.
    ///
    /// # Errors
    /// Returns an error if the dependency graph is invalid or a worker cannot
    /// be joined. Task failures are reported in the returned map.
    pub async fn wait(mut self) -> Result<HashMap<TaskId, TaskStatus<T>>> {
        let graph = TaskGraph::from_dependencies(&self.order)?;
        if graph.has_cycles() {
            return Err(RunError::CyclicDependency);
        }

        let mut statuses: HashMap<TaskId, TaskStatus<T>> = HashMap::new();
        let mut finished = HashSet::new();
        let mut started = HashSet::new();
        let mut join_set = JoinSet::new();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));

        loop {
            let mut progressed = true;
            while progressed {
                progressed = false;
                for id in graph.ready_tasks(&finished) {
                    if !started.insert(id) {
                        continue;
                    }
                    let Some(task) = self.pending.remove(&id) else {
                        continue;
                    };

                    let failed_dependency = graph
                        .dependencies(id)
                        .into_iter()
                        .find(|dep| !statuses.get(dep).is_some_and(TaskStatus::is_completed));
                    if let Some(dependency) = failed_dependency {
                        tracing::debug!(task = %task.name, %dependency, "skipping task, dependency did not complete");
                        statuses.insert(id, TaskStatus::Skipped { dependency });
                        finished.insert(id);
                        progressed = true;
                        continue;
                    }

                    tracing::debug!(task = %task.name, "starting task");
                    let semaphore = Arc::clone(&semaphore);
                    join_set.spawn(async move {
                        let Ok(_permit) = semaphore.acquire_owned().await else {
                            return (id, TaskStatus::Failed("scheduler closed".to_owned()));
                        };
                        (id, run_task(task).await)
                    });
                }
            }

            let Some(joined) = join_set.join_next().await else {
                break;
            };
            let (id, status) = joined.map_err(|err| RunError::ExecutionFailed(err.to_string()))?;
            finished.insert(id);
            statuses.insert(id, status);
        }

        Ok(statuses)
    }
}

async fn run_task<T>(task: PendingTask<T>) -> TaskStatus<T> {
    let limit = task.timeout;
    let outcome = AssertUnwindSafe(timeout(limit, task.future))
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(Ok(value))) => TaskStatus::Completed(value),
        Ok(Ok(Err(message))) => {
            tracing::debug!(task = %task.name, %message, "task failed");
            TaskStatus::Failed(message)
        }
        Ok(Err(_elapsed)) => {
            tracing::warn!(task = %task.name, ?limit, "task timed out");
            TaskStatus::TimedOut(limit)
        }
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|text| (*text).to_owned())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_owned());
            tracing::warn!(task = %task.name, %message, "task panicked");
            TaskStatus::Panicked(message)
        }
    }
}
