//! Runs a [`TaskPlan`] for one request.
//!
//! Root tasks are spawned immediately. A task whose prerequisite produced a
//! set of app IDs is spawned the moment that set arrives, so independent
//! branches never wait on each other. The first failure (an upstream error, a
//! panicked task, or the request deadline) aborts everything still running.
//! Whatever else completes afterwards is drained and dropped.

use crate::clients::{AnalysesClient, InstantLaunchesClient, MetadataClient, PermissionsClient};
use crate::db::{AppQuery, AppsQuery};
use crate::errors::{DashboardError, UpstreamError};
use crate::metrics_defs::{OUTCOMES_DISCARDED, UPSTREAM_CALL_DURATION, UPSTREAM_CALL_FAILURES};
use crate::request::DashboardRequest;
use crate::response::{TaskOutput, TaskOutputs};
use crate::task_graph::{Task, TaskPlan};
use shared::{counter, histogram};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{Id, JoinError, JoinSet};
use tokio::time::Instant;

/// Everything a task may call.
#[derive(Clone)]
pub struct Collaborators {
    pub analyses: Arc<dyn AnalysesClient>,
    pub permissions: Arc<dyn PermissionsClient>,
    pub metadata: Arc<dyn MetadataClient>,
    pub instant_launches: Arc<dyn InstantLaunchesClient>,
    pub apps: Arc<dyn AppQuery>,
}

/// Request-scoped inputs shared by all tasks of one request.
struct TaskContext {
    collaborators: Collaborators,
    username: String,
    limit: i64,
    start_date_interval: String,
    favorites_group_index: i32,
}

impl TaskContext {
    fn apps_query(&self, app_ids: Arc<[String]>) -> AppsQuery {
        AppsQuery {
            username: self.username.clone(),
            favorites_group_index: self.favorites_group_index,
            app_ids,
            start_date_interval: self.start_date_interval.clone(),
            limit: self.limit,
        }
    }
}

/// Tasks in flight, by tokio task ID.
struct SpawnedTasks {
    join_set: JoinSet<Result<TaskOutput, UpstreamError>>,
    running: HashMap<Id, Task>,
}

impl SpawnedTasks {
    fn spawn(&mut self, context: &Arc<TaskContext>, task: Task, input: Option<Arc<[String]>>) {
        let context = context.clone();
        let abort_handle = self.join_set.spawn(async move {
            let started = Instant::now();
            let result = run_task(&context, task, input).await;
            histogram!(UPSTREAM_CALL_DURATION, "task" => task.as_str())
                .record(started.elapsed().as_secs_f64());
            if let Err(e) = &result {
                counter!(UPSTREAM_CALL_FAILURES, "task" => task.as_str()).increment(1);
                tracing::warn!(task = %task, user = %context.username, error = %e, "task failed");
            }
            result
        });
        tracing::trace!(task = %task, "task spawned");
        self.running.insert(abort_handle.id(), task);
    }
}

#[derive(Clone)]
pub struct DashboardExecutor {
    collaborators: Collaborators,
    favorites_group_index: i32,
    /// Deadline for a whole request, measured from the start of `execute`.
    deadline: Duration,
}

impl DashboardExecutor {
    pub fn new(collaborators: Collaborators, favorites_group_index: i32, deadline: Duration) -> Self {
        DashboardExecutor {
            collaborators,
            favorites_group_index,
            deadline,
        }
    }

    pub fn apps(&self) -> &Arc<dyn AppQuery> {
        &self.collaborators.apps
    }

    /// Runs every task in `plan` and returns all of their outputs, or the
    /// first error. User-specific tasks are never run for anonymous requests.
    pub async fn execute(
        &self,
        plan: &TaskPlan,
        request: &DashboardRequest,
    ) -> Result<TaskOutputs, DashboardError> {
        let plan = if request.anonymous {
            plan.clone().without_user_tasks()
        } else {
            plan.clone()
        };

        let context = Arc::new(TaskContext {
            collaborators: self.collaborators.clone(),
            username: request.username.clone(),
            limit: request.limit,
            start_date_interval: request.start_date_interval.clone(),
            favorites_group_index: self.favorites_group_index,
        });

        let mut spawned = SpawnedTasks {
            join_set: JoinSet::new(),
            running: HashMap::new(),
        };
        for task in plan.roots() {
            spawned.spawn(&context, task, None);
        }

        let outputs = self.collect(&plan, &context, spawned).await?;

        for &task in plan.tasks() {
            if !outputs.contains(task) {
                return Err(DashboardError::MissingOutcome(task));
            }
        }
        Ok(outputs)
    }

    /// Consumes exactly one outcome per spawned task. Only the first failure
    /// is kept.
    async fn collect(
        &self,
        plan: &TaskPlan,
        context: &Arc<TaskContext>,
        mut spawned: SpawnedTasks,
    ) -> Result<TaskOutputs, DashboardError> {
        let mut outputs = TaskOutputs::default();
        let mut failure: Option<DashboardError> = None;

        let deadline = tokio::time::sleep_until(Instant::now() + self.deadline);
        tokio::pin!(deadline);

        while !spawned.join_set.is_empty() {
            tokio::select! {
                Some(joined) = spawned.join_set.join_next_with_id() => {
                    let (task, result) = match joined {
                        Ok((id, result)) => (spawned.running.remove(&id), Ok(result)),
                        Err(e) => (spawned.running.remove(&e.id()), Err(e)),
                    };
                    let Some(task) = task else {
                        tracing::error!("joined a task that was never spawned");
                        continue;
                    };

                    if failure.is_some() {
                        counter!(OUTCOMES_DISCARDED).increment(1);
                        tracing::debug!(task = %task, "discarding outcome after failure");
                        continue;
                    }

                    let outcome = match result {
                        Ok(Ok(output)) => self.accept(plan, context, &mut spawned, &mut outputs, task, output),
                        Ok(Err(source)) => Err(DashboardError::Upstream { task, source }),
                        Err(join_error) => Err(aborted(task, join_error)),
                    };
                    if let Err(e) = outcome {
                        spawned.join_set.abort_all();
                        failure = Some(e);
                    }
                }
                _ = &mut deadline, if failure.is_none() => {
                    tracing::warn!(
                        user = %context.username,
                        pending = spawned.join_set.len(),
                        "request deadline reached, aborting remaining tasks"
                    );
                    spawned.join_set.abort_all();
                    failure = Some(DashboardError::DeadlineExceeded(self.deadline));
                }
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(outputs),
        }
    }

    /// Publishes a task's output and starts the tasks waiting on it.
    fn accept(
        &self,
        plan: &TaskPlan,
        context: &Arc<TaskContext>,
        spawned: &mut SpawnedTasks,
        outputs: &mut TaskOutputs,
        task: Task,
        output: TaskOutput,
    ) -> Result<(), DashboardError> {
        if let TaskOutput::AppIds(ids) = &output {
            tracing::debug!(task = %task, count = ids.len(), "app IDs resolved");
            for dependent in plan.dependents_of(task) {
                spawned.spawn(context, dependent, Some(ids.clone()));
            }
        }
        outputs.publish(task, output)
    }
}

fn aborted(task: Task, join_error: JoinError) -> DashboardError {
    tracing::error!(task = %task, error = %join_error, "task did not complete");
    DashboardError::TaskAborted {
        task,
        message: join_error.to_string(),
    }
}

/// Makes the single collaborator call behind `task`.
async fn run_task(
    context: &TaskContext,
    task: Task,
    input: Option<Arc<[String]>>,
) -> Result<TaskOutput, UpstreamError> {
    let c = &context.collaborators;
    let app_ids = input.unwrap_or_else(|| Arc::from(Vec::new()));

    match task {
        Task::RecentAnalyses => c
            .analyses
            .recent_analyses(&context.username, context.limit)
            .await
            .map(TaskOutput::Analyses),
        Task::RunningAnalyses => c
            .analyses
            .running_analyses(&context.username, context.limit)
            .await
            .map(TaskOutput::Analyses),
        Task::InstantLaunches => c
            .instant_launches
            .dashboard_instant_launches(&context.username)
            .await
            .map(TaskOutput::InstantLaunches),
        Task::VisibleAppIds => c
            .permissions
            .public_app_ids()
            .await
            .map(|ids| TaskOutput::AppIds(ids.into())),
        Task::FeaturedAppIds => c
            .metadata
            .featured_app_ids(&context.username, &app_ids)
            .await
            .map(|ids| TaskOutput::AppIds(ids.into())),
        Task::RecentlyAddedApps => c
            .apps
            .recently_added_apps(&context.apps_query(app_ids))
            .await
            .map(TaskOutput::Apps),
        Task::PublicApps => c
            .apps
            .public_apps(&context.apps_query(app_ids))
            .await
            .map(TaskOutput::Apps),
        Task::RecentlyUsedApps => c
            .apps
            .recently_used_apps(&context.apps_query(app_ids))
            .await
            .map(TaskOutput::Apps),
        Task::RecentlyRanApps => c
            .apps
            .recently_ran_apps(&context.apps_query(app_ids))
            .await
            .map(TaskOutput::Apps),
        Task::PopularFeaturedApps => c
            .apps
            .popular_featured_apps(&context.apps_query(app_ids))
            .await
            .map(TaskOutput::Apps),
    }
}
