//! The upstream calls behind a dashboard and the data dependencies between
//! them.
//!
//! Every task makes exactly one collaborator call and has at most one
//! prerequisite, whose output (a set of app IDs) it consumes:
//!
//! ```text
//! RecentAnalyses   RunningAnalyses   InstantLaunches   VisibleAppIds
//!                                                          |
//!          +-----------------+-----------------+-----------+-----------+
//!          |                 |                 |           |           |
//!  RecentlyAddedApps    PublicApps   RecentlyUsedApps  RecentlyRanApps  FeaturedAppIds
//!                                                                       |
//!                                                              PopularFeaturedApps
//! ```

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Task {
    RecentAnalyses,
    RunningAnalyses,
    InstantLaunches,
    /// App IDs readable by the public group.
    VisibleAppIds,
    RecentlyAddedApps,
    PublicApps,
    RecentlyUsedApps,
    RecentlyRanApps,
    /// Visible app IDs tagged with the featured AVU.
    FeaturedAppIds,
    PopularFeaturedApps,
}

impl Task {
    pub const ALL: [Task; 10] = [
        Task::RecentAnalyses,
        Task::RunningAnalyses,
        Task::InstantLaunches,
        Task::VisibleAppIds,
        Task::RecentlyAddedApps,
        Task::PublicApps,
        Task::RecentlyUsedApps,
        Task::RecentlyRanApps,
        Task::FeaturedAppIds,
        Task::PopularFeaturedApps,
    ];

    /// The task whose output this task takes as input.
    pub fn dependency(self) -> Option<Task> {
        match self {
            Task::RecentAnalyses | Task::RunningAnalyses | Task::InstantLaunches => None,
            Task::VisibleAppIds => None,
            Task::RecentlyAddedApps
            | Task::PublicApps
            | Task::RecentlyUsedApps
            | Task::RecentlyRanApps
            | Task::FeaturedAppIds => Some(Task::VisibleAppIds),
            Task::PopularFeaturedApps => Some(Task::FeaturedAppIds),
        }
    }

    /// Tasks that only make sense for a logged-in user.
    pub fn is_user_specific(self) -> bool {
        matches!(
            self,
            Task::RecentAnalyses | Task::RunningAnalyses | Task::InstantLaunches
        )
    }

    /// Listings bounded by the request's start date interval.
    pub fn uses_interval(self) -> bool {
        matches!(
            self,
            Task::RecentlyUsedApps | Task::RecentlyRanApps | Task::PopularFeaturedApps
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Task::RecentAnalyses => "recent_analyses",
            Task::RunningAnalyses => "running_analyses",
            Task::InstantLaunches => "instant_launches",
            Task::VisibleAppIds => "visible_app_ids",
            Task::RecentlyAddedApps => "recently_added_apps",
            Task::PublicApps => "public_apps",
            Task::RecentlyUsedApps => "recently_used_apps",
            Task::RecentlyRanApps => "recently_ran_apps",
            Task::FeaturedAppIds => "featured_app_ids",
            Task::PopularFeaturedApps => "popular_featured_apps",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The set of tasks to run for one request, closed over dependencies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskPlan {
    tasks: Vec<Task>,
}

impl TaskPlan {
    /// Plans `targets` plus everything they transitively depend on.
    pub fn for_targets(targets: &[Task]) -> Self {
        let mut tasks = Vec::new();
        for &target in targets {
            let mut next = Some(target);
            while let Some(task) = next {
                if !tasks.contains(&task) {
                    tasks.push(task);
                }
                next = task.dependency();
            }
        }
        tasks.sort();
        TaskPlan { tasks }
    }

    /// Everything on a logged-in user's dashboard.
    pub fn dashboard() -> Self {
        Self::for_targets(&[
            Task::RecentAnalyses,
            Task::RunningAnalyses,
            Task::InstantLaunches,
            Task::RecentlyAddedApps,
            Task::PublicApps,
            Task::RecentlyUsedApps,
            Task::PopularFeaturedApps,
        ])
    }

    /// The logged-out dashboard: popular featured apps only.
    pub fn anonymous_dashboard() -> Self {
        Self::for_targets(&[Task::PopularFeaturedApps])
    }

    /// Drops the tasks that need a real user. Tasks depending on a dropped
    /// task are dropped too.
    pub fn without_user_tasks(mut self) -> Self {
        self.tasks.retain(|task| !task.is_user_specific());
        let kept = self.tasks.clone();
        self.tasks
            .retain(|task| task.dependency().is_none_or(|dep| kept.contains(&dep)));
        self
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn contains(&self, task: Task) -> bool {
        self.tasks.contains(&task)
    }

    pub fn uses_interval(&self) -> bool {
        self.tasks.iter().any(|task| task.uses_interval())
    }

    /// Tasks that can start immediately.
    pub fn roots(&self) -> impl Iterator<Item = Task> + '_ {
        self.tasks
            .iter()
            .copied()
            .filter(|task| task.dependency().is_none())
    }

    /// Tasks in the plan that consume `task`'s output.
    pub fn dependents_of(&self, task: Task) -> impl Iterator<Item = Task> + '_ {
        self.tasks
            .iter()
            .copied()
            .filter(move |t| t.dependency() == Some(task))
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
