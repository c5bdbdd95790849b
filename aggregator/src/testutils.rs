//! Scripted collaborators for executor and router tests.

use crate::clients::{
    AnalysesClient, AnalysisListing, InstantLaunchesClient, MetadataClient, PermissionsClient,
};
use crate::db::{App, AppQuery, AppsQuery};
use crate::errors::UpstreamError;
use crate::executor::Collaborators;
use crate::task_graph::Task;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallEvent {
    Started(Task),
    Finished(Task),
}

/// What a stubbed call saw.
#[derive(Clone, Debug)]
pub struct CallRecord {
    pub task: Task,
    pub username: Option<String>,
    pub app_ids: Option<Vec<String>>,
    pub start_date_interval: Option<String>,
}

/// One stub standing in for every collaborator. Each call is keyed by the
/// task that makes it.
#[derive(Default)]
pub struct StubBackend {
    latency: HashMap<Task, Duration>,
    failing: HashSet<Task>,
    hanging: HashSet<Task>,
    panicking: HashSet<Task>,
    visible_ids: Vec<String>,
    featured_ids: Vec<String>,
    healthy: bool,
    rejected_intervals: HashSet<String>,
    interval_check_fails: bool,
    interval_checks: Mutex<Vec<String>>,
    events: Mutex<Vec<CallEvent>>,
    records: Mutex<Vec<CallRecord>>,
}

impl StubBackend {
    pub fn new() -> Self {
        StubBackend {
            visible_ids: vec!["app-1".into(), "app-2".into(), "app-3".into()],
            featured_ids: vec!["app-2".into()],
            healthy: true,
            ..Default::default()
        }
    }

    pub fn with_latency(mut self, task: Task, latency: Duration) -> Self {
        self.latency.insert(task, latency);
        self
    }

    pub fn failing(mut self, task: Task) -> Self {
        self.failing.insert(task);
        self
    }

    /// The call never completes.
    pub fn hanging(mut self, task: Task) -> Self {
        self.hanging.insert(task);
        self
    }

    pub fn panicking(mut self, task: Task) -> Self {
        self.panicking.insert(task);
        self
    }

    pub fn with_visible_ids(mut self, ids: &[&str]) -> Self {
        self.visible_ids = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    /// The database refuses to parse `interval`.
    pub fn rejecting_interval(mut self, interval: &str) -> Self {
        self.rejected_intervals.insert(interval.to_string());
        self
    }

    /// The database cannot be reached to check an interval.
    pub fn interval_check_failing(mut self) -> Self {
        self.interval_check_fails = true;
        self
    }

    pub fn into_collaborators(self) -> (Arc<StubBackend>, Collaborators) {
        let stub = Arc::new(self);
        let collaborators = Collaborators {
            analyses: stub.clone(),
            permissions: stub.clone(),
            metadata: stub.clone(),
            instant_launches: stub.clone(),
            apps: stub.clone(),
        };
        (stub, collaborators)
    }

    pub fn events(&self) -> Vec<CallEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn records(&self) -> Vec<CallRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn was_called(&self, task: Task) -> bool {
        self.events().contains(&CallEvent::Started(task))
    }

    pub fn call_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn interval_checks(&self) -> Vec<String> {
        self.interval_checks.lock().unwrap().clone()
    }

    async fn call(
        &self,
        task: Task,
        username: Option<&str>,
        app_ids: Option<&[String]>,
        start_date_interval: Option<&str>,
    ) -> Result<(), UpstreamError> {
        self.events.lock().unwrap().push(CallEvent::Started(task));
        self.records.lock().unwrap().push(CallRecord {
            task,
            username: username.map(String::from),
            app_ids: app_ids.map(<[String]>::to_vec),
            start_date_interval: start_date_interval.map(String::from),
        });

        if let Some(latency) = self.latency.get(&task) {
            tokio::time::sleep(*latency).await;
        }
        if self.hanging.contains(&task) {
            std::future::pending::<()>().await;
        }
        if self.panicking.contains(&task) {
            panic!("injected panic in {task}");
        }

        self.events.lock().unwrap().push(CallEvent::Finished(task));
        if self.failing.contains(&task) {
            return Err(UpstreamError::Status {
                url: format!("http://stub/{task}"),
                status: 500,
                body: "injected failure".into(),
            });
        }
        Ok(())
    }

    async fn listing(&self, task: Task, query: &AppsQuery) -> Result<Vec<App>, UpstreamError> {
        self.call(
            task,
            Some(query.username.as_str()),
            Some(&query.app_ids[..]),
            Some(query.start_date_interval.as_str()),
        )
        .await?;

        Ok(query
            .app_ids
            .iter()
            .take(query.limit as usize)
            .map(|id| App {
                id: id.clone(),
                system_id: "de".into(),
                name: format!("{task} {id}"),
                description: None,
                wiki_url: None,
                integration_date: None,
                edited_date: None,
                username: Some(query.username.clone()),
                job_count: 0,
                is_favorite: false,
                is_public: true,
            })
            .collect())
    }
}

#[async_trait]
impl AnalysesClient for StubBackend {
    async fn recent_analyses(
        &self,
        username: &str,
        _limit: i64,
    ) -> Result<AnalysisListing, UpstreamError> {
        self.call(Task::RecentAnalyses, Some(username), None, None).await?;
        Ok(AnalysisListing {
            analyses: vec![serde_json::json!({"id": "recent-1", "status": "Completed"})],
        })
    }

    async fn running_analyses(
        &self,
        username: &str,
        _limit: i64,
    ) -> Result<AnalysisListing, UpstreamError> {
        self.call(Task::RunningAnalyses, Some(username), None, None).await?;
        Ok(AnalysisListing {
            analyses: vec![serde_json::json!({"id": "running-1", "status": "Running"})],
        })
    }
}

#[async_trait]
impl PermissionsClient for StubBackend {
    async fn public_app_ids(&self) -> Result<Vec<String>, UpstreamError> {
        self.call(Task::VisibleAppIds, None, None, None).await?;
        Ok(self.visible_ids.clone())
    }
}

#[async_trait]
impl MetadataClient for StubBackend {
    async fn featured_app_ids(
        &self,
        username: &str,
        app_ids: &[String],
    ) -> Result<Vec<String>, UpstreamError> {
        self.call(Task::FeaturedAppIds, Some(username), Some(app_ids), None)
            .await?;
        Ok(self
            .featured_ids
            .iter()
            .filter(|id| app_ids.contains(id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl InstantLaunchesClient for StubBackend {
    async fn dashboard_instant_launches(
        &self,
        username: &str,
    ) -> Result<Vec<serde_json::Value>, UpstreamError> {
        self.call(Task::InstantLaunches, Some(username), None, None).await?;
        Ok(vec![serde_json::json!({"id": "il-1"})])
    }
}

#[async_trait]
impl AppQuery for StubBackend {
    async fn recently_added_apps(&self, query: &AppsQuery) -> Result<Vec<App>, UpstreamError> {
        self.listing(Task::RecentlyAddedApps, query).await
    }

    async fn public_apps(&self, query: &AppsQuery) -> Result<Vec<App>, UpstreamError> {
        self.listing(Task::PublicApps, query).await
    }

    async fn recently_used_apps(&self, query: &AppsQuery) -> Result<Vec<App>, UpstreamError> {
        self.listing(Task::RecentlyUsedApps, query).await
    }

    async fn popular_featured_apps(&self, query: &AppsQuery) -> Result<Vec<App>, UpstreamError> {
        self.listing(Task::PopularFeaturedApps, query).await
    }

    async fn recently_ran_apps(&self, query: &AppsQuery) -> Result<Vec<App>, UpstreamError> {
        self.listing(Task::RecentlyRanApps, query).await
    }

    async fn validate_interval(&self, interval: &str) -> Result<bool, UpstreamError> {
        self.interval_checks
            .lock()
            .unwrap()
            .push(interval.to_string());
        if self.interval_check_fails {
            return Err(UpstreamError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(!self.rejected_intervals.contains(interval))
    }

    async fn healthz(&self) -> Result<(), UpstreamError> {
        if self.healthy {
            Ok(())
        } else {
            Err(UpstreamError::Unhealthy("no version found".into()))
        }
    }
}

/// xorshift64*, enough to shuffle latencies reproducibly.
pub struct Rng(u64);

impl Rng {
    pub fn new(seed: u64) -> Self {
        Rng(seed.max(1))
    }

    pub fn next_u64(&mut self) -> u64 {
        self.0 ^= self.0 >> 12;
        self.0 ^= self.0 << 25;
        self.0 ^= self.0 >> 27;
        self.0.wrapping_mul(0x2545_f491_4f6c_dd1d)
    }

    pub fn below(&mut self, n: u64) -> u64 {
        self.next_u64() % n
    }
}
