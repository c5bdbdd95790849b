//! Per-task outputs and the documents assembled from them.

use crate::clients::AnalysisListing;
use crate::db::App;
use crate::errors::DashboardError;
use crate::task_graph::Task;
use feeds::FeedSnapshot;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// The value a task produces on success.
#[derive(Clone, Debug)]
pub enum TaskOutput {
    Analyses(AnalysisListing),
    InstantLaunches(Vec<serde_json::Value>),
    /// Published to dependents. Never mutated once published.
    AppIds(Arc<[String]>),
    Apps(Vec<App>),
}

/// One slot per task. A slot is written once and read once.
#[derive(Debug, Default)]
pub struct TaskOutputs {
    slots: HashMap<Task, TaskOutput>,
}

impl TaskOutputs {
    pub fn publish(&mut self, task: Task, output: TaskOutput) -> Result<(), DashboardError> {
        if self.slots.contains_key(&task) {
            return Err(DashboardError::DuplicateOutcome(task));
        }
        self.slots.insert(task, output);
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn contains(&self, task: Task) -> bool {
        self.slots.contains_key(&task)
    }

    pub fn take_analyses(&mut self, task: Task) -> Result<AnalysisListing, DashboardError> {
        match self.slots.remove(&task) {
            Some(TaskOutput::Analyses(listing)) => Ok(listing),
            _ => Err(DashboardError::MissingOutcome(task)),
        }
    }

    pub fn take_instant_launches(&mut self) -> Result<Vec<serde_json::Value>, DashboardError> {
        match self.slots.remove(&Task::InstantLaunches) {
            Some(TaskOutput::InstantLaunches(items)) => Ok(items),
            _ => Err(DashboardError::MissingOutcome(Task::InstantLaunches)),
        }
    }

    pub fn take_apps(&mut self, task: Task) -> Result<Vec<App>, DashboardError> {
        match self.slots.remove(&task) {
            Some(TaskOutput::Apps(apps)) => Ok(apps),
            _ => Err(DashboardError::MissingOutcome(task)),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnalysesSection {
    pub recent: Vec<serde_json::Value>,
    pub running: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppsSection {
    pub recently_added: Vec<App>,
    pub public: Vec<App>,
    pub recently_used: Vec<App>,
    pub popular_featured: Vec<App>,
}

/// A logged-in user's dashboard.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub analyses: AnalysesSection,
    pub apps: AppsSection,
    pub instant_launches: Vec<serde_json::Value>,
    pub feeds: Arc<FeedSnapshot>,
}

impl DashboardResponse {
    /// Builds the document from a complete set of outputs. Fails if any
    /// listing is missing; a partial document is never produced.
    pub fn assemble(
        mut outputs: TaskOutputs,
        feeds: Arc<FeedSnapshot>,
    ) -> Result<Self, DashboardError> {
        Ok(DashboardResponse {
            analyses: AnalysesSection {
                recent: outputs.take_analyses(Task::RecentAnalyses)?.analyses,
                running: outputs.take_analyses(Task::RunningAnalyses)?.analyses,
            },
            apps: AppsSection {
                recently_added: outputs.take_apps(Task::RecentlyAddedApps)?,
                public: outputs.take_apps(Task::PublicApps)?,
                recently_used: outputs.take_apps(Task::RecentlyUsedApps)?,
                popular_featured: outputs.take_apps(Task::PopularFeaturedApps)?,
            },
            instant_launches: outputs.take_instant_launches()?,
            feeds,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopularFeaturedSection {
    pub popular_featured: Vec<App>,
}

/// The logged-out dashboard. It has no analyses or instant launches.
#[derive(Debug, Serialize)]
pub struct AnonymousDashboardResponse {
    pub apps: PopularFeaturedSection,
    pub feeds: Arc<FeedSnapshot>,
}

impl AnonymousDashboardResponse {
    pub fn assemble(
        mut outputs: TaskOutputs,
        feeds: Arc<FeedSnapshot>,
    ) -> Result<Self, DashboardError> {
        Ok(AnonymousDashboardResponse {
            apps: PopularFeaturedSection {
                popular_featured: outputs.take_apps(Task::PopularFeaturedApps)?,
            },
            feeds,
        })
    }
}

/// Body of the single-listing routes.
#[derive(Debug, Serialize)]
pub struct AppsResponse {
    pub apps: Vec<App>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use feeds::DashboardItem;

    fn complete_outputs() -> TaskOutputs {
        let mut outputs = TaskOutputs::default();
        let listing = AnalysisListing {
            analyses: vec![serde_json::json!({"id": "a1"})],
        };
        outputs
            .publish(Task::RecentAnalyses, TaskOutput::Analyses(listing.clone()))
            .unwrap();
        outputs
            .publish(Task::RunningAnalyses, TaskOutput::Analyses(listing))
            .unwrap();
        outputs
            .publish(Task::InstantLaunches, TaskOutput::InstantLaunches(vec![]))
            .unwrap();
        outputs
            .publish(Task::VisibleAppIds, TaskOutput::AppIds(Arc::from(vec![])))
            .unwrap();
        for task in [
            Task::RecentlyAddedApps,
            Task::PublicApps,
            Task::RecentlyUsedApps,
            Task::PopularFeaturedApps,
        ] {
            outputs.publish(task, TaskOutput::Apps(vec![])).unwrap();
        }
        outputs
    }

    #[test]
    fn test_publish_twice_fails() {
        let mut outputs = TaskOutputs::default();
        outputs.publish(Task::PublicApps, TaskOutput::Apps(vec![])).unwrap();
        assert!(matches!(
            outputs.publish(Task::PublicApps, TaskOutput::Apps(vec![])),
            Err(DashboardError::DuplicateOutcome(Task::PublicApps))
        ));
    }

    #[test]
    fn test_take_is_once() {
        let mut outputs = TaskOutputs::default();
        outputs
            .publish(Task::PublicApps, TaskOutput::Apps(Vec::new()))
            .unwrap();
        assert!(outputs.take_apps(Task::PublicApps).unwrap().is_empty());
        assert!(matches!(
            outputs.take_apps(Task::PublicApps),
            Err(DashboardError::MissingOutcome(Task::PublicApps))
        ));
    }

    #[test]
    fn test_assemble_serializes_every_section() {
        let mut feeds = FeedSnapshot::new();
        feeds.insert(
            "news".into(),
            vec![DashboardItem {
                name: "hello".into(),
                ..Default::default()
            }],
        );

        let response = DashboardResponse::assemble(complete_outputs(), Arc::new(feeds)).unwrap();
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["analyses"]["recent"][0]["id"], "a1");
        assert!(json["analyses"]["running"].is_array());
        for key in ["recentlyAdded", "public", "recentlyUsed", "popularFeatured"] {
            assert_eq!(json["apps"][key], serde_json::json!([]), "{key}");
        }
        assert_eq!(json["instantLaunches"], serde_json::json!([]));
        assert_eq!(json["feeds"]["news"][0]["name"], "hello");
    }

    #[test]
    fn test_assemble_missing_listing_fails() {
        let mut outputs = complete_outputs();
        outputs.take_apps(Task::RecentlyUsedApps).unwrap();
        assert!(matches!(
            DashboardResponse::assemble(outputs, Arc::default()),
            Err(DashboardError::MissingOutcome(Task::RecentlyUsedApps))
        ));
    }

    #[test]
    fn test_anonymous_document_shape() {
        let mut outputs = TaskOutputs::default();
        outputs
            .publish(Task::PopularFeaturedApps, TaskOutput::Apps(vec![]))
            .unwrap();
        let response = AnonymousDashboardResponse::assemble(outputs, Arc::default()).unwrap();
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["apps"]["popularFeatured"], serde_json::json!([]));
        assert!(json.get("analyses").is_none());
        assert!(json.get("instantLaunches").is_none());
        assert!(json["feeds"].is_object());
    }
}
