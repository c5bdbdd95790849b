use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One card on the dashboard's news, events, or videos rails.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardItem {
    pub id: String,
    pub name: String,
    pub description: String,
    pub date_added: String,
    pub author: String,
    pub publication_date: String,
    pub content: String,
    pub link: String,
    #[serde(rename = "thumbnailUrl")]
    pub thumbnail_url: String,
}

/// Items per feed name, as last published by the refresher.
pub type FeedSnapshot = BTreeMap<String, Vec<DashboardItem>>;

pub const NEWS_FEED: &str = "news";
pub const EVENTS_FEED: &str = "events";
pub const VIDEOS_FEED: &str = "videos";
pub const INSTANT_LAUNCHES_FEED: &str = "instant-launches";
