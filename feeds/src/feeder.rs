//! Feed sources. Every source shares the pull skeleton in [`pull_items`] and
//! differs only in how a fetched body becomes dashboard items.

use crate::FeedError;
use crate::config::ValidationError;
use crate::types::{DashboardItem, INSTANT_LAUNCHES_FEED};
use chrono::{DateTime, Utc};
use feed_rs::model::Entry;
use url::Url;

pub trait Feeder: Send + Sync {
    fn name(&self) -> &str;

    fn url(&self) -> &Url;

    /// Turns a fetched body into items, newest first.
    fn transform(&self, body: &[u8]) -> Result<Vec<DashboardItem>, FeedError>;
}

/// Fetches the feeder's URL and keeps at most `limit` transformed items.
pub async fn pull_items(
    client: &reqwest::Client,
    feeder: &dyn Feeder,
    limit: usize,
) -> Result<Vec<DashboardItem>, FeedError> {
    tracing::debug!(feed = feeder.name(), url = %feeder.url(), "pulling feed items");

    let response = client.get(feeder.url().clone()).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(FeedError::Status {
            url: feeder.url().to_string(),
            status: status.as_u16(),
        });
    }

    let body = response.bytes().await?;
    let mut items = feeder.transform(&body)?;
    items.truncate(limit);

    Ok(items)
}

/// RSS or Atom feed published by the project website.
pub struct WebsiteFeed {
    name: String,
    url: Url,
}

impl WebsiteFeed {
    pub fn new(name: impl Into<String>, url: Url) -> Self {
        WebsiteFeed {
            name: name.into(),
            url,
        }
    }
}

impl Feeder for WebsiteFeed {
    fn name(&self) -> &str {
        &self.name
    }

    fn url(&self) -> &Url {
        &self.url
    }

    fn transform(&self, body: &[u8]) -> Result<Vec<DashboardItem>, FeedError> {
        let entries = newest_first(feed_rs::parser::parse(body)?.entries);

        Ok(entries
            .iter()
            .map(|entry| {
                let name = text(&entry.title);
                let author = author(entry);
                let published = entry_date(entry);
                let description = format!(
                    "{name}\n{author}\n{}",
                    published.map(|d| d.to_rfc2822()).unwrap_or_default()
                );

                DashboardItem {
                    id: entry.id.clone(),
                    description,
                    date_added: rfc3339(published),
                    publication_date: rfc3339(published),
                    content: text(&entry.summary),
                    link: link(entry),
                    name,
                    author,
                    thumbnail_url: String::new(),
                }
            })
            .collect())
    }
}

/// Video channel feed; descriptions and thumbnails come from the media group.
pub struct VideoFeed {
    name: String,
    url: Url,
}

impl VideoFeed {
    pub fn new(name: impl Into<String>, url: Url) -> Self {
        VideoFeed {
            name: name.into(),
            url,
        }
    }
}

impl Feeder for VideoFeed {
    fn name(&self) -> &str {
        &self.name
    }

    fn url(&self) -> &Url {
        &self.url
    }

    fn transform(&self, body: &[u8]) -> Result<Vec<DashboardItem>, FeedError> {
        let entries = newest_first(feed_rs::parser::parse(body)?.entries);

        Ok(entries
            .iter()
            .map(|entry| {
                let media = entry.media.first();
                let description = media.map(|m| text(&m.description)).unwrap_or_default();
                let thumbnail_url = media
                    .and_then(|m| m.thumbnails.first())
                    .map(|t| t.image.uri.clone())
                    .unwrap_or_default();
                let published = entry_date(entry);

                DashboardItem {
                    id: entry.id.clone(),
                    name: text(&entry.title),
                    description,
                    date_added: rfc3339(published),
                    author: author(entry),
                    publication_date: rfc3339(published),
                    content: entry
                        .content
                        .as_ref()
                        .and_then(|c| c.body.clone())
                        .unwrap_or_default(),
                    link: link(entry),
                    thumbnail_url,
                }
            })
            .collect())
    }
}

/// Instant launches tagged for the dashboard, pulled from app-exposer as a
/// JSON array. Upstream order is kept.
pub struct InstantLaunchFeed {
    url: Url,
}

impl InstantLaunchFeed {
    pub fn new(app_exposer_url: &Url, user: &str) -> Result<Self, ValidationError> {
        let mut url = crate::config::join_path(app_exposer_url, "instantlaunches/metadata/full")?;
        url.query_pairs_mut()
            .append_pair("user", user)
            .append_pair("attribute", "ui_location")
            .append_pair("value", "dashboard");

        Ok(InstantLaunchFeed { url })
    }
}

impl Feeder for InstantLaunchFeed {
    fn name(&self) -> &str {
        INSTANT_LAUNCHES_FEED
    }

    fn url(&self) -> &Url {
        &self.url
    }

    fn transform(&self, body: &[u8]) -> Result<Vec<DashboardItem>, FeedError> {
        Ok(serde_json::from_slice(body)?)
    }
}

fn newest_first(mut entries: Vec<Entry>) -> Vec<Entry> {
    // Undated entries sort last.
    entries.sort_by(|a, b| entry_date(b).cmp(&entry_date(a)));
    entries
}

fn entry_date(entry: &Entry) -> Option<DateTime<Utc>> {
    entry.published.or(entry.updated)
}

fn rfc3339(date: Option<DateTime<Utc>>) -> String {
    date.map(|d| d.to_rfc3339()).unwrap_or_default()
}

fn text(value: &Option<feed_rs::model::Text>) -> String {
    value.as_ref().map(|t| t.content.clone()).unwrap_or_default()
}

fn author(entry: &Entry) -> String {
    entry
        .authors
        .first()
        .map(|p| p.name.clone())
        .unwrap_or_default()
}

fn link(entry: &Entry) -> String {
    entry
        .links
        .first()
        .map(|l| l.href.clone())
        .unwrap_or_default()
}
