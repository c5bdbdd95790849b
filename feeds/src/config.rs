use crate::feeder::{Feeder, InstantLaunchFeed, VideoFeed, WebsiteFeed};
use crate::types::{EVENTS_FEED, NEWS_FEED, VIDEOS_FEED};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("feeds.item_limit must be greater than 0")]
    InvalidItemLimit,

    #[error("feeds.refresh_interval_secs must be greater than 0")]
    InvalidRefreshInterval,

    #[error("{0} must be set in the configuration")]
    Missing(&'static str),

    #[error("cannot join a path onto {0}")]
    CannotBeABase(String),
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct WebsiteConfig {
    pub url: Url,
    pub news_path: String,
    pub events_path: String,
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct InstantLaunchesConfig {
    pub url: Url,
    pub user: String,
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct Config {
    /// Maximum number of items kept per feed.
    #[serde(default = "default_item_limit")]
    pub item_limit: usize,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    pub website: WebsiteConfig,
    pub videos_url: Url,
    pub instant_launches: Option<InstantLaunchesConfig>,
}

fn default_item_limit() -> usize {
    10
}

fn default_refresh_interval_secs() -> u64 {
    3600
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.item_limit == 0 {
            return Err(ValidationError::InvalidItemLimit);
        }
        if self.refresh_interval_secs == 0 {
            return Err(ValidationError::InvalidRefreshInterval);
        }
        if self.website.news_path.trim().is_empty() {
            return Err(ValidationError::Missing("website.news_path"));
        }
        if self.website.events_path.trim().is_empty() {
            return Err(ValidationError::Missing("website.events_path"));
        }
        if let Some(il) = &self.instant_launches
            && il.user.is_empty()
        {
            return Err(ValidationError::Missing("instant_launches.user"));
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn news_url(&self) -> Result<Url, ValidationError> {
        join_path(&self.website.url, &self.website.news_path)
    }

    pub fn events_url(&self) -> Result<Url, ValidationError> {
        join_path(&self.website.url, &self.website.events_path)
    }

    /// Builds one feeder per configured source.
    pub fn feeders(&self) -> Result<Vec<Arc<dyn Feeder>>, ValidationError> {
        let mut feeders: Vec<Arc<dyn Feeder>> = vec![
            Arc::new(WebsiteFeed::new(NEWS_FEED, self.news_url()?)),
            Arc::new(WebsiteFeed::new(EVENTS_FEED, self.events_url()?)),
            Arc::new(VideoFeed::new(VIDEOS_FEED, self.videos_url.clone())),
        ];

        if let Some(il) = &self.instant_launches {
            feeders.push(Arc::new(InstantLaunchFeed::new(&il.url, &il.user)?));
        }

        Ok(feeders)
    }
}

/// Appends `path` to the base URL's path, keeping a trailing slash if `path`
/// has one.
pub fn join_path(base: &Url, path: &str) -> Result<Url, ValidationError> {
    let mut url = base.clone();
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| ValidationError::CannotBeABase(base.to_string()))?;
        segments
            .pop_if_empty()
            .extend(path.split('/').filter(|s| !s.is_empty()));
        if path.ends_with('/') {
            segments.push("");
        }
    }
    Ok(url)
}
