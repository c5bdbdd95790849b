//! Process-wide cache of the public news, events, and video feeds.
//!
//! A single worker task owns refreshing. Readers take the last published
//! snapshot and never wait on a refresh in progress.

pub mod config;
pub mod feeder;
pub mod metrics_defs;
pub mod types;

use crate::feeder::{Feeder, pull_items};
use crate::metrics_defs::{FEED_REFRESH_DURATION, FEED_REFRESH_FAILURES};
use parking_lot::{Mutex, RwLock};
use shared::{counter, histogram};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Semaphore, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub use types::{DashboardItem, FeedSnapshot};

#[derive(thiserror::Error, Debug)]
pub enum FeedError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("status code from {url} was {status}")]
    Status { url: String, status: u16 },

    #[error("could not parse feed: {0}")]
    Parse(#[from] feed_rs::parser::ParseFeedError),

    #[error("could not decode items: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid feed configuration: {0}")]
    Config(#[from] config::ValidationError),

    #[error("the feed refresher is not running")]
    WorkerGone,
}

/// Outcome of one refresh pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RefreshSummary {
    pub refreshed: Vec<String>,
    pub failed: Vec<String>,
}

#[derive(Debug)]
pub enum Command {
    // Refresh every feed now instead of waiting for the next tick.
    // The worker replies once the pass finishes.
    Refresh(oneshot::Sender<RefreshSummary>),
    // Stop the worker after the current pass.
    Shutdown,
}

/// Handle to the feed cache and its refresh worker.
#[derive(Clone)]
pub struct FeedCache {
    inner: Arc<FeedCacheInner>,
}

struct FeedCacheInner {
    feeds: Arc<PublicFeeds>,
    tx: mpsc::Sender<Command>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl FeedCache {
    /// Builds the cache from configuration and starts its refresh worker.
    /// Must be called from within a tokio runtime.
    pub fn from_config(
        config: &config::Config,
        client: reqwest::Client,
    ) -> Result<Self, FeedError> {
        Ok(Self::start(
            config.feeders()?,
            client,
            config.item_limit,
            config.refresh_interval(),
        ))
    }

    /// Starts a worker that pulls every feeder immediately and then once per
    /// `refresh_interval`.
    pub fn start(
        feeders: Vec<Arc<dyn Feeder>>,
        client: reqwest::Client,
        item_limit: usize,
        refresh_interval: Duration,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<Command>(16);
        let feeds = Arc::new(PublicFeeds::new(feeders, client, item_limit));

        let worker_feeds = feeds.clone();
        let handle = tokio::spawn(async move {
            worker_feeds.run(rx, refresh_interval).await;
        });

        FeedCache {
            inner: Arc::new(FeedCacheInner {
                feeds,
                tx,
                handle: Mutex::new(Some(handle)),
            }),
        }
    }

    /// A cache that always serves `snapshot` and has no worker.
    pub fn preloaded(snapshot: FeedSnapshot) -> Self {
        let (tx, _rx) = mpsc::channel::<Command>(1);
        let feeds = PublicFeeds::new(Vec::new(), reqwest::Client::new(), 0);
        *feeds.snapshot.write() = Arc::new(snapshot);
        feeds.ready.store(true, Ordering::Relaxed);

        FeedCache {
            inner: Arc::new(FeedCacheInner {
                feeds: Arc::new(feeds),
                tx,
                handle: Mutex::new(None),
            }),
        }
    }

    /// The last published snapshot.
    pub fn snapshot(&self) -> Arc<FeedSnapshot> {
        self.inner.feeds.snapshot()
    }

    pub fn is_ready(&self) -> bool {
        self.inner.feeds.ready.load(Ordering::Relaxed)
    }

    /// Asks the worker for an immediate refresh and waits for it to finish.
    pub async fn refresh(&self) -> Result<RefreshSummary, FeedError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.inner
            .tx
            .send(Command::Refresh(reply_tx))
            .await
            .map_err(|_| FeedError::WorkerGone)?;
        reply_rx.await.map_err(|_| FeedError::WorkerGone)
    }

    /// Stops the worker and waits for it to exit.
    pub async fn shutdown(&self) {
        let _ = self.inner.tx.send(Command::Shutdown).await;
        let handle = self.inner.handle.lock().take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            tracing::error!(error = %e, "feed refresher exited abnormally");
        }
    }
}

/// The feeders and the published snapshot. Used internally by the FeedCache.
struct PublicFeeds {
    client: reqwest::Client,
    feeders: Vec<Arc<dyn Feeder>>,
    item_limit: usize,
    snapshot: RwLock<Arc<FeedSnapshot>>,
    // Guards against overlapping refresh passes.
    update_lock: Semaphore,
    // Set once the first pass has completed, whether or not every feed succeeded.
    ready: AtomicBool,
}

impl PublicFeeds {
    fn new(feeders: Vec<Arc<dyn Feeder>>, client: reqwest::Client, item_limit: usize) -> Self {
        // Every feed is present from the start so readers always see its key.
        let initial: FeedSnapshot = feeders
            .iter()
            .map(|f| (f.name().to_string(), Vec::new()))
            .collect();

        PublicFeeds {
            client,
            feeders,
            item_limit,
            snapshot: RwLock::new(Arc::new(initial)),
            update_lock: Semaphore::new(1),
            ready: AtomicBool::new(false),
        }
    }

    fn snapshot(&self) -> Arc<FeedSnapshot> {
        self.snapshot.read().clone()
    }

    /// Refreshes on every tick (the first tick is immediate) and on demand
    /// until Shutdown is received or every handle is dropped.
    async fn run(&self, mut rx: mpsc::Receiver<Command>, refresh_interval: Duration) {
        let mut ticker = tokio::time::interval(refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.refresh().await;
                }
                cmd = rx.recv() => match cmd {
                    Some(Command::Refresh(reply)) => {
                        let summary = self.refresh().await;
                        let _ = reply.send(summary);
                    }
                    Some(Command::Shutdown) | None => {
                        tracing::info!("feed refresher shutting down");
                        return;
                    }
                }
            }
        }
    }

    /// Pulls every feed and publishes a new snapshot. A feed that fails keeps
    /// the items it had before.
    async fn refresh(&self) -> RefreshSummary {
        let mut summary = RefreshSummary::default();
        let Ok(_permit) = self.update_lock.acquire().await else {
            return summary;
        };

        let mut next = (*self.snapshot()).clone();

        for feeder in &self.feeders {
            let name = feeder.name().to_string();
            let started = Instant::now();

            match pull_items(&self.client, feeder.as_ref(), self.item_limit).await {
                Ok(items) => {
                    tracing::debug!(feed = %name, count = items.len(), "refreshed feed");
                    next.insert(name.clone(), items);
                    summary.refreshed.push(name.clone());
                }
                Err(e) => {
                    tracing::error!(
                        feed = %name,
                        url = %feeder.url(),
                        error = %e,
                        "failed to refresh feed, keeping previous items"
                    );
                    counter!(FEED_REFRESH_FAILURES, "feed" => name.clone()).increment(1);
                    summary.failed.push(name.clone());
                }
            }

            histogram!(FEED_REFRESH_DURATION, "feed" => name)
                .record(started.elapsed().as_secs_f64());
        }

        *self.snapshot.write() = Arc::new(next);
        self.ready.store(true, Ordering::Relaxed);

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feeder::{InstantLaunchFeed, WebsiteFeed};
    use reqwest::StatusCode;
    use shared::testutils::{MockReply, MockServer};
    use url::Url;

    fn rss(titles: &[&str]) -> String {
        let items: String = titles
            .iter()
            .enumerate()
            .map(|(i, t)| {
                format!(
                    "<item><title>{t}</title><guid>{t}</guid><link>https://cyverse.org/{i}</link>\
                     <pubDate>Mon, 0{} Jan 2024 10:00:00 +0000</pubDate></item>",
                    i + 1
                )
            })
            .collect();
        format!(
            "<?xml version=\"1.0\"?><rss version=\"2.0\"><channel><title>t</title>\
             <link>https://cyverse.org</link><description>d</description>{items}</channel></rss>"
        )
    }

    #[tokio::test]
    async fn test_refresh_publishes_snapshot() {
        let server = MockServer::start(|_| MockReply::xml(rss(&["a", "b", "c"]))).await;
        let url = Url::parse(&format!("{}/news/feed", server.url())).unwrap();

        let cache = FeedCache::start(
            vec![Arc::new(WebsiteFeed::new("news", url))],
            reqwest::Client::new(),
            2,
            Duration::from_secs(3600),
        );

        let summary = cache.refresh().await.unwrap();
        assert_eq!(summary.refreshed, vec!["news".to_string()]);
        assert!(cache.is_ready());

        let snapshot = cache.snapshot();
        let news = snapshot.get("news").unwrap();
        // Limited to two items, newest first.
        assert_eq!(news.len(), 2);
        assert_eq!(news[0].name, "c");
        assert_eq!(news[1].name, "b");

        cache.shutdown().await;
    }

    #[tokio::test]
    async fn test_failed_feed_keeps_previous_items() {
        let healthy = Arc::new(AtomicBool::new(true));
        let flag = healthy.clone();
        let server = MockServer::start(move |_| {
            if flag.load(Ordering::Relaxed) {
                MockReply::json(r#"[{"id": "il-1", "name": "Jupyter"}]"#)
            } else {
                MockReply::status(StatusCode::BAD_GATEWAY, "down")
            }
        })
        .await;
        let base = Url::parse(&server.url()).unwrap();

        let cache = FeedCache::start(
            vec![Arc::new(InstantLaunchFeed::new(&base, "de-admin").unwrap())],
            reqwest::Client::new(),
            10,
            Duration::from_secs(3600),
        );
        cache.refresh().await.unwrap();
        let before = cache.snapshot();

        healthy.store(false, Ordering::Relaxed);
        let summary = cache.refresh().await.unwrap();
        assert_eq!(summary.failed, vec!["instant-launches".to_string()]);

        let after = cache.snapshot();
        assert_eq!(after.get("instant-launches").unwrap()[0].id, "il-1");
        // The earlier snapshot handed to a reader is unaffected by later passes.
        assert_eq!(before, after);

        cache.shutdown().await;
    }

    #[tokio::test]
    async fn test_snapshot_has_every_feed_before_first_pull() {
        let feeds = PublicFeeds::new(
            vec![Arc::new(WebsiteFeed::new(
                "events",
                Url::parse("http://127.0.0.1:1/events").unwrap(),
            ))],
            reqwest::Client::new(),
            10,
        );
        let snapshot = feeds.snapshot();
        assert_eq!(snapshot.get("events"), Some(&Vec::new()));
        assert!(!feeds.ready.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn test_refresh_after_shutdown_fails() {
        let cache = FeedCache::start(
            Vec::new(),
            reqwest::Client::new(),
            10,
            Duration::from_secs(3600),
        );
        cache.shutdown().await;
        assert!(matches!(cache.refresh().await, Err(FeedError::WorkerGone)));
    }

    #[test]
    fn test_preloaded_cache_serves_snapshot() {
        let mut snapshot = FeedSnapshot::new();
        snapshot.insert(
            "news".into(),
            vec![DashboardItem {
                id: "1".into(),
                ..Default::default()
            }],
        );
        let cache = FeedCache::preloaded(snapshot.clone());
        assert!(cache.is_ready());
        assert_eq!(*cache.snapshot(), snapshot);
    }
}
