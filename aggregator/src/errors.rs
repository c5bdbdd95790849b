use crate::task_graph::Task;
use std::time::Duration;
use thiserror::Error;

/// Bad input from the caller. Reported before any upstream call is made.
#[derive(Error, Debug, PartialEq)]
pub enum RequestError {
    #[error("username must be in the requested path")]
    MissingUsername,

    #[error("could not parse limit as an integer: {0}")]
    InvalidLimit(String),

    #[error("limit must be greater than 0")]
    NonPositiveLimit,

    #[error("invalid start-date-interval: {0}")]
    InvalidInterval(String),
}

/// A single collaborator call failed. Every variant is handled the same way
/// by the executor.
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("HTTP client error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("url {url}; status code {status}; msg: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("could not decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid upstream URL: {0}")]
    Url(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("health check failed: {0}")]
    Unhealthy(String),
}

/// Failure of a whole dashboard request. Exactly one of these is reported per
/// request, no matter how many tasks failed.
#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("{task} failed: {source}")]
    Upstream {
        task: Task,
        #[source]
        source: UpstreamError,
    },

    #[error("request exceeded its deadline of {0:?}")]
    DeadlineExceeded(Duration),

    #[error("{task} task aborted: {message}")]
    TaskAborted { task: Task, message: String },

    #[error("outcome for {0} was published twice")]
    DuplicateOutcome(Task),

    #[error("no outcome for {0}")]
    MissingOutcome(Task),
}

impl DashboardError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            DashboardError::Upstream { .. } => "upstream",
            DashboardError::DeadlineExceeded(_) => "deadline",
            DashboardError::TaskAborted { .. }
            | DashboardError::DuplicateOutcome(_)
            | DashboardError::MissingOutcome(_) => "internal",
        }
    }
}

/// Errors that stop the service from starting or serving.
#[derive(Error, Debug)]
pub enum AggregatorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not resolve the public group: {0}")]
    PublicGroup(#[source] UpstreamError),

    #[error("could not connect to the database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("feed cache error: {0}")]
    Feeds(#[from] feeds::FeedError),
}
