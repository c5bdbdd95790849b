//! Clients for the REST collaborators behind the dashboard.
//!
//! Each client makes one HTTP call per method and maps every failure to an
//! [`UpstreamError`]. Retries are left to the caller.

pub mod analyses;
pub mod instant_launches;
pub mod metadata;
pub mod permissions;

use crate::errors::UpstreamError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

pub use analyses::HttpAnalysesClient;
pub use instant_launches::HttpInstantLaunchesClient;
pub use metadata::HttpMetadataClient;
pub use permissions::HttpPermissionsClient;

/// The analyses envelope returned by the apps service. Individual analyses
/// are passed through untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisListing {
    #[serde(default)]
    pub analyses: Vec<serde_json::Value>,
}

#[async_trait]
pub trait AnalysesClient: Send + Sync {
    /// The user's analyses, newest first.
    async fn recent_analyses(
        &self,
        username: &str,
        limit: i64,
    ) -> Result<AnalysisListing, UpstreamError>;

    /// The user's analyses in the `Running` state, newest first.
    async fn running_analyses(
        &self,
        username: &str,
        limit: i64,
    ) -> Result<AnalysisListing, UpstreamError>;
}

#[async_trait]
pub trait PermissionsClient: Send + Sync {
    /// IDs of the apps the public group can access, in the order returned.
    async fn public_app_ids(&self) -> Result<Vec<String>, UpstreamError>;
}

#[async_trait]
pub trait MetadataClient: Send + Sync {
    /// The subset of `app_ids` tagged with the featured attribute and value.
    async fn featured_app_ids(
        &self,
        username: &str,
        app_ids: &[String],
    ) -> Result<Vec<String>, UpstreamError>;
}

#[async_trait]
pub trait InstantLaunchesClient: Send + Sync {
    /// Instant launches marked for display on the dashboard.
    async fn dashboard_instant_launches(
        &self,
        username: &str,
    ) -> Result<Vec<serde_json::Value>, UpstreamError>;
}

/// Appends path segments to `base`. Segments are percent-encoded.
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, UpstreamError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| UpstreamError::Url(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Sends the request and decodes a JSON body. Any non-2xx status is an
/// error carrying the response body.
pub(crate) async fn send_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
) -> Result<T, UpstreamError> {
    let response = request.send().await?;
    let url = response.url().to_string();
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::debug!(%url, status = status.as_u16(), "upstream returned an error");
        return Err(UpstreamError::Status {
            url,
            status: status.as_u16(),
            body,
        });
    }

    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|source| UpstreamError::Decode { url, source })
}
