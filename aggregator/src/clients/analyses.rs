use super::{AnalysesClient, AnalysisListing, endpoint, send_json};
use crate::errors::UpstreamError;
use async_trait::async_trait;
use url::Url;

const RUNNING_FILTER: &str = r#"[{"field":"status","value":"Running"}]"#;

/// Lists analyses through the apps service.
pub struct HttpAnalysesClient {
    client: reqwest::Client,
    apps_url: Url,
}

impl HttpAnalysesClient {
    pub fn new(client: reqwest::Client, apps_url: Url) -> Self {
        HttpAnalysesClient { client, apps_url }
    }

    fn listing_url(
        &self,
        username: &str,
        limit: i64,
        filter: Option<&str>,
    ) -> Result<Url, UpstreamError> {
        let mut url = endpoint(&self.apps_url, &["analyses"])?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("limit", &limit.to_string())
                .append_pair("user", username)
                .append_pair("sort-field", "startdate")
                .append_pair("sort-dir", "DESC");
            if let Some(filter) = filter {
                query.append_pair("filter", filter);
            }
        }
        Ok(url)
    }

    async fn list(
        &self,
        username: &str,
        limit: i64,
        filter: Option<&str>,
    ) -> Result<AnalysisListing, UpstreamError> {
        let url = self.listing_url(username, limit, filter)?;
        tracing::debug!(user = username, %url, "listing analyses");
        send_json(self.client.get(url)).await
    }
}

#[async_trait]
impl AnalysesClient for HttpAnalysesClient {
    async fn recent_analyses(
        &self,
        username: &str,
        limit: i64,
    ) -> Result<AnalysisListing, UpstreamError> {
        self.list(username, limit, None).await
    }

    async fn running_analyses(
        &self,
        username: &str,
        limit: i64,
    ) -> Result<AnalysisListing, UpstreamError> {
        self.list(username, limit, Some(RUNNING_FILTER)).await
    }
}
