use super::{InstantLaunchesClient, endpoint, send_json};
use crate::errors::UpstreamError;
use async_trait::async_trait;
use url::Url;

/// Fetches instant launches tagged for the dashboard from app-exposer.
pub struct HttpInstantLaunchesClient {
    client: reqwest::Client,
    app_exposer_url: Url,
}

impl HttpInstantLaunchesClient {
    pub fn new(client: reqwest::Client, app_exposer_url: Url) -> Self {
        HttpInstantLaunchesClient {
            client,
            app_exposer_url,
        }
    }
}

#[async_trait]
impl InstantLaunchesClient for HttpInstantLaunchesClient {
    async fn dashboard_instant_launches(
        &self,
        username: &str,
    ) -> Result<Vec<serde_json::Value>, UpstreamError> {
        let mut url = endpoint(
            &self.app_exposer_url,
            &["instantlaunches", "metadata", "full"],
        )?;
        url.query_pairs_mut()
            .append_pair("user", username)
            .append_pair("attribute", "ui_location")
            .append_pair("value", "dashboard");

        send_json(self.client.get(url)).await
    }
}
