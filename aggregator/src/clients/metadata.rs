use super::{MetadataClient, endpoint, send_json};
use crate::errors::UpstreamError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Serialize)]
struct Avu<'a> {
    attr: &'a str,
    value: &'a str,
}

#[derive(Serialize)]
struct FilterTargetsRequest<'a> {
    #[serde(rename = "target-types")]
    target_types: [&'a str; 1],
    #[serde(rename = "target-ids")]
    target_ids: &'a [String],
    avus: [Avu<'a>; 1],
}

#[derive(Deserialize)]
struct FilterTargetsResponse {
    #[serde(rename = "target-ids", default)]
    target_ids: Vec<String>,
}

/// Filters app IDs by the featured-app AVU.
pub struct HttpMetadataClient {
    client: reqwest::Client,
    metadata_url: Url,
    featured_attr: String,
    featured_value: String,
}

impl HttpMetadataClient {
    pub fn new(
        client: reqwest::Client,
        metadata_url: Url,
        featured_attr: impl Into<String>,
        featured_value: impl Into<String>,
    ) -> Self {
        HttpMetadataClient {
            client,
            metadata_url,
            featured_attr: featured_attr.into(),
            featured_value: featured_value.into(),
        }
    }
}

#[async_trait]
impl MetadataClient for HttpMetadataClient {
    async fn featured_app_ids(
        &self,
        username: &str,
        app_ids: &[String],
    ) -> Result<Vec<String>, UpstreamError> {
        let mut url = endpoint(&self.metadata_url, &["avus", "filter-targets"])?;
        url.query_pairs_mut().append_pair("user", username);

        let body = FilterTargetsRequest {
            target_types: ["app"],
            target_ids: app_ids,
            avus: [Avu {
                attr: &self.featured_attr,
                value: &self.featured_value,
            }],
        };

        let response: FilterTargetsResponse =
            send_json(self.client.post(url).json(&body)).await?;
        Ok(response.target_ids)
    }
}
