use super::{PermissionsClient, endpoint, send_json};
use crate::config::PermissionsConfig;
use crate::errors::UpstreamError;
use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

#[derive(Deserialize)]
struct Group {
    id: String,
}

#[derive(Deserialize)]
struct Permission {
    resource_name: String,
}

#[derive(Deserialize)]
struct PermissionsResponse {
    #[serde(default)]
    permissions: Vec<Permission>,
}

/// Looks up which apps the public group can see.
pub struct HttpPermissionsClient {
    client: reqwest::Client,
    /// Fully built `.../subjects/group/{id}/app` URL.
    public_apps_url: Url,
}

impl HttpPermissionsClient {
    /// Resolves the configured public group name to its ID. Done once, at
    /// startup.
    pub async fn resolve(
        client: reqwest::Client,
        config: &PermissionsConfig,
    ) -> Result<Self, UpstreamError> {
        let mut url = endpoint(&config.groups_url, &["groups", &config.public_group])?;
        url.query_pairs_mut()
            .append_pair("user", &config.grouper_user);

        let group: Group = send_json(client.get(url)).await?;
        tracing::info!(
            group = %config.public_group,
            id = %group.id,
            "resolved public group"
        );

        Self::with_group_id(client, &config.url, &group.id)
    }

    pub fn with_group_id(
        client: reqwest::Client,
        permissions_url: &Url,
        group_id: &str,
    ) -> Result<Self, UpstreamError> {
        let public_apps_url = endpoint(
            permissions_url,
            &["permissions", "abbreviated", "subjects", "group", group_id, "app"],
        )?;
        Ok(HttpPermissionsClient {
            client,
            public_apps_url,
        })
    }
}

#[async_trait]
impl PermissionsClient for HttpPermissionsClient {
    async fn public_app_ids(&self) -> Result<Vec<String>, UpstreamError> {
        let response: PermissionsResponse =
            send_json(self.client.get(self.public_apps_url.clone())).await?;
        Ok(response
            .permissions
            .into_iter()
            .map(|p| p.resource_name)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use shared::testutils::{MockReply, MockServer};

    fn config(server: &MockServer) -> PermissionsConfig {
        let url = Url::parse(&server.url()).unwrap();
        PermissionsConfig {
            url: url.clone(),
            groups_url: url,
            public_group: "de-users".into(),
            grouper_user: "de-grouper".into(),
        }
    }

    #[tokio::test]
    async fn test_resolve_then_list_public_apps() {
        let server = MockServer::start(|request| {
            if request.path.starts_with("/groups/") {
                MockReply::json(r#"{"id":"a1b2","name":"de-users"}"#)
            } else {
                MockReply::json(
                    r#"{"permissions":[
                        {"resource_name":"app-1","permission_level":"read"},
                        {"resource_name":"app-2","permission_level":"read"}
                    ]}"#,
                )
            }
        })
        .await;

        let client = HttpPermissionsClient::resolve(reqwest::Client::new(), &config(&server))
            .await
            .unwrap();
        let ids = client.public_app_ids().await.unwrap();
        assert_eq!(ids, vec!["app-1".to_string(), "app-2".to_string()]);

        let requests = server.requests();
        assert_eq!(requests[0].path, "/groups/de-users");
        assert_eq!(requests[0].query.as_deref(), Some("user=de-grouper"));
        assert_eq!(
            requests[1].path,
            "/permissions/abbreviated/subjects/group/a1b2/app"
        );
    }

    #[tokio::test]
    async fn test_resolve_fails_without_group_id() {
        let server = MockServer::start(|_| MockReply::json(r#"{"name":"de-users"}"#)).await;
        let result = HttpPermissionsClient::resolve(reqwest::Client::new(), &config(&server)).await;
        assert!(matches!(result, Err(UpstreamError::Decode { .. })));
    }

    #[tokio::test]
    async fn test_public_app_ids_error_status() {
        let server =
            MockServer::start(|_| MockReply::status(StatusCode::NOT_FOUND, "no such group")).await;
        let client = HttpPermissionsClient::with_group_id(
            reqwest::Client::new(),
            &Url::parse(&server.url()).unwrap(),
            "a1b2",
        )
        .unwrap();
        assert!(matches!(
            client.public_app_ids().await,
            Err(UpstreamError::Status { status: 404, .. })
        ));
    }
}
