//! Serves the Discovery Environment dashboard: one JSON document per user,
//! assembled from the apps, permissions, metadata, and app-exposer services,
//! the DE database, and the cached public feeds.

pub mod api;
pub mod clients;
pub mod config;
pub mod db;
pub mod errors;
pub mod executor;
pub mod metrics_defs;
pub mod request;
pub mod response;
pub mod task_graph;

#[cfg(test)]
mod testutils;

use crate::api::AppState;
use crate::clients::{
    HttpAnalysesClient, HttpInstantLaunchesClient, HttpMetadataClient, HttpPermissionsClient,
};
use crate::db::PgAppQuery;
use crate::executor::{Collaborators, DashboardExecutor};
use feeds::FeedCache;
use shared::admin_service::AdminService;
use shared::http::run_http_service;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;

pub use config::Config;
pub use errors::AggregatorError;

/// Builds a reqwest client for collaborator calls.
pub fn http_client(config: &Config) -> Result<reqwest::Client, AggregatorError> {
    Ok(reqwest::Client::builder()
        .timeout(config.timeouts.http_timeout())
        .build()?)
}

/// Serves the dashboard API and the admin listener until `shutdown`
/// resolves, then stops the feed worker and closes the database pool.
pub async fn run<F>(config: Config, feeds: FeedCache, shutdown: F) -> Result<(), AggregatorError>
where
    F: Future<Output = ()> + Send,
{
    let client = http_client(&config)?;

    let permissions = HttpPermissionsClient::resolve(client.clone(), &config.permissions)
        .await
        .map_err(AggregatorError::PublicGroup)?;
    let apps = Arc::new(PgAppQuery::connect(&config.db).await?);
    tracing::info!(host = %config.db.host, database = %config.db.database, "connected to the database");

    let collaborators = Collaborators {
        analyses: Arc::new(HttpAnalysesClient::new(
            client.clone(),
            config.apps.url.clone(),
        )),
        permissions: Arc::new(permissions),
        metadata: Arc::new(HttpMetadataClient::new(
            client.clone(),
            config.metadata.url.clone(),
            &config.metadata.featured_apps_attr,
            &config.metadata.featured_apps_value,
        )),
        instant_launches: Arc::new(HttpInstantLaunchesClient::new(
            client,
            config.app_exposer.url.clone(),
        )),
        apps: apps.clone(),
    };
    let executor = DashboardExecutor::new(
        collaborators,
        config.apps.favorites_group_index,
        config.timeouts.request_timeout(),
    );
    let app = api::router(AppState {
        executor,
        feeds: feeds.clone(),
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let listener =
        TcpListener::bind(format!("{}:{}", config.listener.host, config.listener.port)).await?;
    tracing::info!(
        host = %config.listener.host,
        port = config.listener.port,
        "dashboard listening"
    );
    let api_rx = shutdown_rx.clone();
    let api_task = async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_requested(api_rx))
            .await?;
        Ok::<_, AggregatorError>(())
    };

    let readiness = feeds.clone();
    let admin_service =
        AdminService::<AggregatorError>::new().with_probe("feeds", move || readiness.is_ready());
    let admin_task = run_http_service(
        &config.admin_listener.host,
        config.admin_listener.port,
        admin_service,
        shutdown_requested(shutdown_rx),
    );

    let signal_task = async move {
        shutdown.await;
        tracing::info!("shutdown requested");
        let _ = shutdown_tx.send(true);
        Ok::<_, AggregatorError>(())
    };

    let result = tokio::try_join!(api_task, admin_task, signal_task);

    feeds.shutdown().await;
    apps.close().await;

    result.map(|_| ())
}

async fn shutdown_requested(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}
