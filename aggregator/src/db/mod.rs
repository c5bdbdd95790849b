//! The app catalog, read straight from the DE database.

pub mod queries;

use crate::config::DbConfig;
use crate::errors::UpstreamError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use std::sync::Arc;
use std::time::Duration;

/// An app summary as listed on the dashboard.
#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
pub struct App {
    pub id: String,
    pub system_id: String,
    pub name: String,
    pub description: Option<String>,
    pub wiki_url: Option<String>,
    pub integration_date: Option<DateTime<Utc>>,
    pub edited_date: Option<DateTime<Utc>>,
    pub username: Option<String>,
    /// Only populated by the popular featured listing.
    #[sqlx(default)]
    pub job_count: i64,
    pub is_favorite: bool,
    pub is_public: bool,
}

/// Parameters shared by every listing.
#[derive(Clone, Debug)]
pub struct AppsQuery {
    pub username: String,
    pub favorites_group_index: i32,
    /// Candidate app IDs. Listings never return apps outside this set except
    /// `recently_added_apps`, which uses it only for `is_public`.
    pub app_ids: Arc<[String]>,
    /// A PostgreSQL interval literal.
    pub start_date_interval: String,
    pub limit: i64,
}

#[async_trait]
pub trait AppQuery: Send + Sync {
    async fn recently_added_apps(&self, query: &AppsQuery) -> Result<Vec<App>, UpstreamError>;

    async fn public_apps(&self, query: &AppsQuery) -> Result<Vec<App>, UpstreamError>;

    async fn recently_used_apps(&self, query: &AppsQuery) -> Result<Vec<App>, UpstreamError>;

    async fn popular_featured_apps(&self, query: &AppsQuery) -> Result<Vec<App>, UpstreamError>;

    async fn recently_ran_apps(&self, query: &AppsQuery) -> Result<Vec<App>, UpstreamError>;

    /// Whether the database parses `interval` as an interval. `Err` only when
    /// the database could not be asked.
    async fn validate_interval(&self, interval: &str) -> Result<bool, UpstreamError>;

    /// Succeeds when the database is reachable and has a schema version.
    async fn healthz(&self) -> Result<(), UpstreamError>;
}

pub struct PgAppQuery {
    pool: PgPool,
}

impl PgAppQuery {
    pub async fn connect(config: &DbConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .idle_timeout(Duration::from_secs(60))
            .connect_with(connect_options(config))
            .await?;
        Ok(Self::new(pool))
    }

    pub fn new(pool: PgPool) -> Self {
        PgAppQuery { pool }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn listing(
        &self,
        sql: &'static str,
        query: &AppsQuery,
        with_interval: bool,
    ) -> Result<Vec<App>, UpstreamError> {
        let mut q = sqlx::query_as::<_, App>(sql)
            .bind(query.username.clone())
            .bind(query.favorites_group_index)
            .bind(query.app_ids.to_vec());
        if with_interval {
            q = q.bind(query.start_date_interval.clone());
        }
        let apps = q.bind(query.limit).fetch_all(&self.pool).await?;
        Ok(apps)
    }
}

fn connect_options(config: &DbConfig) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .password(&config.password)
        .database(&config.database)
}

#[async_trait]
impl AppQuery for PgAppQuery {
    async fn recently_added_apps(&self, query: &AppsQuery) -> Result<Vec<App>, UpstreamError> {
        self.listing(queries::RECENTLY_ADDED_APPS, query, false).await
    }

    async fn public_apps(&self, query: &AppsQuery) -> Result<Vec<App>, UpstreamError> {
        self.listing(queries::PUBLIC_APPS, query, false).await
    }

    async fn recently_used_apps(&self, query: &AppsQuery) -> Result<Vec<App>, UpstreamError> {
        self.listing(queries::RECENTLY_USED_APPS, query, true).await
    }

    async fn popular_featured_apps(&self, query: &AppsQuery) -> Result<Vec<App>, UpstreamError> {
        self.listing(queries::POPULAR_FEATURED_APPS, query, true).await
    }

    async fn recently_ran_apps(&self, query: &AppsQuery) -> Result<Vec<App>, UpstreamError> {
        self.listing(queries::RECENTLY_RAN_APPS, query, true).await
    }

    async fn validate_interval(&self, interval: &str) -> Result<bool, UpstreamError> {
        let result = sqlx::query(queries::VALIDATE_INTERVAL)
            .bind(interval)
            .execute(&self.pool)
            .await;
        match result {
            Ok(_) => Ok(true),
            Err(sqlx::Error::Database(e)) => {
                tracing::debug!(interval, error = %e, "interval rejected by the database");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn healthz(&self) -> Result<(), UpstreamError> {
        let version: Option<(String,)> = sqlx::query_as(queries::SCHEMA_VERSION)
            .fetch_optional(&self.pool)
            .await?;
        match version {
            Some((version,)) => {
                tracing::debug!(version, "database schema version");
                Ok(())
            }
            None => Err(UpstreamError::Unhealthy("no version found".into())),
        }
    }
}
