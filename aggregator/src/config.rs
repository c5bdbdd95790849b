use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("{0} must be set in the configuration")]
    Missing(&'static str),

    #[error("{0} must be greater than 0")]
    NotPositive(&'static str),
}

/// Aggregator configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Listener for dashboard requests
    #[serde(default = "default_listener")]
    pub listener: Listener,
    /// Listener for health and readiness probes
    #[serde(default = "default_admin_listener")]
    pub admin_listener: Listener,
    pub db: DbConfig,
    pub apps: AppsConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub app_exposer: AppExposerConfig,
    pub permissions: PermissionsConfig,
    #[serde(default)]
    pub timeouts: Timeouts,
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;
        self.db.validate()?;

        if self.metadata.featured_apps_attr.is_empty() {
            return Err(ValidationError::Missing("metadata.featured_apps_attr"));
        }
        if self.metadata.featured_apps_value.is_empty() {
            return Err(ValidationError::Missing("metadata.featured_apps_value"));
        }
        if self.permissions.public_group.is_empty() {
            return Err(ValidationError::Missing("permissions.public_group"));
        }
        if self.permissions.grouper_user.is_empty() {
            return Err(ValidationError::Missing("permissions.grouper_user"));
        }
        if self.timeouts.http_timeout_secs == 0 {
            return Err(ValidationError::NotPositive("timeouts.http_timeout_secs"));
        }
        if self.timeouts.request_timeout_secs == 0 {
            return Err(ValidationError::NotPositive("timeouts.request_timeout_secs"));
        }

        Ok(())
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    pub port: u16,
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

fn default_listener() -> Listener {
    Listener {
        host: "0.0.0.0".into(),
        port: 60000,
    }
}

fn default_admin_listener() -> Listener {
    Listener {
        host: "0.0.0.0".into(),
        port: 60001,
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct DbConfig {
    pub user: String,
    pub password: String,
    pub host: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
    pub database: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl DbConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.user.is_empty() {
            return Err(ValidationError::Missing("db.user"));
        }
        if self.password.is_empty() {
            return Err(ValidationError::Missing("db.password"));
        }
        if self.host.is_empty() {
            return Err(ValidationError::Missing("db.host"));
        }
        if self.database.is_empty() {
            return Err(ValidationError::Missing("db.database"));
        }
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        if self.max_connections == 0 {
            return Err(ValidationError::NotPositive("db.max_connections"));
        }
        Ok(())
    }
}

fn default_db_port() -> u16 {
    5432
}

fn default_max_connections() -> u32 {
    10
}

/// The analyses service
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct AppsConfig {
    pub url: Url,
    /// `child_index` of the favorites category under a user's workspace
    #[serde(default = "default_favorites_group_index")]
    pub favorites_group_index: i32,
}

fn default_favorites_group_index() -> i32 {
    10
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct MetadataConfig {
    #[serde(default = "default_metadata_url")]
    pub url: Url,
    /// AVU attribute and value that mark an app as featured
    #[serde(default)]
    pub featured_apps_attr: String,
    #[serde(default)]
    pub featured_apps_value: String,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        MetadataConfig {
            url: default_metadata_url(),
            featured_apps_attr: String::new(),
            featured_apps_value: String::new(),
        }
    }
}

fn default_metadata_url() -> Url {
    Url::parse("http://metadata").expect("static URL")
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct AppExposerConfig {
    #[serde(default = "default_app_exposer_url")]
    pub url: Url,
}

impl Default for AppExposerConfig {
    fn default() -> Self {
        AppExposerConfig {
            url: default_app_exposer_url(),
        }
    }
}

fn default_app_exposer_url() -> Url {
    Url::parse("http://app-exposer").expect("static URL")
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct PermissionsConfig {
    pub url: Url,
    /// The group management service, used to resolve `public_group` to an ID
    pub groups_url: Url,
    pub public_group: String,
    #[serde(default = "default_grouper_user")]
    pub grouper_user: String,
}

fn default_grouper_user() -> String {
    "de-grouper".into()
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Timeouts {
    /// Timeout for a single collaborator HTTP call
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// Deadline for a whole dashboard request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Timeouts {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            http_timeout_secs: default_http_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_request_timeout_secs() -> u64 {
    60
}
