use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use super::{
    HttpRetryConfig, RhaiConfig, ServerConfig, deserialize_duration_from_seconds,
    serialize_duration_to_seconds,
};

/// Provides the default value for shutdown_timeout.
fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Provides the default value for recent_events_capacity.
fn default_recent_events_capacity() -> usize {
    200
}

/// Provides the default value for scheduler_channel_capacity.
fn default_scheduler_channel_capacity() -> usize {
    1024
}

/// Provides the default tenant name the API key is issued for.
fn default_tenant_name() -> String {
    "default".to_string()
}

/// Application configuration for waypost.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    /// Database URL for the SQLite database.
    pub database_url: String,

    /// Public URL of the server the events originate from. Exposed to
    /// templates as `server_url`.
    #[serde(default)]
    pub server_url: String,

    /// Tenant the management API key is issued for.
    #[serde(default = "default_tenant_name")]
    pub tenant_name: String,

    /// Path to the route configuration file.
    #[serde(skip_deserializing)]
    pub routes_config_path: PathBuf,

    /// Path to the output configuration file.
    #[serde(skip_deserializing)]
    pub outputs_config_path: PathBuf,

    /// Path to the template configuration file.
    #[serde(skip_deserializing)]
    pub templates_config_path: PathBuf,

    /// Default retry policy for outputs that do not declare their own.
    #[serde(default)]
    pub http_retry_config: HttpRetryConfig,

    /// The maximum time in seconds to wait for graceful shutdown.
    #[serde(
        deserialize_with = "deserialize_duration_from_seconds",
        serialize_with = "serialize_duration_to_seconds",
        default = "default_shutdown_timeout"
    )]
    pub shutdown_timeout: Duration,

    /// Rhai policy execution configuration.
    #[serde(default)]
    pub rhai: RhaiConfig,

    /// Number of handled events kept for the `/events` endpoint.
    #[serde(default = "default_recent_events_capacity")]
    pub recent_events_capacity: usize,

    /// Capacity of each route scheduler's command queue.
    #[serde(default = "default_scheduler_channel_capacity")]
    pub scheduler_channel_capacity: usize,

    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

impl AppConfig {
    /// Creates a new `AppConfig` by reading from the configuration directory.
    pub fn new(config_dir: Option<&str>) -> Result<Self, ConfigError> {
        let config_dir_str = config_dir.unwrap_or("configs");
        let s = Config::builder()
            .add_source(File::with_name(&format!("{}/app.yaml", config_dir_str)))
            .add_source(Environment::with_prefix("WAYPOST").separator("__"))
            .build()?;
        let mut config: Self = s.try_deserialize()?;

        let config_path = Path::new(config_dir_str);
        config.routes_config_path = config_path.join("routes.yaml");
        config.outputs_config_path = config_path.join("outputs.yaml");
        config.templates_config_path = config_path.join("templates.yaml");

        Ok(config)
    }

    /// Creates a new `AppConfigBuilder` for testing purposes.
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }
}

/// A builder for creating `AppConfig` instances in tests.
#[derive(Default)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

impl AppConfigBuilder {
    /// Sets the database URL.
    pub fn database_url(mut self, url: &str) -> Self {
        self.config.database_url = url.to_string();
        self
    }

    /// Sets the URL exposed to templates as `server_url`.
    pub fn server_url(mut self, url: &str) -> Self {
        self.config.server_url = url.to_string();
        self
    }

    /// Sets the tenant the API key is issued for.
    pub fn tenant_name(mut self, tenant: &str) -> Self {
        self.config.tenant_name = tenant.to_string();
        self
    }

    /// Points the route, output and template paths at `dir`.
    pub fn config_dir(mut self, dir: &Path) -> Self {
        self.config.routes_config_path = dir.join("routes.yaml");
        self.config.outputs_config_path = dir.join("outputs.yaml");
        self.config.templates_config_path = dir.join("templates.yaml");
        self
    }

    /// Sets the HTTP listen address.
    pub fn listen_address(mut self, address: &str) -> Self {
        self.config.server.listen_address = address.to_string();
        self
    }

    /// Sets the size of the recent-events log.
    pub fn recent_events_capacity(mut self, capacity: usize) -> Self {
        self.config.recent_events_capacity = capacity;
        self
    }

    /// Builds the configuration, filling unset values with their defaults.
    pub fn build(mut self) -> AppConfig {
        if self.config.tenant_name.is_empty() {
            self.config.tenant_name = default_tenant_name();
        }
        if self.config.recent_events_capacity == 0 {
            self.config.recent_events_capacity = default_recent_events_capacity();
        }
        if self.config.scheduler_channel_capacity == 0 {
            self.config.scheduler_channel_capacity = default_scheduler_channel_capacity();
        }
        if self.config.shutdown_timeout.is_zero() {
            self.config.shutdown_timeout = default_shutdown_timeout();
        }
        self.config
    }
}
